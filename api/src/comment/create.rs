use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    notification::{self, NotificationKind},
    novel::resolve_scope,
    schema::{comments, profiles},
};

use super::{
    fetch::in_scope,
    models::{Comment, NewComment},
    validate_content,
};

#[derive(Deserialize)]
pub struct ScopeQuery {
    chapter: Option<i32>,
}

#[derive(Deserialize)]
pub struct CommentSubmission {
    content: String,
    parent_id: Option<i32>,
}

#[debug_handler]
pub async fn create_comment(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    Query(q): Query<ScopeQuery>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(mut comment): crate::json::Json<CommentSubmission>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    ctx.limiter.check(auth_user.id)?;

    validate_content(&mut comment.content).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    let (novel, scope) = resolve_scope(&mut conn, &slug, q.chapter).await?;

    // the parent must belong to the very same thread
    let parent_author = match comment.parent_id {
        Some(parent_id) => {
            let author = in_scope(scope)
                .filter(comments::id.eq(parent_id))
                .select(comments::identity_id)
                .first::<i32>(&mut conn)
                .await
                .optional()?;

            if author.is_none() {
                return Err((
                    "You're replying to a comment that does not belong to this thread",
                    StatusCode::BAD_REQUEST,
                ))?;
            }
            author
        }
        None => None,
    };

    let inserted: Comment = diesel::insert_into(comments::table)
        .values(&NewComment {
            novel_id: scope.novel_id,
            chapter_id: scope.chapter_id,
            identity_id: auth_user.id,
            content: comment.content,
            parent_id: comment.parent_id,
        })
        .returning(Comment::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(
        comment_id = inserted.id,
        novel_id = scope.novel_id,
        chapter_id = ?scope.chapter_id,
        "Comment posted"
    );

    if let Some(parent_author) = reply_recipient(parent_author, auth_user.id) {
        let link = reply_link(&novel.slug, q.chapter, inserted.id);

        let replier = profiles::table
            .find(auth_user.id)
            .select(profiles::username)
            .first::<String>(&mut conn)
            .await
            .optional()?
            .or(auth_user.get_traits().name)
            .unwrap_or_else(|| "Someone".into());

        // The comment is already stored, a missing notification is not worth
        // failing the request for
        if let Err(e) = notification::notify(
            &mut conn,
            parent_author,
            NotificationKind::Reply,
            format!("{replier} replied to your comment on {}", novel.title),
            Some(link),
        )
        .await
        {
            tracing::warn!(error = %e, parent_author, "Failed to create reply notification");
        }
    }

    Ok((StatusCode::CREATED, Json(inserted)))
}

/// Who hears about a new comment: the parent's author, unless they replied
/// to themselves.
fn reply_recipient(parent_author: Option<i32>, replier: i32) -> Option<i32> {
    parent_author.filter(|author| *author != replier)
}

fn reply_link(slug: &str, chapter: Option<i32>, comment_id: i32) -> String {
    match chapter {
        Some(number) => format!("/novels/{slug}/chapters/{number}#comment-{comment_id}"),
        None => format!("/novels/{slug}#comment-{comment_id}"),
    }
}
