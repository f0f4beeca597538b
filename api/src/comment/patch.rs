use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{App, error::AppError, identity::AuthUser, schema::comments};

use super::{models::Comment, validate_content};

#[derive(Deserialize)]
pub struct CommentPatch {
    content: String,
}

#[debug_handler]
pub async fn patch_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(mut comment): crate::json::Json<CommentPatch>,
) -> Result<Json<Comment>, AppError> {
    ctx.limiter.check(auth_user.id)?;

    validate_content(&mut comment.content).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    let owner = comments::table
        .find(id)
        .select(comments::identity_id)
        .first::<i32>(&mut conn)
        .await
        .optional()?
        .ok_or(("Comment not found", StatusCode::NOT_FOUND))?;

    if owner != auth_user.id {
        return Err((
            "You are not the owner of this comment",
            StatusCode::FORBIDDEN,
        ))?;
    }

    let updated = diesel::update(comments::table.find(id))
        .set((
            comments::content.eq(comment.content),
            comments::edited_at.eq(Some(chrono::Utc::now().naive_utc())),
        ))
        .returning(Comment::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(updated))
}
