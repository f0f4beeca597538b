use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Serialize;

use crate::{App, error::AppError, identity::AuthUser, novel::find_published};

use super::{
    bookmark::{self, BookmarkedNovel},
    progress::{HistoryEntry, ReadingProgress, read_counts, recent_history},
};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route(
            "/novels/{slug}/bookmark",
            put(put_bookmark).delete(delete_bookmark),
        )
        .route("/me/bookmarks", get(get_bookmarks))
        .route("/me/history", get(get_history))
        .route("/me/progress", get(get_progress))
}

#[derive(Serialize)]
struct BookmarkState {
    novel_id: i32,
    bookmarked: bool,
}

async fn put_bookmark(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AuthUser(auth_user): AuthUser,
) -> Result<(StatusCode, Json<BookmarkState>), AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_published(&mut conn, &slug).await?;

    let created = bookmark::add(&mut conn, auth_user.id, novel.id).await?;
    let status = if created {
        tracing::debug!(identity_id = auth_user.id, novel_id = novel.id, "Bookmark added");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(BookmarkState {
            novel_id: novel.id,
            bookmarked: true,
        }),
    ))
}

async fn delete_bookmark(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AuthUser(auth_user): AuthUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_published(&mut conn, &slug).await?;

    if bookmark::remove(&mut conn, auth_user.id, novel.id).await? {
        tracing::debug!(identity_id = auth_user.id, novel_id = novel.id, "Bookmark removed");
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn get_bookmarks(
    State(ctx): State<App>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<Vec<BookmarkedNovel>>, AppError> {
    let mut conn = ctx.diesel.get().await?;
    Ok(Json(bookmark::list(&mut conn, auth_user.id).await?))
}

async fn get_history(
    State(ctx): State<App>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let mut conn = ctx.diesel.get().await?;
    Ok(Json(recent_history(&mut conn, auth_user.id).await?))
}

async fn get_progress(
    State(ctx): State<App>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<ReadingProgress>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let read_count = read_counts(&mut conn, vec![auth_user.id])
        .await?
        .get(&auth_user.id)
        .copied()
        .unwrap_or(0);

    Ok(Json(ReadingProgress::new(read_count)))
}
