use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{App, error::AppError, identity::MaybeAuthUser, novel::resolve_scope};

use super::{
    CommentThread,
    fetch::{assemble, fetch_thread},
    sort::SortOrder,
};

#[derive(Deserialize)]
pub struct Queries {
    /// Chapter number, the novel-level thread when absent
    chapter: Option<i32>,
    sort: Option<SortOrder>,
}

pub async fn get_comments(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    Query(q): Query<Queries>,
    viewer: MaybeAuthUser,
) -> Result<Json<Vec<CommentThread>>, AppError> {
    let sort = q.sort.unwrap_or_default();

    let mut conn = ctx.diesel.get().await?;

    let (_, scope) = resolve_scope(&mut conn, &slug, q.chapter).await?;

    let fetched = fetch_thread(&mut conn, scope).await.inspect_err(|e| {
        tracing::error!(?scope, error = %e, "Failed to fetch comments");
    })?;

    Ok(Json(assemble(fetched, viewer.id(), sort)))
}
