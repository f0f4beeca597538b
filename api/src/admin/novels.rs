use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::AdminUser,
    novel::models::{NewNovel, Novel, UpdateNovel},
    schema::novels,
};

use super::{find_novel, nullable, validate_slug, validate_title};

#[derive(Deserialize)]
pub struct NovelSubmission {
    slug: String,
    title: String,
    author_name: Option<String>,
    synopsis: Option<String>,
    cover_url: Option<String>,
    #[serde(default)]
    published: bool,
}

pub async fn create_novel(
    State(ctx): State<App>,
    AdminUser(admin): AdminUser,
    crate::json::Json(mut novel): crate::json::Json<NovelSubmission>,
) -> Result<(StatusCode, Json<Novel>), AppError> {
    validate_slug(&novel.slug).map_err(|e| (e, StatusCode::BAD_REQUEST))?;
    validate_title(&mut novel.title).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    // a taken slug surfaces as a unique violation, i.e. 409
    let created: Novel = diesel::insert_into(novels::table)
        .values(&NewNovel {
            slug: novel.slug,
            title: novel.title,
            author_name: novel.author_name,
            synopsis: novel.synopsis,
            cover_url: novel.cover_url,
            published: novel.published,
        })
        .returning(Novel::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(novel_id = created.id, slug = %created.slug, admin = admin.id, "Novel created");

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct NovelPatch {
    title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    author_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    synopsis: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    cover_url: Option<Option<String>>,
    published: Option<bool>,
}

pub async fn patch_novel(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AdminUser(admin): AdminUser,
    crate::json::Json(mut patch): crate::json::Json<NovelPatch>,
) -> Result<Json<Novel>, AppError> {
    if let Some(title) = patch.title.as_mut() {
        validate_title(title).map_err(|e| (e, StatusCode::BAD_REQUEST))?;
    }

    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;

    let updated: Novel = diesel::update(novels::table.find(novel.id))
        .set(&UpdateNovel {
            title: patch.title,
            author_name: patch.author_name,
            synopsis: patch.synopsis,
            cover_url: patch.cover_url,
            published: patch.published,
            updated_at: Some(chrono::Utc::now().naive_utc()),
        })
        .returning(Novel::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(novel_id = novel.id, admin = admin.id, "Novel updated");

    Ok(Json(updated))
}

/// Chapters, comments, bookmarks and history of the novel go with it.
pub async fn delete_novel(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AdminUser(admin): AdminUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;

    diesel::delete(novels::table.find(novel.id))
        .execute(&mut conn)
        .await?;

    tracing::info!(novel_id = novel.id, slug = %novel.slug, admin = admin.id, "Novel deleted");

    Ok(StatusCode::NO_CONTENT)
}
