use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl, scoped_futures::ScopedFutureExt,
};
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::AdminUser,
    novel::models::{Chapter, NewChapter, UpdateChapter},
    schema::{chapters, novels},
};

use super::{find_novel, validate_title};

fn validate_number(number: i32) -> Result<(), (&'static str, StatusCode)> {
    if number <= 0 {
        return Err(("Chapter number must be positive", StatusCode::BAD_REQUEST));
    }
    Ok(())
}

pub(super) async fn touch_novel(
    conn: &mut AsyncPgConnection,
    novel_id: i32,
) -> Result<(), diesel::result::Error> {
    diesel::update(novels::table.find(novel_id))
        .set(novels::updated_at.eq(Utc::now().naive_utc()))
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Deserialize)]
pub struct ChapterSubmission {
    number: i32,
    title: String,
    content: String,
}

pub async fn create_chapter(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AdminUser(admin): AdminUser,
    crate::json::Json(mut chapter): crate::json::Json<ChapterSubmission>,
) -> Result<(StatusCode, Json<Chapter>), AppError> {
    validate_number(chapter.number)?;
    validate_title(&mut chapter.title).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;
    let novel_id = novel.id;

    let created = conn
        .transaction::<Chapter, diesel::result::Error, _>(|conn| {
            async move {
                let created = diesel::insert_into(chapters::table)
                    .values(&NewChapter {
                        novel_id,
                        number: chapter.number,
                        title: chapter.title,
                        content: chapter.content,
                    })
                    .returning(Chapter::as_returning())
                    .get_result(conn)
                    .await?;

                touch_novel(conn, novel_id).await?;

                Ok(created)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        chapter_id = created.id,
        novel_id = novel.id,
        number = created.number,
        admin = admin.id,
        "Chapter created"
    );

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct ChapterPatch {
    number: Option<i32>,
    title: Option<String>,
    content: Option<String>,
}

pub async fn patch_chapter(
    State(ctx): State<App>,
    Path((slug, number)): Path<(String, i32)>,
    AdminUser(admin): AdminUser,
    crate::json::Json(mut patch): crate::json::Json<ChapterPatch>,
) -> Result<Json<Chapter>, AppError> {
    if let Some(number) = patch.number {
        validate_number(number)?;
    }
    if let Some(title) = patch.title.as_mut() {
        validate_title(title).map_err(|e| (e, StatusCode::BAD_REQUEST))?;
    }

    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;
    let novel_id = novel.id;

    let updated = conn
        .transaction::<Option<Chapter>, diesel::result::Error, _>(|conn| {
            async move {
                let updated = diesel::update(
                    chapters::table
                        .filter(chapters::novel_id.eq(novel_id))
                        .filter(chapters::number.eq(number)),
                )
                .set(&UpdateChapter {
                    number: patch.number,
                    title: patch.title,
                    content: patch.content,
                    updated_at: Some(Utc::now().naive_utc()),
                })
                .returning(Chapter::as_returning())
                .get_result(conn)
                .await
                .optional()?;

                if updated.is_some() {
                    touch_novel(conn, novel_id).await?;
                }

                Ok(updated)
            }
            .scope_boxed()
        })
        .await?
        .ok_or(("Chapter not found", StatusCode::NOT_FOUND))?;

    tracing::info!(chapter_id = updated.id, novel_id = novel.id, admin = admin.id, "Chapter updated");

    Ok(Json(updated))
}

pub async fn delete_chapter(
    State(ctx): State<App>,
    Path((slug, number)): Path<(String, i32)>,
    AdminUser(admin): AdminUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;

    let deleted = diesel::delete(
        chapters::table
            .filter(chapters::novel_id.eq(novel.id))
            .filter(chapters::number.eq(number)),
    )
    .execute(&mut conn)
    .await?;

    if deleted == 0 {
        return Err(("Chapter not found", StatusCode::NOT_FOUND))?;
    }

    tracing::info!(novel_id = novel.id, number, admin = admin.id, "Chapter deleted");

    Ok(StatusCode::NO_CONTENT)
}
