use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use diesel::{pg::Pg, prelude::*};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::{
    App,
    error::AppError,
    identity::MaybeAuthUser,
    library::progress::record_read,
    schema::{chapters, novels},
};

use super::{
    Page, PageQuery, escape_like, find_published,
    models::{Chapter, ChapterEntry, Novel},
};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/novels", get(list_novels))
        .route("/novels/{slug}", get(get_novel))
        .route("/novels/{slug}/chapters", get(list_chapters))
        .route("/novels/{slug}/chapters/{number}", get(read_chapter))
}

// Fields are spelled out rather than flattened from `PageQuery`: flattened
// query strings reach serde as strings and the numbers would not parse.
#[derive(Deserialize, Debug)]
pub struct CatalogQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    /// Case-insensitive title search
    q: Option<String>,
}

impl CatalogQuery {
    fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn published_matching(search: Option<&str>) -> novels::BoxedQuery<'static, Pg> {
    let query = novels::table
        .filter(novels::published.eq(true))
        .into_boxed();

    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(search) => query.filter(novels::title.ilike(format!("%{}%", escape_like(search)))),
        None => query,
    }
}

async fn list_novels(
    State(ctx): State<App>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Page<Novel>>, AppError> {
    let paging = query.paging();
    let (_, page_size) = paging.normalize();

    let mut conn = ctx.diesel.get().await?;

    let total = published_matching(query.q.as_deref())
        .count()
        .get_result::<i64>(&mut conn)
        .await?;

    let items = published_matching(query.q.as_deref())
        .order((novels::updated_at.desc(), novels::id.desc()))
        .limit(page_size)
        .offset(paging.offset())
        .select(Novel::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(Page::new(items, &paging, total)))
}

#[derive(Serialize)]
struct NovelDetail {
    #[serde(flatten)]
    novel: Novel,
    chapter_count: i64,
}

async fn get_novel(
    State(ctx): State<App>,
    Path(slug): Path<String>,
) -> Result<Json<NovelDetail>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_published(&mut conn, &slug).await?;

    let chapter_count = chapters::table
        .filter(chapters::novel_id.eq(novel.id))
        .count()
        .get_result::<i64>(&mut conn)
        .await?;

    Ok(Json(NovelDetail {
        novel,
        chapter_count,
    }))
}

async fn list_chapters(
    State(ctx): State<App>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<ChapterEntry>>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_published(&mut conn, &slug).await?;

    let entries = chapters::table
        .filter(chapters::novel_id.eq(novel.id))
        .order(chapters::number.asc())
        .select(ChapterEntry::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(entries))
}

#[derive(Serialize)]
struct ChapterView {
    novel_slug: String,
    novel_title: String,
    chapter: Chapter,
    previous: Option<i32>,
    next: Option<i32>,
}

async fn read_chapter(
    State(ctx): State<App>,
    Path((slug, number)): Path<(String, i32)>,
    viewer: MaybeAuthUser,
) -> Result<Json<ChapterView>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let novel = find_published(&mut conn, &slug).await?;

    let chapter = chapters::table
        .filter(chapters::novel_id.eq(novel.id))
        .filter(chapters::number.eq(number))
        .select(Chapter::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(("Chapter not found", StatusCode::NOT_FOUND))?;

    let previous = chapters::table
        .filter(chapters::novel_id.eq(novel.id))
        .filter(chapters::number.lt(number))
        .order(chapters::number.desc())
        .select(chapters::number)
        .first::<i32>(&mut conn)
        .await
        .optional()?;

    let next = chapters::table
        .filter(chapters::novel_id.eq(novel.id))
        .filter(chapters::number.gt(number))
        .order(chapters::number.asc())
        .select(chapters::number)
        .first::<i32>(&mut conn)
        .await
        .optional()?;

    if let Some(identity_id) = viewer.id() {
        // Reading must not fail because progress couldn't be saved
        if let Err(e) = record_read(&mut conn, identity_id, novel.id, chapter.id).await {
            tracing::warn!(error = %e, identity_id, chapter_id = chapter.id, "Failed to record reading progress");
        }
    }

    Ok(Json(ChapterView {
        novel_slug: novel.slug,
        novel_title: novel.title,
        chapter,
        previous,
        next,
    }))
}
