pub mod models;
pub mod routes;

use axum::http::StatusCode;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::{
    comment::ContentScope,
    error::AppError,
    schema::{chapters, novels},
};

use self::models::Novel;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

pub async fn find_published(conn: &mut AsyncPgConnection, slug: &str) -> Result<Novel, AppError> {
    novels::table
        .filter(novels::slug.eq(slug))
        .filter(novels::published.eq(true))
        .select(Novel::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ("Novel not found", StatusCode::NOT_FOUND).into())
}

/// Resolves the thread a request targets: the novel's own thread, or the one
/// of its chapter `chapter_number`.
pub async fn resolve_scope(
    conn: &mut AsyncPgConnection,
    slug: &str,
    chapter_number: Option<i32>,
) -> Result<(Novel, ContentScope), AppError> {
    let novel = find_published(conn, slug).await?;

    let chapter_id = match chapter_number {
        Some(number) => Some(
            chapters::table
                .filter(chapters::novel_id.eq(novel.id))
                .filter(chapters::number.eq(number))
                .select(chapters::id)
                .first::<i32>(conn)
                .await
                .optional()?
                .ok_or(("Chapter not found", StatusCode::NOT_FOUND))?,
        ),
        None => None,
    };

    let scope = ContentScope {
        novel_id: novel.id,
        chapter_id,
    };

    Ok((novel, scope))
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// 1-based page and a page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn normalize(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }

    pub fn offset(&self) -> i64 {
        let (page, page_size) = self.normalize();
        (page - 1).saturating_mul(page_size)
    }
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &PageQuery, total: i64) -> Self {
        let (page, page_size) = query.normalize();
        Page {
            items,
            page,
            page_size,
            total,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_page_query_normalize() {
        let q = PageQuery::default();
        assert_eq!(q.normalize(), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(q.offset(), 0);

        let q = PageQuery {
            page: Some(3),
            page_size: Some(10),
        };
        assert_eq!(q.offset(), 20);

        let q = PageQuery {
            page: Some(-4),
            page_size: Some(1000),
        };
        assert_eq!(q.normalize(), (1, MAX_PAGE_SIZE));

        let q = PageQuery {
            page: Some(2),
            page_size: Some(0),
        };
        assert_eq!(q.normalize(), (2, 1));
    }

    #[test]
    fn test_page_total_pages() {
        let q = PageQuery {
            page: Some(1),
            page_size: Some(20),
        };
        assert_eq!(Page::<()>::new(vec![], &q, 0).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], &q, 20).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], &q, 41).total_pages, 3);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain title"), "plain title");
    }
}
