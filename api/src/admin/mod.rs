//! Back-office for managing the catalog and triaging comment reports. Every
//! handler here requires an `AdminUser`.

pub mod chapters;
pub mod import;
pub mod novels;
pub mod reports;
pub mod routes;

use std::sync::LazyLock;

use axum::http::StatusCode;
use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::{error::AppError, novel::models::Novel, schema::novels as novels_table};

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern is a valid regex")
});

pub const MAX_SLUG_LEN: usize = 100;
pub const MAX_TITLE_CHARS: usize = 200;

pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.len() > MAX_SLUG_LEN {
        return Err("Slug is too long");
    }

    if !SLUG_PATTERN.is_match(slug) {
        return Err("Slug may only contain lowercase letters, digits and single dashes");
    }

    Ok(())
}

/// Trims the title in place and checks it is neither blank nor too long.
pub fn validate_title(title: &mut String) -> Result<(), &'static str> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err("Title is required");
    }

    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err("Title is too long");
    }

    *title = trimmed.to_owned();
    Ok(())
}

fn by_slug(slug: &str) -> novels_table::BoxedQuery<'_, Pg> {
    novels_table::table
        .filter(novels_table::slug.eq(slug))
        .into_boxed()
}

/// Looks a novel up by slug whether it is published or not.
pub async fn find_novel(conn: &mut AsyncPgConnection, slug: &str) -> Result<Novel, AppError> {
    by_slug(slug)
        .select(Novel::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ("Novel not found", StatusCode::NOT_FOUND).into())
}

/// Tells an absent field (`None`) apart from an explicit `null`
/// (`Some(None)`), so patches can clear nullable columns.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
