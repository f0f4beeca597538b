use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::{Deserialize, Serialize};

use crate::{
    App,
    comment::models::CommentReport,
    error::AppError,
    identity::AdminUser,
    schema::{comment_reports, comments},
};

pub const EXCERPT_CHARS: usize = 140;

/// First `EXCERPT_CHARS` characters of a comment, with an ellipsis when cut.
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((end, _)) => format!("{}…", &content[..end]),
        None => content.to_owned(),
    }
}

#[derive(Serialize)]
pub struct PendingReport {
    #[serde(flatten)]
    report: CommentReport,
    comment_author: i32,
    comment_excerpt: String,
    comment_created_at: NaiveDateTime,
}

pub async fn list_reports(
    State(ctx): State<App>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<PendingReport>>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let rows: Vec<(CommentReport, i32, String, NaiveDateTime)> = comment_reports::table
        .inner_join(comments::table)
        .filter(comment_reports::resolved.eq(false))
        .order((comment_reports::created_at.asc(), comment_reports::id.asc()))
        .select((
            CommentReport::as_select(),
            comments::identity_id,
            comments::content,
            comments::created_at,
        ))
        .load(&mut conn)
        .await?;

    let reports = rows
        .into_iter()
        .map(|(report, author, content, created_at)| PendingReport {
            report,
            comment_author: author,
            comment_excerpt: excerpt(&content),
            comment_created_at: created_at,
        })
        .collect();

    Ok(Json(reports))
}

#[derive(Deserialize)]
pub struct Resolution {
    /// Also delete the reported comment
    #[serde(default)]
    delete_comment: bool,
}

pub async fn resolve_report(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
    Query(resolution): Query<Resolution>,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let comment_id = comment_reports::table
        .find(id)
        .select(comment_reports::comment_id)
        .first::<i32>(&mut conn)
        .await
        .optional()?
        .ok_or(("Report not found", StatusCode::NOT_FOUND))?;

    conn.transaction::<(), diesel::result::Error, _>(|conn| {
        async move {
            // every report on the comment is settled by the same decision
            diesel::update(comment_reports::table.filter(comment_reports::comment_id.eq(comment_id)))
                .set(comment_reports::resolved.eq(true))
                .execute(conn)
                .await?;

            if resolution.delete_comment {
                diesel::delete(comments::table.find(comment_id))
                    .execute(conn)
                    .await?;
            }

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(
        report_id = id,
        comment_id,
        deleted = resolution.delete_comment,
        admin = admin.id,
        "Report resolved"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_excerpt_keeps_short_content() {
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt(&"a".repeat(EXCERPT_CHARS)), "a".repeat(EXCERPT_CHARS));
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        let long = "ñ".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
