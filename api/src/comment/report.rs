use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    schema::{comment_reports, comments},
};

use super::models::NewCommentReport;

pub const MAX_REASON_CHARS: usize = 500;

#[derive(Deserialize)]
pub struct ReportSubmission {
    reason: String,
}

impl ReportSubmission {
    fn validate(&mut self) -> Result<(), &'static str> {
        self.reason = self.reason.trim().to_string();

        if self.reason.is_empty() {
            return Err("Please tell us why you're reporting this comment");
        }

        if self.reason.chars().count() > MAX_REASON_CHARS {
            return Err("Reason too long (max 500 characters)");
        }

        Ok(())
    }
}

#[debug_handler]
pub async fn report_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(mut report): crate::json::Json<ReportSubmission>,
) -> Result<StatusCode, AppError> {
    ctx.limiter.check(auth_user.id)?;

    report
        .validate()
        .map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    let exists = diesel::select(diesel::dsl::exists(comments::table.find(id)))
        .get_result::<bool>(&mut conn)
        .await?;

    if !exists {
        return Err(("Comment not found", StatusCode::NOT_FOUND))?;
    }

    diesel::insert_into(comment_reports::table)
        .values(&NewCommentReport {
            comment_id: id,
            identity_id: auth_user.id,
            reason: report.reason,
        })
        .execute(&mut conn)
        .await?;

    tracing::info!(comment_id = id, reporter = auth_user.id, "Comment reported");

    Ok(StatusCode::CREATED)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_report_reason_validation() {
        let mut report = ReportSubmission {
            reason: "  spam link  ".into(),
        };
        assert!(report.validate().is_ok());
        assert_eq!(report.reason, "spam link");

        let mut blank = ReportSubmission { reason: "   ".into() };
        assert!(blank.validate().is_err());

        let mut long = ReportSubmission {
            reason: "x".repeat(MAX_REASON_CHARS + 1),
        };
        assert!(long.validate().is_err());
    }
}
