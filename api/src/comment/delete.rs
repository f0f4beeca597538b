use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{App, error::AppError, identity::AuthUser, schema::comments};

/// Owners can delete their comments, admins any comment. Votes and reports
/// go with it, replies stay and surface as roots.
#[debug_handler]
pub async fn delete_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let owner = comments::table
        .find(id)
        .select(comments::identity_id)
        .first::<i32>(&mut conn)
        .await
        .optional()?
        .ok_or(("Comment not found", StatusCode::NOT_FOUND))?;

    if owner != auth_user.id && !ctx.config.is_admin(auth_user.id) {
        return Err((
            "You are not the owner of this comment",
            StatusCode::FORBIDDEN,
        ))?;
    }

    diesel::delete(comments::table.find(id))
        .execute(&mut conn)
        .await?;

    tracing::info!(comment_id = id, deleted_by = auth_user.id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
