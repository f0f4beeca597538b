use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::{App, error::AppError, identity::AuthUser, schema::notifications};

use super::Notification;

const LIST_LIMIT: i64 = 50;

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}

#[derive(Serialize)]
struct NotificationList {
    items: Vec<Notification>,
    unread: i64,
}

async fn list_notifications(
    State(ctx): State<App>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<NotificationList>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let items = notifications::table
        .filter(notifications::identity_id.eq(auth_user.id))
        .order((notifications::created_at.desc(), notifications::id.desc()))
        .limit(LIST_LIMIT)
        .select(Notification::as_select())
        .load(&mut conn)
        .await?;

    let unread = notifications::table
        .filter(notifications::identity_id.eq(auth_user.id))
        .filter(notifications::read.eq(false))
        .count()
        .get_result::<i64>(&mut conn)
        .await?;

    Ok(Json(NotificationList { items, unread }))
}

async fn mark_read(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(id))
            .filter(notifications::identity_id.eq(auth_user.id)),
    )
    .set(notifications::read.eq(true))
    .execute(&mut conn)
    .await?;

    if updated == 0 {
        return Err(("Notification not found", StatusCode::NOT_FOUND))?;
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(ctx): State<App>,
    AuthUser(auth_user): AuthUser,
) -> Result<StatusCode, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::identity_id.eq(auth_user.id))
            .filter(notifications::read.eq(false)),
    )
    .set(notifications::read.eq(true))
    .execute(&mut conn)
    .await?;

    tracing::debug!(identity_id = auth_user.id, updated, "Marked notifications as read");

    Ok(StatusCode::NO_CONTENT)
}
