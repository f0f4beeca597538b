use axum::{Json, Router, extract::State, routing::get};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{
    App,
    error::AppError,
    identity::models::{identity::Traits, profile::Profile},
};

use super::AuthUser;

pub fn route() -> Router<App> {
    Router::<App>::new().route("/me", get(handle_whoami))
}

#[derive(serde::Serialize)]
pub struct WhoamiResponse {
    id: i32,
    traits: Traits,

    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    site_admin: bool,
}

async fn handle_whoami(
    State(ctx): State<App>,
    AuthUser(identity): AuthUser,
) -> Result<Json<WhoamiResponse>, AppError> {
    use crate::schema::profiles;

    let mut conn = ctx.diesel.get().await?;

    let profile = profiles::table
        .find(identity.id)
        .select(Profile::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    Ok(Json(WhoamiResponse {
        id: identity.id,
        traits: identity.get_traits(),
        profile,
        site_admin: ctx.config.is_admin(identity.id),
    }))
}
