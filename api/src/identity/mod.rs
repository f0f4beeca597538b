use axum::{extract::FromRequestParts, http::request::Parts};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{
    App,
    error::{ApiRequestError, AppError},
};

use self::models::identity::Identity;

pub mod models;
pub mod routes;

pub const COOKIE_NAME: &str = "auth_token";

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("Authentication required, but no cookie `{COOKIE_NAME}` found in headers.")]
    NoCookie,

    #[error(
        "Unauthorized, please check if you're logged in by refreshing the \
         page. This could be due to an expired session or token has became invalid."
    )]
    Unauthorized,

    #[error("This action is restricted to site administrators.")]
    Forbidden,
}

impl ApiRequestError for AuthenticationError {
    fn status_code(&self) -> axum::http::StatusCode {
        match self {
            AuthenticationError::NoCookie => axum::http::StatusCode::BAD_REQUEST,
            AuthenticationError::Unauthorized => axum::http::StatusCode::UNAUTHORIZED,
            AuthenticationError::Forbidden => axum::http::StatusCode::FORBIDDEN,
        }
    }
}

/// The viewer, if the request carries a valid session. Anonymous reads are
/// allowed everywhere, so a missing or stale cookie is not a rejection.
pub struct MaybeAuthUser(pub Result<Identity, AuthenticationError>);

impl MaybeAuthUser {
    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().ok().map(|i| i.id)
    }
}

impl FromRequestParts<App> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let jar = axum_extra::extract::cookie::CookieJar::from_headers(&parts.headers);

        let session_token: &str = if let Some(t) = jar.get(COOKIE_NAME) {
            t.value()
        } else {
            return Ok(MaybeAuthUser(Err(AuthenticationError::NoCookie)));
        };

        use crate::schema::{identities, sessions};

        let mut conn = state.diesel.get().await?;

        let identity = sessions::table
            .inner_join(identities::table)
            .filter(sessions::token.eq(session_token))
            .filter(sessions::active.eq(true))
            .filter(sessions::expires_at.gt(diesel::dsl::now))
            .filter(sessions::issued_at.le(diesel::dsl::now))
            .select(Identity::as_select())
            .first::<Identity>(&mut conn)
            .await
            .optional()?;

        Ok(MaybeAuthUser(
            identity.ok_or(AuthenticationError::Unauthorized),
        ))
    }
}

pub struct AuthUser(pub Identity);

impl FromRequestParts<App> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(auth_user) = MaybeAuthUser::from_request_parts(parts, state).await?;

        Ok(AuthUser(auth_user?))
    }
}

/// An authenticated identity listed in `ADMIN_IDENTITY_IDS`.
pub struct AdminUser(pub Identity);

impl FromRequestParts<App> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;

        if !state.config.is_admin(identity.id) {
            tracing::warn!(identity_id = identity.id, "Non-admin tried to use the back-office");
            return Err(AuthenticationError::Forbidden.into());
        }

        Ok(AdminUser(identity))
    }
}
