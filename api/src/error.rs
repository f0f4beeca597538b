use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::deadpool::PoolError;
use serde::Serialize;
use serde_json::Value;

/// Domain errors that are caused by the request itself. The message is shown
/// to the user as is, so it must not leak internals.
pub trait ApiRequestError: std::error::Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Debug)]
pub enum ServerError {
    Database(DieselError),
    Pool(PoolError),
    Internal(eyre::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Database(e) => write!(f, "database error: {e}"),
            ServerError::Pool(e) => write!(f, "connection pool error: {e}"),
            ServerError::Internal(e) => write!(f, "internal error: {e:#}"),
        }
    }
}

impl Serialize for ServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("message", &self.to_string())?;
        map.end()
    }
}

#[derive(Debug)]
pub enum AppError {
    ServerError {
        error: ServerError,

        #[cfg(debug_assertions)]
        backtrace: Option<backtrace::Backtrace>,
    },
    RequestError {
        status: StatusCode,
        msg: String,
    },
    Unhandled(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

fn status_code_name(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("ERR")
        .to_uppercase()
        .replace([' ', '-'], "_")
}

impl AppError {
    fn server(error: ServerError) -> Self {
        AppError::ServerError {
            error,
            #[cfg(debug_assertions)]
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServerError { .. } | AppError::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::RequestError { status, .. } => *status,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();

        let error_response = match self {
            AppError::ServerError {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                tracing::error!(%error, "request failed with a server error");

                #[cfg(debug_assertions)]
                {
                    let frames_info = backtrace
                        .as_ref()
                        .map(filter_backtrace)
                        .unwrap_or_default();
                    ErrorResponse {
                        code: "SERVER_ERR".into(),
                        msg: Some("Internal server error".into()),
                        debug_info: Some(HashMap::from([
                            (
                                "backtrace",
                                serde_json::to_value(&frames_info).unwrap_or_default(),
                            ),
                            ("error", serde_json::to_value(&error).unwrap_or_default()),
                        ])),
                    }
                }

                #[cfg(not(debug_assertions))]
                {
                    let _ = error;
                    ErrorResponse {
                        code: "SERVER_ERR".into(),
                        msg: Some("Internal server error".into()),
                    }
                }
            }
            AppError::RequestError { status, msg } => ErrorResponse {
                code: status_code_name(status),
                msg: Some(msg),
                #[cfg(debug_assertions)]
                debug_info: None,
            },
            AppError::Unhandled(e) => {
                tracing::error!(error = %e, "request failed with an unhandled error");
                ErrorResponse {
                    code: "ERR".into(),
                    msg: Some(e),
                    #[cfg(debug_assertions)]
                    debug_info: None,
                }
            }
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl From<DieselError> for AppError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => AppError::RequestError {
                status: StatusCode::NOT_FOUND,
                msg: "Not found".into(),
            },
            // Racing mutations against the same row, e.g. a double-clicked vote
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::RequestError {
                    status: StatusCode::CONFLICT,
                    msg: "Conflicting update, please refresh and try again".into(),
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::RequestError {
                    status: StatusCode::BAD_REQUEST,
                    msg: "Referenced item does not exist".into(),
                }
            }
            e => AppError::server(ServerError::Database(e)),
        }
    }
}

impl From<PoolError> for AppError {
    fn from(e: PoolError) -> Self {
        AppError::server(ServerError::Pool(e))
    }
}

impl From<eyre::Error> for AppError {
    fn from(e: eyre::Error) -> Self {
        // Let database errors that bubbled through an eyre report keep their
        // request-level mapping (404, 409, ...)
        match e.downcast::<DieselError>() {
            Ok(e) => e.into(),
            Err(e) => AppError::server(ServerError::Internal(e)),
        }
    }
}

impl<E: ApiRequestError> From<E> for AppError {
    fn from(e: E) -> Self {
        AppError::RequestError {
            status: e.status_code(),
            msg: e.to_string(),
        }
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError::Unhandled(e.into())
    }
}

impl From<String> for AppError {
    fn from(e: String) -> Self {
        AppError::Unhandled(e)
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((msg, status): (&'static str, StatusCode)) -> Self {
        AppError::RequestError {
            status,
            msg: msg.into(),
        }
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        AppError::RequestError { status, msg }
    }
}

#[cfg(debug_assertions)]
#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.display(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("nope")]
        Forbidden,
    }

    impl ApiRequestError for TestError {
        fn status_code(&self) -> StatusCode {
            StatusCode::FORBIDDEN
        }
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: AppError = DieselError::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_request_errors_keep_their_status() {
        let err: AppError = TestError::Forbidden.into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err: AppError = ("Content too long", StatusCode::BAD_REQUEST).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_constraint_violations_are_request_errors() {
        let err: AppError = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key value violates unique constraint")),
        )
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err: AppError = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(String::from("violates foreign key constraint")),
        )
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure,
            Box::new(String::from("could not serialize access")),
        )
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_eyre_wrapped_diesel_error_is_unwrapped() {
        let err: AppError = eyre::Error::from(DieselError::NotFound).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: AppError = eyre::eyre!("boom").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_code_name() {
        assert_eq!(status_code_name(StatusCode::TOO_MANY_REQUESTS), "TOO_MANY_REQUESTS");
        assert_eq!(status_code_name(StatusCode::NOT_FOUND), "NOT_FOUND");
    }
}
