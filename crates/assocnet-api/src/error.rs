//! API error types
//!
//! Every error leaves the server as `{"error": <message>, "code": <CODE>}`.
//! Authentication failures carry fixed messages and internal failures are
//! logged here and answered with a generic 500.

use assocnet_auth::AuthError;
use assocnet_db::DbError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

/// Message returned for every failed login or registration
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

const INTERNAL_ERROR: &str = "Internal server error";

/// Message returned for any body that does not decode into the request type
pub const INVALID_BODY: &str = "Invalid request body";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest(INVALID_BODY.to_string())
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    error!("Request failed: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_ERROR.to_string(),
    )
}

fn unauthorized() -> (StatusCode, &'static str, String) {
    (
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        "Unauthorized".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized => unauthorized(),
            ApiError::Internal(msg) => internal(msg),
            ApiError::Database(e) => match e {
                DbError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found".to_string()),
                _ => internal(e),
            },
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::Conflict(_) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_CREDENTIALS",
                    INVALID_CREDENTIALS.to_string(),
                ),
                AuthError::UnknownUser(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found".to_string())
                }
                e if e.is_authentication_failure() => unauthorized(),
                _ => internal(e),
            },
        };

        let body = axum::Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
