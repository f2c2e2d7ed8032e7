//! Authentication error types

use assocnet_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

impl AuthError {
    /// Whether the caller failed to prove who they are, as opposed to the
    /// server failing to answer.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidRefreshToken
                | AuthError::Jwt(_)
                | AuthError::InvalidToken
                | AuthError::TokenExpired
                | AuthError::MissingAuthHeader
                | AuthError::InvalidAuthHeader
        )
    }
}
