//! Bearer token helpers for the HTTP layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};

/// Authenticated user information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub roles: BTreeSet<String>,
}

impl AuthUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        Ok(Self {
            id: claims.sub.parse().map_err(|_| AuthError::InvalidToken)?,
            username: claims.name.clone(),
            roles: claims.role.clone(),
        })
    }

    /// Validate an `Authorization` header value and return its user
    pub fn authenticate(jwt: &JwtManager, header: Option<&str>) -> Result<Self, AuthError> {
        let header = header.ok_or(AuthError::MissingAuthHeader)?;
        let token = extract_bearer_token(header)?;
        let user = Self::from_claims(&jwt.validate_token(token)?)?;

        debug!("Authenticated user: {} ({})", user.username, user.id);
        Ok(user)
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}
