//! Request/Response DTOs

use assocnet_auth::Tokens;
use assocnet_db::{Association, User};
use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Register request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Register response (without password)
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: i64,
    pub user_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub active: bool,
    pub roles: Vec<String>,
}

impl From<User> for RegisterResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            user_name: user.username,
            email: user.email,
            phone_number: user.phone_number,
            active: user.active,
            roles: user.roles,
        }
    }
}

/// Login request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// Access token response. The refresh token travels in a cookie.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<&Tokens> for TokenResponse {
    fn from(tokens: &Tokens) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ==================== User Types ====================

/// Update user request; absent fields are left unchanged
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// User response (without password)
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub user_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub active: bool,
    pub roles: Vec<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_name: user.username,
            email: user.email,
            phone_number: user.phone_number,
            active: user.active,
            roles: user.roles,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

// ==================== Association Types ====================

fn default_active() -> bool {
    true
}

/// Create/update association request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRequest {
    pub name: String,
    pub website: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationResponse {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<Association> for AssociationResponse {
    fn from(association: Association) -> Self {
        Self {
            id: association.id,
            name: association.name,
            website: association.website,
            active: association.active,
            created_at: association.created_at.to_rfc3339(),
            updated_at: association.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}
