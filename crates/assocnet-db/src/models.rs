//! Database models

use crate::utils::{parse_datetime_or_now, parse_optional_datetime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidRecordStatus(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRecordStatus(s) => write!(f, "Invalid record status: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Soft-delete status of a row.
///
/// Trashed rows stay in their table and are filtered out by every read query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Live,
    Trashed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Live => "live",
            RecordStatus::Trashed => "trashed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(RecordStatus::Live),
            "trashed" => Ok(RecordStatus::Trashed),
            _ => Err(ParseError::InvalidRecordStatus(s.to_string())),
        }
    }
}

// ==================== Users ====================

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub status: RecordStatus,
    /// Role names, ordered and without duplicates
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: String,
    /// Roles to link on creation; missing roles are created
    pub roles: Vec<String>,
}

/// Role model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

// ==================== Refresh Tokens ====================

/// Per-user refresh token record (one row per user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserToken {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Refresh token to store for a user
#[derive(Debug, Clone)]
pub struct NewUserToken {
    pub user_id: i64,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A user together with the refresh token record that resolved to them
#[derive(Debug, Clone)]
pub struct TokenOwner {
    pub user: User,
    pub token: UserToken,
}

// ==================== Associations ====================

/// Association model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub active: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Association fields set on create and update
#[derive(Debug, Clone)]
pub struct AssociationInput {
    pub name: String,
    pub website: String,
    pub active: bool,
}

// ==================== TryFrom Implementations ====================

fn status_column(row: &sqlx::sqlite::SqliteRow) -> Result<RecordStatus, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(RecordStatus::from_str(&status).unwrap_or(RecordStatus::Live))
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            password_hash: row.try_get("password_hash")?,
            active: row.try_get("active")?,
            status: status_column(row)?,
            roles: Vec::new(),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_optional_datetime(row.try_get("updated_at")?),
            deleted_at: parse_optional_datetime(row.try_get("deleted_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Role {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Role {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            active: row.try_get("active")?,
            status: status_column(row)?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for UserToken {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(UserToken {
            id: row.try_get("token_id")?,
            user_id: row.try_get("user_id")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: parse_optional_datetime(row.try_get("expires_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Association {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Association {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            website: row.try_get("website")?,
            active: row.try_get("active")?,
            status: status_column(row)?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_optional_datetime(row.try_get("updated_at")?),
            deleted_at: parse_optional_datetime(row.try_get("deleted_at")?),
        })
    }
}
