//! assocnet Database Layer
//!
//! This crate provides the persistence layer for assocnet: users, roles,
//! per-user refresh token records and associations, stored in SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::{Database, UpdateUser};

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
