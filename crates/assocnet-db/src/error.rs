//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl DbError {
    /// Map a unique-constraint violation to `Duplicate`, keeping every other
    /// error as a connection error.
    pub(crate) fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return DbError::Duplicate(what.into());
        }
        DbError::Connection(err)
    }
}
