//! Refresh token record operations
//!
//! Each user owns at most one `user_tokens` row. Writes are upserts keyed on
//! `user_id`.

use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{NewUserToken, UserToken};
use crate::repository::Database;
use crate::utils::format_datetime;

impl Database {
    // ==================== Refresh Token Operations ====================

    /// Get the refresh token record of a user
    pub async fn get_user_token(&self, user_id: i64) -> Result<Option<UserToken>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id AS token_id, user_id, refresh_token, expires_at
            FROM user_tokens
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| UserToken::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Store a refresh token for a user and return the record that is live
    /// afterwards.
    ///
    /// An existing token is only replaced when `force` is set or when it is
    /// empty or expired as of `now`. Otherwise the stored token is kept and
    /// returned, so concurrent writers converge on a single live token.
    pub async fn put_refresh_token(
        &self,
        token: NewUserToken,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<UserToken, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, refresh_token, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE
            SET refresh_token = excluded.refresh_token, expires_at = excluded.expires_at
            WHERE ?
               OR user_tokens.refresh_token IS NULL
               OR user_tokens.refresh_token = ''
               OR user_tokens.expires_at IS NULL
               OR user_tokens.expires_at <= ?
            "#,
        )
        .bind(token.user_id)
        .bind(&token.refresh_token)
        .bind(format_datetime(token.expires_at))
        .bind(force)
        .bind(format_datetime(now))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id AS token_id, user_id, refresh_token, expires_at
            FROM user_tokens
            WHERE user_id = ?
            "#,
        )
        .bind(token.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UserToken::try_from(&row)?)
    }

    /// Clear a user's refresh token and expire it at `now`.
    ///
    /// Returns the number of records touched (0 or 1).
    pub async fn clear_refresh_token(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE user_tokens
            SET refresh_token = NULL, expires_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(format_datetime(now))
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
