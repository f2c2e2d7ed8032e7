//! Role operations

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::error::DbError;
#[cfg(test)]
use crate::models::Role;
use crate::repository::Database;
use crate::utils::format_datetime;

impl Database {
    // ==================== Role Operations ====================

    /// Get the names of a user's live roles, sorted
    pub async fn get_user_roles(&self, user_id: i64) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ? AND ur.status = 'live' AND r.status = 'live'
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    /// List all live roles
    #[cfg(test)]
    pub(crate) async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, active, status, created_at
            FROM roles
            WHERE status = 'live'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Role::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Link a role to a user, creating the role if needed.
    ///
    /// Returns `false` when the user does not exist.
    #[cfg(test)]
    pub(crate) async fn assign_role(&self, user_id: i64, role: &str) -> Result<bool, DbError> {
        if !self.user_id_exists(user_id).await? {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        let role_id = Self::ensure_role_in(&mut tx, role).await?;
        Self::link_role_in(&mut tx, user_id, role_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    pub(crate) async fn ensure_role_in(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<i64, DbError> {
        sqlx::query(
            r#"
            INSERT INTO roles (name, active, status, created_at)
            VALUES (?, 1, 'live', ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(format_datetime(Utc::now()))
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.get("id"))
    }

    pub(crate) async fn link_role_in(
        conn: &mut SqliteConnection,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, active, status, created_at)
            VALUES (?, ?, 1, 'live', ?)
            ON CONFLICT(user_id, role_id) DO UPDATE SET status = 'live', deleted_at = NULL
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(format_datetime(Utc::now()))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
