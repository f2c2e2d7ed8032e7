//! Association operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Association, AssociationInput, RecordStatus};
use crate::repository::Database;
use crate::utils::format_datetime;

impl Database {
    // ==================== Association Operations ====================

    /// List all live associations
    pub async fn list_associations(&self) -> Result<Vec<Association>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, website, active, status, created_at, updated_at, deleted_at
            FROM associations
            WHERE status = 'live'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Association::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Get a live association by ID
    pub async fn get_association(&self, id: i64) -> Result<Option<Association>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, name, website, active, status, created_at, updated_at, deleted_at
            FROM associations
            WHERE id = ? AND status = 'live'
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Association::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Insert a new association
    pub async fn insert_association(&self, input: AssociationInput) -> Result<Association, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO associations (name, website, active, status, created_at)
            VALUES (?, ?, ?, 'live', ?)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.website)
        .bind(input.active)
        .bind(format_datetime(now))
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(Association {
            id,
            name: input.name,
            website: input.website,
            active: input.active,
            status: RecordStatus::Live,
            created_at: now,
            updated_at: None,
            deleted_at: None,
        })
    }

    /// Update a live association, returning the number of rows changed
    pub async fn update_association(
        &self,
        id: i64,
        input: AssociationInput,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE associations
            SET name = ?, website = ?, active = ?, updated_at = ?
            WHERE id = ? AND status = 'live'
            "#,
        )
        .bind(&input.name)
        .bind(&input.website)
        .bind(input.active)
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Soft-delete an association, returning the number of rows changed
    pub async fn trash_association(&self, id: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE associations
            SET status = 'trashed', deleted_at = ?
            WHERE id = ? AND status = 'live'
            "#,
        )
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
