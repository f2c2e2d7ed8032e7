//! User operations

use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;

use crate::error::DbError;
use crate::models::{NewUser, TokenOwner, User, UserToken};
use crate::repository::Database;
use crate::utils::format_datetime;

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.phone_number, u.password_hash, \
                            u.active, u.status, u.created_at, u.updated_at, u.deleted_at";

/// Profile fields that may be changed after registration
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub active: Option<bool>,
}

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user and link its roles
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        // Check if user already exists
        if self.username_exists(&user.username).await? {
            return Err(DbError::Duplicate(format!("User '{}' already exists", user.username)));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, phone_number, password_hash, active, status, created_at)
            VALUES (?, ?, ?, ?, 1, 'live', ?)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .bind(format_datetime(now))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from_insert(e, format!("User '{}' already exists", user.username)))?;

        let id: i64 = result.get("id");

        let mut roles = user.roles.clone();
        roles.sort();
        roles.dedup();
        for role in &roles {
            let role_id = Self::ensure_role_in(&mut tx, role).await?;
            Self::link_role_in(&mut tx, id, role_id).await?;
        }

        tx.commit().await?;

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            active: true,
            status: Default::default(),
            roles,
            created_at: now,
            updated_at: None,
            deleted_at: None,
        })
    }

    /// Get a live user by username (exact, case-sensitive match)
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.username = ? AND u.status = 'live'"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(result.map(|row| User::try_from(&row)).transpose()?)
            .await
    }

    /// Get a live user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = ? AND u.status = 'live'"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(result.map(|row| User::try_from(&row)).transpose()?)
            .await
    }

    /// Get the live user whose stored refresh token equals `refresh_token`
    pub async fn get_user_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<TokenOwner>, DbError> {
        let result = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}, ut.id AS token_id, ut.user_id, ut.refresh_token, ut.expires_at
            FROM users u
            JOIN user_tokens ut ON ut.user_id = u.id
            WHERE ut.refresh_token = ? AND u.status = 'live'
            "#
        ))
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = result else {
            return Ok(None);
        };

        let token = UserToken::try_from(&row)?;
        let user = self.with_roles(Some(User::try_from(&row)?)).await?;
        Ok(user.map(|user| TokenOwner { user, token }))
    }

    /// List all live users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.status = 'live' ORDER BY u.username"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut users = rows
            .iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let role_rows = sqlx::query(
            r#"
            SELECT DISTINCT ur.user_id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.status = 'live' AND r.status = 'live'
            ORDER BY r.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut roles: HashMap<i64, Vec<String>> = HashMap::new();
        for row in &role_rows {
            roles
                .entry(row.try_get("user_id")?)
                .or_default()
                .push(row.try_get("name")?);
        }
        for user in &mut users {
            user.roles = roles.remove(&user.id).unwrap_or_default();
        }

        Ok(users)
    }

    /// Update profile fields of a live user
    pub async fn update_user(&self, id: i64, update: UpdateUser) -> Result<bool, DbError> {
        let Some(current) = self.get_user_by_id(id).await? else {
            return Ok(false);
        };

        let email = update.email.unwrap_or(current.email);
        let phone_number = update.phone_number.unwrap_or(current.phone_number);
        let active = update.active.unwrap_or(current.active);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, phone_number = ?, active = ?, updated_at = ?
            WHERE id = ? AND status = 'live'
            "#,
        )
        .bind(email)
        .bind(phone_number)
        .bind(active)
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a user
    pub async fn trash_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = 'trashed', deleted_at = ?
            WHERE id = ? AND status = 'live'
            "#,
        )
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check whether a username is taken, trashed users included
    pub async fn username_exists(&self, username: &str) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }

    /// Check whether a user ID exists, trashed users included
    pub async fn user_id_exists(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }

    async fn with_roles(&self, user: Option<User>) -> Result<Option<User>, DbError> {
        match user {
            Some(mut user) => {
                user.roles = self.get_user_roles(user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}
