//! Persistence seams used by the auth core.
//!
//! [`AuthService`](crate::AuthService) only sees these traits. The SQLite
//! [`Database`] implements both.

use assocnet_db::{Database, DbError, NewUser, NewUserToken, TokenOwner, User, UserToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Lookup and creation of credentials
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError>;

    /// Exact, case-sensitive match on the stored username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<TokenOwner>, DbError>;

    /// True for any stored user, trashed ones included
    async fn user_exists(&self, id: i64) -> Result<bool, DbError>;

    async fn username_exists(&self, username: &str) -> Result<bool, DbError>;

    async fn create_user(&self, user: NewUser) -> Result<User, DbError>;
}

/// Per-user refresh token records
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Write `token` unless a live one is already stored (see
    /// [`Database::put_refresh_token`]) and return the record now in place.
    async fn put_refresh_token(
        &self,
        token: NewUserToken,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<UserToken, DbError>;

    async fn clear_refresh_token(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, DbError>;
}

#[async_trait]
impl UserStore for Database {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        self.get_user_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.get_user_by_username(username).await
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<TokenOwner>, DbError> {
        self.get_user_by_refresh_token(token).await
    }

    async fn user_exists(&self, id: i64) -> Result<bool, DbError> {
        self.user_id_exists(id).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DbError> {
        Database::username_exists(self, username).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DbError> {
        self.insert_user(user).await
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn put_refresh_token(
        &self,
        token: NewUserToken,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<UserToken, DbError> {
        Database::put_refresh_token(self, token, now, force).await
    }

    async fn clear_refresh_token(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, DbError> {
        Database::clear_refresh_token(self, user_id, now).await
    }
}
