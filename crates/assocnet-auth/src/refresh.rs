//! Refresh token generation, rotation and revocation
//!
//! Each user has at most one live refresh token. Tokens are opaque: 32 random
//! bytes from the OS, base64-encoded, compared by exact string match.

use assocnet_db::{DbError, NewUserToken, User};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::AuthError;
use crate::lifetime::checked_lifetime;
use crate::store::{TokenStore, UserStore};

/// Number of random bytes in a refresh token
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a new opaque refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// What a successful refresh does to the refresh token itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Hand back the stored token until it expires
    #[default]
    ReuseWhileValid,
    /// Replace the stored token on every refresh
    RotateOnRefresh,
}

impl RotationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationPolicy::ReuseWhileValid => "reuse-while-valid",
            RotationPolicy::RotateOnRefresh => "rotate-on-refresh",
        }
    }
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationPolicy {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reuse-while-valid" => Ok(RotationPolicy::ReuseWhileValid),
            "rotate-on-refresh" => Ok(RotationPolicy::RotateOnRefresh),
            other => Err(AuthError::Configuration(format!(
                "Unknown refresh token rotation policy: {}",
                other
            ))),
        }
    }
}

/// A refresh token as handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes per-user refresh tokens
pub struct RefreshTokenRotator {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    lifetime: Duration,
}

impl RefreshTokenRotator {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        lifetime_days: i64,
    ) -> Result<Self, AuthError> {
        if lifetime_days <= 0 {
            return Err(AuthError::Configuration(format!(
                "Refresh token expiration must be positive, got {} days",
                lifetime_days
            )));
        }
        let lifetime = checked_lifetime(
            "Refresh token expiration",
            Duration::try_days(lifetime_days),
            Utc::now(),
        )?;
        Ok(Self {
            users,
            tokens,
            lifetime,
        })
    }

    /// Lifetime of newly issued refresh tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Return the user's live refresh token, creating one if the stored token
    /// is missing, empty or expired.
    pub async fn issue(&self, user_id: i64, now: DateTime<Utc>) -> Result<IssuedRefreshToken, AuthError> {
        self.store(user_id, now, false).await
    }

    /// Replace the user's refresh token unconditionally
    pub async fn rotate(&self, user_id: i64, now: DateTime<Utc>) -> Result<IssuedRefreshToken, AuthError> {
        self.store(user_id, now, true).await
    }

    async fn store(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<IssuedRefreshToken, AuthError> {
        if !self.users.user_exists(user_id).await? {
            return Err(AuthError::UnknownUser(user_id));
        }

        let candidate = NewUserToken {
            user_id,
            refresh_token: generate_refresh_token(),
            expires_at: now + self.lifetime,
        };
        let stored = self.tokens.put_refresh_token(candidate, now, force).await?;

        match (stored.refresh_token, stored.expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() && expires_at > now => {
                debug!("Refresh token for user {} valid until {}", user_id, expires_at);
                Ok(IssuedRefreshToken { token, expires_at })
            }
            _ => Err(AuthError::Store(DbError::NotFound(format!(
                "Live refresh token for user {}",
                user_id
            )))),
        }
    }

    /// Resolve a presented refresh token to its owner.
    ///
    /// Returns `None` when nobody owns the token, the stored token differs,
    /// it has no expiry or has expired as of `now`, or the owner is inactive.
    pub async fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(owner) = self.users.find_by_refresh_token(token).await? else {
            return Ok(None);
        };

        if owner.token.refresh_token.as_deref() != Some(token) {
            return Ok(None);
        }
        match owner.token.expires_at {
            Some(expires_at) if expires_at > now => {}
            _ => return Ok(None),
        }
        if !owner.user.active {
            return Ok(None);
        }

        Ok(Some(owner.user))
    }

    /// Revoke the user's refresh token, returning the number of records
    /// changed.
    pub async fn invalidate(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, AuthError> {
        if !self.users.user_exists(user_id).await? {
            return Err(AuthError::UnknownUser(user_id));
        }
        Ok(self.tokens.clear_refresh_token(user_id, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assocnet_db::{Database, NewUser, UpdateUser, UserToken};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Token store that counts writes before delegating to the database
    struct CountingTokens {
        inner: Database,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl TokenStore for CountingTokens {
        async fn put_refresh_token(
            &self,
            token: NewUserToken,
            now: DateTime<Utc>,
            force: bool,
        ) -> Result<UserToken, DbError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put_refresh_token(token, now, force).await
        }

        async fn clear_refresh_token(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, DbError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.clear_refresh_token(user_id, now).await
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        tokens: Arc<CountingTokens>,
        rotator: RefreshTokenRotator,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("auth.db").display());
        let db = Database::new(&url).await.unwrap();
        let tokens = Arc::new(CountingTokens {
            inner: db.clone(),
            writes: AtomicUsize::new(0),
        });
        let rotator = RefreshTokenRotator::new(Arc::new(db.clone()), tokens.clone(), 7).unwrap();
        Fixture {
            _dir: dir,
            db,
            tokens,
            rotator,
        }
    }

    async fn add_user(db: &Database, username: &str) -> i64 {
        db.insert_user(NewUser {
            username: username.to_string(),
            email: None,
            phone_number: None,
            password_hash: "hash".to_string(),
            roles: vec![],
        })
        .await
        .unwrap()
        .id
    }

    #[test]
    fn test_generated_tokens() {
        let first = generate_refresh_token();
        let second = generate_refresh_token();

        assert_eq!(first.len(), 44);
        assert_eq!(STANDARD.decode(&first).unwrap().len(), REFRESH_TOKEN_BYTES);
        assert_ne!(first, second);
    }

    #[test]
    fn test_rotation_policy_parsing() {
        assert_eq!(
            "reuse-while-valid".parse::<RotationPolicy>().unwrap(),
            RotationPolicy::ReuseWhileValid
        );
        assert_eq!(
            "rotate-on-refresh".parse::<RotationPolicy>().unwrap(),
            RotationPolicy::RotateOnRefresh
        );
        assert!("always".parse::<RotationPolicy>().is_err());
        assert_eq!(RotationPolicy::default().to_string(), "reuse-while-valid");
    }

    #[tokio::test]
    async fn test_non_positive_lifetime_rejected() {
        let f = fixture().await;
        let result = RefreshTokenRotator::new(Arc::new(f.db.clone()), f.tokens.clone(), 0);
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_rejected() {
        let f = fixture().await;
        for days in [3_000_000, i64::MAX] {
            let result = RefreshTokenRotator::new(Arc::new(f.db.clone()), f.tokens.clone(), days);
            assert!(matches!(result, Err(AuthError::Configuration(_))));
        }

        // The longest accepted lifetime still round-trips through the store
        let id = add_user(&f.db, "alice").await;
        let rotator =
            RefreshTokenRotator::new(Arc::new(f.db.clone()), f.tokens.clone(), 365 * 7000).unwrap();
        let now = Utc::now();
        let issued = rotator.issue(id, now).await.unwrap();
        assert!(rotator.validate(&issued.token, now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_issue_is_idempotent_while_valid() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();

        let first = f.rotator.issue(id, now).await.unwrap();
        let second = f.rotator.issue(id, now + Duration::hours(1)).await.unwrap();

        assert_eq!(first, second);
        assert!(first.expires_at > now + Duration::days(6));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issue_converges_on_one_token() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let rotator = Arc::new(
            RefreshTokenRotator::new(Arc::new(f.db.clone()), f.tokens.clone(), 7).unwrap(),
        );
        let now = Utc::now();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let rotator = rotator.clone();
            tasks.spawn(async move { rotator.issue(id, now).await });
        }

        let mut issued = Vec::new();
        while let Some(result) = tasks.join_next().await {
            issued.push(result.unwrap().unwrap());
        }

        assert_eq!(issued.len(), 8);
        assert!(issued.iter().all(|t| *t == issued[0]));
        assert_eq!(f.tokens.writes.load(Ordering::SeqCst), 8);

        let stored = f.db.get_user_token(id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(issued[0].token.as_str()));
    }

    #[tokio::test]
    async fn test_issue_replaces_expired_token() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();

        let first = f.rotator.issue(id, now).await.unwrap();
        let later = now + Duration::days(8);
        let second = f.rotator.issue(id, later).await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(second.expires_at > later);
    }

    #[tokio::test]
    async fn test_rotate_replaces_live_token() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();

        let first = f.rotator.issue(id, now).await.unwrap();
        let rotated = f.rotator.rotate(id, now).await.unwrap();

        assert_ne!(first.token, rotated.token);
        assert!(f.rotator.validate(&first.token, now).await.unwrap().is_none());
        assert_eq!(f.rotator.validate(&rotated.token, now).await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_issue_unknown_user() {
        let f = fixture().await;
        let result = f.rotator.issue(404, Utc::now()).await;

        assert!(matches!(result, Err(AuthError::UnknownUser(404))));
        assert_eq!(f.tokens.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();
        let issued = f.rotator.issue(id, now).await.unwrap();

        let user = f.rotator.validate(&issued.token, now).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");

        assert!(f.rotator.validate("", now).await.unwrap().is_none());
        assert!(f.rotator.validate("bogus", now).await.unwrap().is_none());
        // Expiry is exclusive
        assert!(f.rotator.validate(&issued.token, issued.expires_at).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_rejects_inactive_user() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();
        let issued = f.rotator.issue(id, now).await.unwrap();

        f.db.update_user(
            id,
            UpdateUser {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(f.rotator.validate(&issued.token, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        let now = Utc::now();
        let issued = f.rotator.issue(id, now).await.unwrap();

        assert_eq!(f.rotator.invalidate(id, now).await.unwrap(), 1);
        assert!(f.rotator.validate(&issued.token, now).await.unwrap().is_none());

        // The next issue starts a fresh token
        let next = f.rotator.issue(id, Utc::now()).await.unwrap();
        assert_ne!(next.token, issued.token);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_user_writes_nothing() {
        let f = fixture().await;
        let result = f.rotator.invalidate(99, Utc::now()).await;

        assert!(matches!(result, Err(AuthError::UnknownUser(99))));
        assert_eq!(f.tokens.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidate_user_without_token() {
        let f = fixture().await;
        let id = add_user(&f.db, "alice").await;
        assert_eq!(f.rotator.invalidate(id, Utc::now()).await.unwrap(), 0);
    }
}
