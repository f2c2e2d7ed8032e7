//! Register, login, logout and token refresh

use assocnet_db::{DbError, NewUser, User};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::jwt::{JwtManager, JwtSettings};
use crate::password::CredentialVerifier;
use crate::refresh::{RefreshTokenRotator, RotationPolicy};
use crate::store::{TokenStore, UserStore};

/// Settings for [`AuthService`]
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt: JwtSettings,
    pub refresh_token_expiration_days: i64,
    pub rotation: RotationPolicy,
    /// Roles linked to every newly registered user
    pub default_roles: Vec<String>,
}

/// A new account
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Credentials handed to a client after login or refresh
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtManager>,
    rotator: RefreshTokenRotator,
    verifier: CredentialVerifier,
    rotation: RotationPolicy,
    default_roles: Vec<String>,
}

impl AuthService {
    /// Build the service. Fails on incomplete token settings.
    pub fn new(
        settings: &AuthSettings,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let jwt = Arc::new(JwtManager::new(&settings.jwt)?);
        let rotator =
            RefreshTokenRotator::new(users.clone(), tokens, settings.refresh_token_expiration_days)?;

        Ok(Self {
            users,
            jwt,
            rotator,
            verifier: CredentialVerifier::new()?,
            rotation: settings.rotation,
            default_roles: settings.default_roles.clone(),
        })
    }

    /// The access token issuer, shared with request extractors
    pub fn jwt(&self) -> Arc<JwtManager> {
        self.jwt.clone()
    }

    pub fn rotator(&self) -> &RefreshTokenRotator {
        &self.rotator
    }

    /// Create an account. Fails with `Conflict` if the username is taken.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        if self.users.username_exists(&registration.username).await? {
            metrics::counter!("assocnet_registrations_total", "outcome" => "conflict").increment(1);
            return Err(AuthError::Conflict(registration.username));
        }

        let password_hash = self.verifier.hash(&registration.password)?;
        let new_user = NewUser {
            username: registration.username.clone(),
            email: registration.email,
            phone_number: registration.phone_number,
            password_hash,
            roles: self.default_roles.clone(),
        };

        // The insert can still lose a race against a concurrent registration
        let user = match self.users.create_user(new_user).await {
            Ok(user) => user,
            Err(DbError::Duplicate(_)) => {
                metrics::counter!("assocnet_registrations_total", "outcome" => "conflict").increment(1);
                return Err(AuthError::Conflict(registration.username));
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("assocnet_registrations_total", "outcome" => "success").increment(1);
        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Exchange a username and password for tokens.
    ///
    /// Unknown users, inactive users and wrong passwords all fail with
    /// `InvalidCredentials`.
    pub async fn login(&self, username: &str, password: &str) -> Result<Tokens, AuthError> {
        debug!("Login attempt for user: {}", username);

        let user = self.users.find_by_username(username).await?;
        let password_valid = self
            .verifier
            .verify(password, user.as_ref().map(|u| u.password_hash.as_str()));

        let user = match user {
            Some(user) if password_valid && user.active => user,
            _ => {
                metrics::counter!("assocnet_logins_total", "outcome" => "failure").increment(1);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        let refresh = self.rotator.issue(user.id, now).await?;
        let tokens = self.tokens_for(&user, refresh.token, refresh.expires_at, now)?;

        metrics::counter!("assocnet_logins_total", "outcome" => "success").increment(1);
        info!("User {} logged in", user.username);
        Ok(tokens)
    }

    /// Revoke the refresh token presented by a client
    pub async fn logout(&self, refresh_token: &str) -> Result<u64, AuthError> {
        let now = Utc::now();
        let Some(user) = self.rotator.validate(refresh_token, now).await? else {
            return Err(AuthError::InvalidRefreshToken);
        };

        let rows = match self.rotator.invalidate(user.id, now).await {
            Ok(rows) => rows,
            Err(AuthError::UnknownUser(_)) => 0,
            Err(e) => return Err(e),
        };
        if rows == 0 {
            warn!("Refresh token of user {} vanished during logout", user.id);
            return Err(AuthError::InvalidRefreshToken);
        }

        metrics::counter!("assocnet_logouts_total").increment(1);
        info!("User {} logged out", user.username);
        Ok(rows)
    }

    /// Exchange a refresh token for a new access token. The refresh token is
    /// kept or replaced according to the rotation policy.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let now = Utc::now();
        let Some(user) = self.rotator.validate(refresh_token, now).await? else {
            metrics::counter!("assocnet_token_refreshes_total", "outcome" => "failure").increment(1);
            return Err(AuthError::InvalidRefreshToken);
        };

        let refresh = match self.rotation {
            RotationPolicy::ReuseWhileValid => self.rotator.issue(user.id, now).await?,
            RotationPolicy::RotateOnRefresh => self.rotator.rotate(user.id, now).await?,
        };
        let tokens = self.tokens_for(&user, refresh.token, refresh.expires_at, now)?;

        metrics::counter!("assocnet_token_refreshes_total", "outcome" => "success").increment(1);
        debug!("Refreshed tokens for user {}", user.username);
        Ok(tokens)
    }

    /// Revoke whatever refresh token a user holds
    pub async fn revoke_user(&self, user_id: i64) -> Result<u64, AuthError> {
        self.rotator.invalidate(user_id, Utc::now()).await
    }

    fn tokens_for(
        &self,
        user: &User,
        refresh_token: String,
        refresh_token_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Tokens, AuthError> {
        Ok(Tokens {
            access_token: self.jwt.generate_token(user.id, &user.username, &user.roles, now)?,
            expires_in: self.jwt.expires_in(),
            refresh_token,
            refresh_token_expires_at,
        })
    }
}
