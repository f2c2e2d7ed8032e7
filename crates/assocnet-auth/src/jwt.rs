//! JWT access token management

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::AuthError;
use crate::lifetime::checked_lifetime;

/// Access token issuer settings. Every field is required.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub key: String,
    pub issuer: String,
    pub audience: String,
    pub expiration_minutes: i64,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Username
    pub name: String,
    /// Role names, carried on the wire as one comma-separated string
    #[serde(with = "role_list")]
    pub role: BTreeSet<String>,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

mod role_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(roles: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
        let joined = roles.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        s.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        let joined = String::deserialize(d)?;
        Ok(joined
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expiration: Duration,
}

impl JwtManager {
    /// Create a new JWT manager, rejecting incomplete settings
    pub fn new(settings: &JwtSettings) -> Result<Self, AuthError> {
        if settings.key.trim().is_empty() {
            return Err(AuthError::Configuration("JWT signing key is not set".to_string()));
        }
        if settings.issuer.trim().is_empty() {
            return Err(AuthError::Configuration("JWT issuer is not set".to_string()));
        }
        if settings.audience.trim().is_empty() {
            return Err(AuthError::Configuration("JWT audience is not set".to_string()));
        }
        if settings.expiration_minutes <= 0 {
            return Err(AuthError::Configuration(format!(
                "Access token expiration must be positive, got {} minutes",
                settings.expiration_minutes
            )));
        }

        let expiration = checked_lifetime(
            "Access token expiration",
            Duration::try_minutes(settings.expiration_minutes),
            Utc::now(),
        )?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.key.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            expiration,
        })
    }

    /// Lifetime of issued access tokens in seconds
    pub fn expires_in(&self) -> i64 {
        self.expiration.num_seconds()
    }

    /// Generate a signed access token for a user
    pub fn generate_token(
        &self,
        user_id: i64,
        username: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            name: username.to_string(),
            role: roles.iter().cloned().collect(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiration).timestamp(),
        };

        debug!("Generating token for user: {}", username);

        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate a JWT token and return claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(AuthError::TokenExpired),
            Err(e) => Err(AuthError::Jwt(e)),
        }
    }
}
