//! assocnet Authentication
//!
//! Credential verification, access token issuance and the refresh token
//! lifecycle. The HTTP layer talks to [`AuthService`]; persistence is reached
//! through the [`UserStore`] and [`TokenStore`] traits.

pub mod error;
pub mod jwt;
mod lifetime;
pub mod middleware;
pub mod password;
pub mod refresh;
pub mod service;
pub mod store;

pub use error::AuthError;
pub use jwt::{Claims, JwtManager, JwtSettings};
pub use middleware::{AuthUser, extract_bearer_token};
pub use password::{CredentialVerifier, hash_password, verify_password};
pub use refresh::{IssuedRefreshToken, RefreshTokenRotator, RotationPolicy, generate_refresh_token};
pub use service::{AuthService, AuthSettings, Registration, Tokens};
pub use store::{TokenStore, UserStore};
