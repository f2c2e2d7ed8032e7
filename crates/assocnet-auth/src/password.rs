//! Password hashing and verification (Argon2id)

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::rngs::OsRng;

use crate::error::AuthError;

/// Hash a password with a fresh random salt.
///
/// The salt and parameters are embedded in the returned PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored hash.
///
/// A malformed hash is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Password verifier that spends the same work whether or not a user exists
pub struct CredentialVerifier {
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new() -> Result<Self, AuthError> {
        Ok(Self {
            dummy_hash: hash_password("assocnet-unknown-user")?,
        })
    }

    /// Hash a password for storage
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password)
    }

    /// Verify `password` against `hash`, or against a throwaway hash when
    /// there is no user to check. The latter always fails.
    pub fn verify(&self, password: &str, hash: Option<&str>) -> bool {
        match hash {
            Some(hash) => verify_password(password, hash),
            None => {
                let _ = verify_password(password, &self.dummy_hash);
                false
            }
        }
    }
}
