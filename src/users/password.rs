use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("argon2 hash_password error: {0}")]
    Hashing(String),
    #[error("argon2 parse hash error: {0}")]
    MalformedHash(String),
}

/// A user's credential: the argon2 PHC hash, plus the plaintext while it is
/// being set so it can be validated. The plaintext is never persisted.
#[derive(Clone)]
pub struct Password {
    plaintext: Option<String>,
    hash: String,
}

impl Password {
    pub fn from_plaintext(plaintext: &str) -> Result<Self, PasswordError> {
        let mut password = Self::from_hash(String::new());
        password.set(plaintext)?;
        Ok(password)
    }

    /// Wraps a hash loaded from storage.
    pub fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash,
        }
    }

    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        self.hash = hash_password(plaintext)?;
        self.plaintext = Some(plaintext.to_string());
        Ok(())
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub fn matches(&self, candidate: &str) -> Result<bool, PasswordError> {
        verify_password(candidate, &self.hash)
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(**redacted**)")
    }
}

fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hashing(e.to_string())
        })
}

fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::MalformedHash(e.to_string())
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
    }
}
