//! Argon2id password digests.

use argon2::{
    password_hash::{self, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, TryRngCore};
use std::fmt;
use thiserror::Error;

use crate::config::PasswordHashConfig;

const SALT_BYTES: usize = 16;

/// Errors raised while producing or checking a password digest.
///
/// A wrong password is *not* an error: [`PasswordHash::matches`] returns
/// `Ok(false)` for that. The `Malformed` and `Unsupported` variants mean the
/// stored digest itself is unusable, which is a server-side defect.
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid password hash parameters: {0}")]
    InvalidParams(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is malformed: {0}")]
    Malformed(String),

    #[error("stored password hash uses an unsupported algorithm: {0}")]
    Unsupported(String),
}

/// A PHC-format Argon2id digest with its salt and cost parameters embedded.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a plaintext password with a fresh random salt.
    pub fn generate(plaintext: &str, config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut salt_bytes = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        let hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self(hash.to_string()))
    }

    /// Wrap a digest read back from storage. No validation happens here;
    /// a broken digest surfaces from [`PasswordHash::matches`].
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a plaintext against this digest using the parameters stored in it.
    ///
    /// The comparison of the derived output is constant time.
    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let parsed = password_hash::PasswordHash::new(&self.0)
            .map_err(|e| PasswordError::Malformed(e.to_string()))?;

        if Algorithm::new(parsed.algorithm.as_str()).is_err() {
            return Err(PasswordError::Unsupported(parsed.algorithm.to_string()));
        }

        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Malformed(e.to_string())),
        }
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}
