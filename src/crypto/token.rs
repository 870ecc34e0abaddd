//! Opaque bearer secrets and their lookup hashes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, TryRngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the raw secret in bytes (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("token lifetime must be positive and keep the expiry within year 9999")]
    InvalidTtl,
}

/// A freshly generated secret: the transport form and its storage key.
pub struct IssuedSecret {
    /// base64url (unpadded) encoding of the raw bytes; handed out once.
    pub plaintext: String,
    /// SHA-256 of the raw bytes.
    pub hash: [u8; 32],
}

/// Draw a new secret from the operating system RNG.
pub fn generate_secret() -> Result<IssuedSecret, TokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::EntropyUnavailable(e.to_string()))?;

    Ok(IssuedSecret {
        plaintext: URL_SAFE_NO_PAD.encode(bytes),
        hash: Sha256::digest(bytes).into(),
    })
}

/// Recompute the lookup hash from a presented plaintext.
///
/// Returns `None` when the value cannot be one of our secrets (bad encoding
/// or wrong length), which callers treat exactly like an unknown token.
pub fn hash_plaintext(presented: &str) -> Option<[u8; 32]> {
    let bytes = URL_SAFE_NO_PAD.decode(presented).ok()?;
    if bytes.len() != TOKEN_BYTES {
        return None;
    }
    Some(Sha256::digest(&bytes).into())
}
