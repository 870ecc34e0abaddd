//! Cryptographic primitives for credentials.
//!
//! Two unrelated hashing schemes live here:
//!
//! - [`password`]: salted, memory-hard Argon2id digests for user passwords.
//!   Every call produces a different digest, so a stored hash can only be
//!   checked, never looked up.
//! - [`token`]: random bearer secrets whose SHA-256 is stored as the lookup
//!   key. The hash must be deterministic because the only way to find a
//!   token row is to recompute it from the secret the client presents.

pub mod password;
pub mod token;

pub use password::{PasswordError, PasswordHash};
pub use token::{hash_plaintext, IssuedSecret, TokenError, TOKEN_BYTES};
