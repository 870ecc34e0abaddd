//! User and request identity models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::config::PasswordHashConfig;
use crate::crypto::PasswordHash;
use crate::db::{timestamp, StoreError};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: PasswordHash,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
}

/// Who is making a request, as decided by the authentication gate.
///
/// Anonymity is a variant, not a magic user id, so it can only be detected
/// by matching on it.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

impl User {
    /// Create a user, hashing the password on the blocking pool.
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        password: &str,
        params: &PasswordHashConfig,
    ) -> Result<User, StoreError> {
        let password = password.to_string();
        let params = params.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || PasswordHash::generate(&password, &params))
                .await??;

        let created_at = timestamp(chrono::Utc::now());
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(&created_at)
        .execute(db)
        .await?
        .last_insert_rowid();

        tracing::info!(user_id = id, "Created user {}", username);

        Ok(User {
            id,
            username: username.to_string(),
            password_hash,
            created_at,
        })
    }

    pub async fn get_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Check a plaintext password against the stored digest.
    ///
    /// `Ok(false)` is a wrong password; `Err(StoreError::Password(_))` means
    /// the stored digest is corrupt or uses an unsupported algorithm.
    pub async fn verify_password(&self, plaintext: &str) -> Result<bool, StoreError> {
        let hash = self.password_hash.clone();
        let plaintext = plaintext.to_string();
        let matched = tokio::task::spawn_blocking(move || hash.matches(&plaintext)).await??;
        Ok(matched)
    }
}
