//! Bearer token models and the token store.
//!
//! A token row holds the SHA-256 of the secret, never the secret itself. The
//! plaintext exists only on the [`Token`] returned by [`Token::issue`] and is
//! handed to the client once.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::crypto::{self, token::generate_secret, TokenError};
use crate::db::{timestamp, StoreError, User};

/// Purpose a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenScope {
    Authentication,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TokenScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authentication" => Ok(TokenScope::Authentication),
            "password-reset" => Ok(TokenScope::PasswordReset),
            _ => Err(format!("Unknown token scope: {}", s)),
        }
    }
}

#[derive(Clone)]
pub struct Token {
    /// Transport form of the secret. Never persisted.
    pub plaintext: String,
    pub hash: [u8; 32],
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Response body for a freshly issued token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expiry: String,
}

impl From<&Token> for TokenResponse {
    fn from(token: &Token) -> Self {
        Self {
            token: token.plaintext.clone(),
            expiry: timestamp(token.expiry),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(FromRow)]
struct ResolvedToken {
    hash: Vec<u8>,
    #[sqlx(flatten)]
    user: User,
}

impl Token {
    /// Mint a new token for `user_id` that expires `ttl` from now.
    pub fn issue(user_id: i64, scope: TokenScope, ttl: Duration) -> Result<Token, TokenError> {
        Self::issue_at(user_id, scope, ttl, Utc::now())
    }

    pub fn issue_at(
        user_id: i64,
        scope: TokenScope,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token, TokenError> {
        // Expiries are compared as fixed-width text, which breaks past year 9999
        let expiry = now
            .checked_add_signed(ttl)
            .filter(|expiry| ttl > Duration::zero() && expiry.year() <= 9999)
            .ok_or(TokenError::InvalidTtl)?;

        let secret = generate_secret()?;
        Ok(Token {
            plaintext: secret.plaintext,
            hash: secret.hash,
            user_id,
            expiry,
            scope,
        })
    }

    /// Persist the hash, owner, expiry and scope.
    pub async fn insert(&self, db: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?, ?, ?, ?)")
            .bind(self.hash.as_slice())
            .bind(self.user_id)
            .bind(timestamp(self.expiry))
            .bind(self.scope.as_str())
            .execute(db)
            .await?;
        Ok(())
    }

    /// Issue and persist a token. Nothing is returned unless the row is stored.
    pub async fn create_new_token(
        db: &SqlitePool,
        user_id: i64,
        scope: TokenScope,
        ttl: Duration,
    ) -> Result<Token, StoreError> {
        let token = Self::issue(user_id, scope, ttl)?;
        token.insert(db).await?;

        tracing::debug!(user_id, scope = %scope, "Issued token");
        Ok(token)
    }

    /// Find the owner of a presented plaintext.
    ///
    /// Unknown, expired and wrongly scoped tokens all come back as `Ok(None)`.
    pub async fn resolve(
        db: &SqlitePool,
        scope: TokenScope,
        presented: &str,
    ) -> Result<Option<User>, StoreError> {
        Self::resolve_at(db, scope, presented, Utc::now()).await
    }

    pub async fn resolve_at(
        db: &SqlitePool,
        scope: TokenScope,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let Some(hash) = crypto::hash_plaintext(presented) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ResolvedToken>(
            r#"
            SELECT t.hash AS hash, u.id AS id, u.username AS username,
                   u.password_hash AS password_hash, u.created_at AS created_at
            FROM tokens t
            INNER JOIN users u ON u.id = t.user_id
            WHERE t.hash = ? AND t.scope = ? AND t.expiry > ?
            "#,
        )
        .bind(hash.as_slice())
        .bind(scope.as_str())
        .bind(timestamp(now))
        .fetch_optional(db)
        .await?;

        Ok(row
            .filter(|row| bool::from(row.hash.as_slice().ct_eq(hash.as_slice())))
            .map(|row| row.user))
    }

    /// Revoke every token of `scope` owned by `user_id`. Returns how many
    /// rows were removed; zero is not an error.
    pub async fn delete_all_for_user(
        db: &SqlitePool,
        user_id: i64,
        scope: TokenScope,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = ? AND scope = ?")
            .bind(user_id)
            .bind(scope.as_str())
            .execute(db)
            .await?;

        let revoked = result.rows_affected();
        tracing::debug!(user_id, scope = %scope, revoked, "Revoked tokens");
        Ok(revoked)
    }

    /// Remove tokens whose expiry has passed
    pub async fn delete_expired(db: &SqlitePool) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expiry <= ?")
            .bind(timestamp(Utc::now()))
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
