//! Bearer token authentication.
//!
//! The gate turns an `Authorization` header into an [`Identity`]. A missing
//! header is a valid anonymous request; a header that is present but cannot
//! be honoured is always denied with the same response, whatever the reason.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Response,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{Identity, Token, TokenScope, User};
use crate::AppState;

const INVALID_TOKEN_MESSAGE: &str = "invalid or expired authentication token";
const AUTHENTICATION_REQUIRED_MESSAGE: &str = "you must be authenticated to access this resource";

/// Why a presented credential was refused. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Denial {
    MalformedHeader,
    UnknownOrExpired,
    StoreFailure,
}

impl Denial {
    fn into_api_error(self) -> ApiError {
        match self {
            Denial::StoreFailure => tracing::warn!(reason = ?self, "Authentication denied"),
            _ => tracing::debug!(reason = ?self, "Authentication denied"),
        }
        ApiError::unauthorized(INVALID_TOKEN_MESSAGE)
    }
}

/// Split an `Authorization` value into its bearer token.
///
/// The value must be exactly `Bearer <token>`; anything else is `None`.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Pull the bearer credential out of the headers without touching the store.
fn bearer_credential(headers: &HeaderMap) -> Result<Option<&str>, Denial> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| Denial::MalformedHeader)?;
    parse_bearer(value)
        .map(Some)
        .ok_or(Denial::MalformedHeader)
}

/// Decide who is making the request.
pub async fn authenticate(db: &SqlitePool, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = match bearer_credential(headers) {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(Identity::Anonymous),
        Err(denial) => return Err(denial.into_api_error()),
    };

    match Token::resolve(db, TokenScope::Authentication, token).await {
        Ok(Some(user)) => Ok(Identity::Authenticated(user)),
        Ok(None) => Err(Denial::UnknownOrExpired.into_api_error()),
        Err(e) => {
            tracing::error!(error = %e, "Token lookup failed");
            Err(Denial::StoreFailure.into_api_error())
        }
    }
}

/// Reject anonymous identities. Does not consult the store.
pub fn require_authenticated(identity: &Identity) -> Result<&User, ApiError> {
    match identity {
        Identity::Authenticated(user) => Ok(user),
        Identity::Anonymous => Err(ApiError::unauthorized(AUTHENTICATION_REQUIRED_MESSAGE)),
    }
}

/// Runs the gate and hands the resulting identity to the handler
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&state.db, &parts.headers).await
    }
}

/// Extractor for handlers that refuse anonymous callers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        require_authenticated(&identity)
            .cloned()
            .map(AuthenticatedUser)
    }
}

/// Responses depend on the caller's credential, so caches must key on it
pub async fn vary_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
