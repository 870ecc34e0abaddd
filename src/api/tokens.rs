use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::auth::AuthenticatedUser;
use super::error::ApiError;
use crate::crypto::PasswordHash;
use crate::db::{CreateTokenRequest, StoreError, Token, TokenResponse, TokenScope, User};
use crate::AppState;

const INVALID_CREDENTIALS_MESSAGE: &str = "invalid username or password";

const DECOY_PASSWORD: &str = "liftlog-login-decoy";

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE)
}

/// Spend the same Argon2 work on an unknown username as on a known one.
async fn check_decoy_password(state: &AppState, plaintext: &str) {
    let params = state.config.auth.password_hash.clone();
    let decoy = state
        .login_decoy
        .get_or_try_init(|| async move {
            let hash = tokio::task::spawn_blocking(move || {
                PasswordHash::generate(DECOY_PASSWORD, &params)
            })
            .await??;
            Ok::<_, StoreError>(hash)
        })
        .await;

    match decoy {
        Ok(decoy) => {
            let decoy = decoy.clone();
            let plaintext = plaintext.to_string();
            let _ = tokio::task::spawn_blocking(move || decoy.matches(&plaintext)).await;
        }
        Err(e) => tracing::warn!(error = %e, "Failed to prepare login decoy digest"),
    }
}

/// Exchange a username and password for an authentication token.
///
/// Unknown users, wrong passwords and unreadable stored digests all get the
/// same response.
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(invalid_credentials());
    }

    let Some(user) = User::get_by_username(&state.db, &req.username).await? else {
        check_decoy_password(&state, &req.password).await;
        return Err(invalid_credentials());
    };

    match user.verify_password(&req.password).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(user_id = user.id, "Password mismatch on login");
            return Err(invalid_credentials());
        }
        Err(e) => {
            tracing::error!(user_id = user.id, error = %e, "Stored password digest is unusable");
            return Err(invalid_credentials());
        }
    }

    let token = Token::create_new_token(
        &state.db,
        user.id,
        TokenScope::Authentication,
        state.config.auth.token_ttl(),
    )
    .await?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok((StatusCode::CREATED, Json(TokenResponse::from(&token))))
}

/// Revoke every authentication token held by the caller
pub async fn delete_authentication_tokens(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    let revoked =
        Token::delete_all_for_user(&state.db, user.id, TokenScope::Authentication).await?;

    tracing::info!(user_id = user.id, revoked, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
