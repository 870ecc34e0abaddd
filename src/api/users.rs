use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_password, validate_username};
use crate::db::{RegisterUserRequest, User, UserResponse};
use crate::AppState;

fn validate_register_request(req: &RegisterUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_username(&req.username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    errors.finish()
}

/// Register a new account
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_register_request(&req)?;

    let user = User::create(
        &state.db,
        &req.username,
        &req.password,
        &state.config.auth.password_hash,
    )
    .await
    .map_err(|e| match ApiError::from(e) {
        err if err.status() == StatusCode::CONFLICT => {
            ApiError::conflict("a user with that username already exists")
        }
        err => err,
    })?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
