use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AuthenticatedUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_id, validate_exercise_name, validate_non_negative, validate_optional_non_negative,
    validate_title, validate_weight,
};
use crate::db::{Identity, Workout};
use crate::AppState;

fn workout_id(raw: &str) -> Result<i64, ApiError> {
    parse_id(raw).map_err(|e| ApiError::validation_field("id", e))
}

fn validate_workout_request(req: &Workout) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_non_negative(req.duration_minutes) {
        errors.add("duration_minutes", e);
    }
    if let Err(e) = validate_non_negative(req.calories_burned) {
        errors.add("calories_burned", e);
    }

    for (i, entry) in req.entries.iter().enumerate() {
        if let Err(e) = validate_exercise_name(&entry.exercise_name) {
            errors.add(format!("entries[{}].exercise_name", i), e);
        }
        if let Err(e) = validate_non_negative(entry.sets) {
            errors.add(format!("entries[{}].sets", i), e);
        }
        if let Err(e) = validate_optional_non_negative(entry.reps) {
            errors.add(format!("entries[{}].reps", i), e);
        }
        if let Err(e) = validate_optional_non_negative(entry.duration_seconds) {
            errors.add(format!("entries[{}].duration_seconds", i), e);
        }
        if let Err(e) = validate_weight(entry.weight) {
            errors.add(format!("entries[{}].weight", i), e);
        }
    }

    errors.finish()
}

pub async fn list_workouts(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<Workout>>, ApiError> {
    let workouts = Workout::list_all(&state.db).await?;
    Ok(Json(workouts))
}

pub async fn get_workout(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Workout>, ApiError> {
    let id = workout_id(&id)?;

    let workout = Workout::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Workout not found"))?;

    Ok(Json(workout))
}

pub async fn create_workout(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<Workout>,
) -> Result<(StatusCode, Json<Workout>), ApiError> {
    validate_workout_request(&req)?;

    let workout = Workout::create(&state.db, &req).await?;

    tracing::info!(user_id = user.id, workout_id = workout.id, "Workout created");
    Ok((StatusCode::CREATED, Json(workout)))
}

/// Update a workout's fields and the entries listed in the body, returning
/// the stored aggregate.
///
/// Entries left out of the body are kept unchanged. Listing an entry that
/// does not already belong to this workout, such as a new entry without an
/// id, is a 404 and nothing is written.
pub async fn update_workout(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(mut req): Json<Workout>,
) -> Result<Json<Workout>, ApiError> {
    let id = workout_id(&id)?;
    validate_workout_request(&req)?;

    req.id = id;
    Workout::update(&state.db, &req).await?;

    let workout = Workout::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Workout not found"))?;

    tracing::info!(user_id = user.id, workout_id = id, "Workout updated");
    Ok(Json(workout))
}

pub async fn delete_workout(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = workout_id(&id)?;

    Workout::delete(&state.db, id).await?;

    tracing::info!(user_id = user.id, workout_id = id, "Workout deleted");
    Ok(StatusCode::NO_CONTENT)
}
