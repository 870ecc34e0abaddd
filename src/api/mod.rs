pub mod auth;
pub mod error;
mod tokens;
mod users;
pub mod validation;
mod workouts;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Users
        .route("/users", post(users::register_user))
        // Tokens
        .route(
            "/tokens/authentication",
            post(tokens::create_authentication_token)
                .delete(tokens::delete_authentication_tokens),
        )
        // Workouts
        .route(
            "/workouts",
            get(workouts::list_workouts).post(workouts::create_workout),
        )
        .route(
            "/workouts/:id",
            get(workouts::get_workout)
                .put(workouts::update_workout)
                .delete(workouts::delete_workout),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(middleware::map_response(auth::vary_authorization))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
