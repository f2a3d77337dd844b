//! Router configuration for the sidecar API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(handlers::search))
        // Paths older front ends post to
        .route("/", post(handlers::search))
        .route("/harness", post(handlers::search))
        .route("/filters", post(handlers::filters))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
