//! HTTP handlers. Bodies are read as raw strings so malformed JSON reaches
//! the dispatcher and gets the standard error shape instead of a 4xx.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::health;
use super::AppState;

/// Run a search request.
pub async fn search(State(state): State<AppState>, body: String) -> impl IntoResponse {
    Json(state.dispatcher.dispatch_json(&body).await)
}

/// List an engine's filters.
pub async fn filters(State(state): State<AppState>, body: String) -> impl IntoResponse {
    Json(state.dispatcher.discover_filters_json(&body))
}

/// Liveness report: 200 when healthy, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = health::check(&state.dispatcher).await;
    let code = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}
