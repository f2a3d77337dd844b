//! HTTP front for the dispatcher.
//!
//! - `POST /search` (also `/` and `/harness`): run a search
//! - `POST /filters`: list an engine's filters
//! - `GET /health`: liveness report

mod handlers;
mod health;
mod routes;

pub use health::{check as health_check, HealthReport, HealthStatus};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::dispatcher::Dispatcher;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::from_settings(settings).await),
        }
    }

    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await;
    let engines = state.dispatcher.registry().len();
    if engines == 0 {
        tracing::warn!(
            "No engines loaded from {}",
            settings.manifest_path.display()
        );
    }
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting sidecar at http://{} ({} engines)", addr, engines);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::continuation::ContinuationStore;
    use crate::manifest::{EngineDescriptor, ManifestRegistry};
    use crate::routines::RoutineCatalog;

    fn setup_test_app() -> axum::Router {
        let dispatcher = Dispatcher::new(
            ManifestRegistry::from_descriptors(vec![
                EngineDescriptor::new("duckduckgo", "routines/ddg", "ddg"),
                EngineDescriptor::new("mojeek", "routines/mojeek", "mojeek"),
            ]),
            RoutineCatalog::builtin(),
            ContinuationStore::in_memory(),
        );
        create_router(AppState::from_dispatcher(dispatcher))
    }

    async fn post_json(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let (status, body) = post_json(setup_test_app(), "/search", "{oops").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_search_exhausted() {
        let (status, body) = post_json(
            setup_test_app(),
            "/",
            r#"{"engine": "ddg", "params": {"s": "rust", "offset": 60}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_harness_replay() {
        let html = r#"<div class="result"><a class="result__a" href="https://x.test/">X</a></div>"#;
        let request = json!({"scraper": "ddg", "params": {"s": "x"}, "html": html}).to_string();
        let (_, body) = post_json(setup_test_app(), "/harness", &request).await;
        assert_eq!(body["web"][0]["title"], "X");
    }

    #[tokio::test]
    async fn test_filters() {
        let (status, body) =
            post_json(setup_test_app(), "/filters", r#"{"engine": "duckduckgo"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["nsfw"].is_object());

        let (_, body) = post_json(setup_test_app(), "/filters", r#"{"engine": "gone"}"#).await;
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_health() {
        let response = setup_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engine_count"], 2);
        assert_eq!(body["checks"]["cache"], "local");
    }
}
