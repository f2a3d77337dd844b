//! HTTP API against a generated manifest on disk.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use engine_sidecar::config::Settings;
use engine_sidecar::manifest::{generate_manifest, write_manifest};
use engine_sidecar::routines::RoutineCatalog;
use engine_sidecar::server::{create_router, AppState};

async fn app_with_manifest(write: bool) -> (axum::Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("manifest.json");
    if write {
        write_manifest(&manifest_path, &generate_manifest(&RoutineCatalog::builtin())).unwrap();
    }

    let settings = Settings {
        manifest_path,
        ..Default::default()
    };
    let state = AppState::new(&settings).await;
    (create_router(state), dir)
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_ok_with_manifest() {
    let (app, _dir) = app_with_manifest(true).await;
    let (status, body) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engine_count"], 2);
    assert_eq!(body["checks"]["manifest"], "ok");
    assert_eq!(body["checks"]["routine_catalog"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_503_without_manifest() {
    let (app, _dir) = app_with_manifest(false).await;
    let (status, body) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["checks"]["manifest"], "missing");
}

#[tokio::test]
async fn legacy_identifier_and_field_resolve() {
    let (app, _dir) = app_with_manifest(true).await;
    let html = r#"<div class="result"><a class="result__a" href="https://r.test/">R</a><a class="result__snippet">snip</a></div>"#;
    let (status, body) = send(
        app,
        post(
            "/search",
            json!({"scraper": "ddg", "params": {"s": "r"}, "html": html}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["web"][0]["url"], "https://r.test/");
    assert_eq!(body["web"][0]["description"], "snip");
}

#[tokio::test]
async fn errors_are_json_with_status_200() {
    let (app, _dir) = app_with_manifest(true).await;
    let (status, body) = send(app, post("/search", json!({"engine": "altavista"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "error", "message": "Engine altavista not found"}));
}

#[tokio::test]
async fn live_search_without_outbound_is_refused() {
    let (app, _dir) = app_with_manifest(true).await;
    let (_, body) = send(
        app,
        post("/search", json!({"engine": "duckduckgo", "params": {"s": "rust"}})),
    )
    .await;

    assert_eq!(body["status"], "error");
    assert!(!body["message"].as_str().unwrap().contains("html.duckduckgo.com"));
}

#[tokio::test]
async fn filters_for_known_and_unknown_engines() {
    let (app, _dir) = app_with_manifest(true).await;
    let (_, body) = send(
        app.clone(),
        post("/filters", json!({"engine": "mojeek", "page": "web"})),
    )
    .await;
    assert!(body["date"]["option"].is_object());

    let (status, body) = send(app, post("/filters", json!({"engine": "nope"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}
