#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use genrelay_api::config::ServerConfig;
use genrelay_api::router::build_app_router;
use genrelay_api::state::AppState;
use genrelay_core::catalog::ModelCatalog;
use genrelay_core::provider::{StaticTokenSource, TokenSource};
use genrelay_pipeline::testing::ScriptedProvider;

/// Build a test `ServerConfig` with safe defaults.
///
/// The poll interval is an hour so video jobs stay `processing` after their
/// first (pending) poll unless a test shortens it.
pub fn test_config(media: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        media_dir: media.path().to_path_buf(),
        media_retention_hours: 24,
        media_cleanup_interval_secs: 3600,
        poll_interval_secs: 3600,
        poll_max_attempts: 30,
        poll_backoff_multiplier: 1.0,
        poll_max_interval_secs: 3600,
        poll_transient_retries: 0,
    }
}

/// A fully wired application backed by a scripted provider.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    _media: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with all middleware layers, the same
/// way `main.rs` does, around a scripted provider and a temporary media dir.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {}, Arc::new(StaticTokenSource::new("test-token")))
}

pub fn build_test_app_with(
    configure: impl FnOnce(&mut ServerConfig),
    tokens: Arc<dyn TokenSource>,
) -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let mut config = test_config(&media);
    configure(&mut config);

    let provider = Arc::new(ScriptedProvider::new());
    let state = AppState::new(
        config.clone(),
        ModelCatalog::builtin(),
        provider.clone(),
        tokens,
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        provider,
        _media: media,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `GET /api/v1/jobs/{id}` until the job leaves `processing`.
pub async fn wait_for_terminal(app: &TestApp, job_id: &str) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(app.app(), &format!("/api/v1/jobs/{job_id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            if json["data"]["status"] != "processing" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job should reach a terminal state")
}
