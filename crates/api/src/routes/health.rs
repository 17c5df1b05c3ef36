use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use genrelay_core::types::Timestamp;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether a provider credential can currently be obtained.
    pub auth_healthy: bool,
    /// Video jobs still being polled.
    pub active_pollers: usize,
    pub timestamp: Timestamp,
}

/// Service index payload.
#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub models: Vec<&'static str>,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub route: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /health", "service health"),
    ("GET /api/v1/models", "available models"),
    ("POST /api/v1/generate", "submit an image or video job"),
    ("GET /api/v1/jobs", "list jobs"),
    ("GET /api/v1/jobs/{id}", "job status"),
    ("GET /api/v1/jobs/{id}/download", "download generated media"),
    ("POST /api/v1/jobs/{id}/cancel", "cancel a video job"),
];

/// GET / -- service name, version and the available endpoints.
async fn index(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "genrelay",
        version: env!("CARGO_PKG_VERSION"),
        models: state.dispatcher.catalog().keys(),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(route, description)| EndpointInfo { route, description })
            .collect(),
    })
}

/// GET /health -- returns service and credential health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let auth_healthy = match state.tokens.access_token().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not obtain a credential");
            false
        }
    };

    let status = if auth_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        auth_healthy,
        active_pollers: state.supervisor.active_count().await,
        timestamp: chrono::Utc::now(),
    })
}

/// Mount the index and health routes (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}
