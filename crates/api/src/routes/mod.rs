pub mod generation;
pub mod health;
pub mod jobs;
pub mod models;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /models                         model catalog
/// /generate                       submit an image or video job (POST)
/// /jobs                           list jobs
/// /jobs/{id}                      job status
/// /jobs/{id}/download             stream the generated file
/// /jobs/{id}/cancel               stop a video job's poller (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/models", models::router())
        .nest("/generate", generation::router())
        .nest("/jobs", jobs::router())
}
