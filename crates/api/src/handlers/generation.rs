//! Handler for `POST /api/v1/generate`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use genrelay_core::catalog::GenerateRequest;
use genrelay_core::job::JobStatus;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/generate
///
/// Images are generated synchronously and return 200 with the finished job.
/// Videos return 202 with a `processing` job to poll. A job that failed at
/// the provider comes back as 502 with its `errorDetail`.
pub async fn generate(
    State(state): State<AppState>,
    input: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let job = state.dispatcher.submit(&input).await?;

    let status = match job.status {
        JobStatus::Processing => StatusCode::ACCEPTED,
        JobStatus::Completed => StatusCode::OK,
        JobStatus::Error | JobStatus::Timeout => StatusCode::BAD_GATEWAY,
    };

    tracing::info!(
        job_id = %job.id,
        model = %job.model_name,
        status = %job.status,
        "Generation request handled",
    );

    Ok((
        status,
        Json(DataResponse {
            data: state.gateway.view(&job),
        }),
    ))
}
