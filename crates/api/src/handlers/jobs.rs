//! Handlers for the `/jobs` resource.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;

use genrelay_core::error::CoreError;
use genrelay_pipeline::JobView;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// All known jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<Vec<JobView>>> {
    Json(DataResponse {
        data: state.gateway.list().await,
    })
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let view = state.gateway.status(&id).await?;
    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/download
///
/// Streams the materialized file with its recorded MIME type. Jobs that are
/// not completed with a local file answer 409 `NOT_READY`.
pub async fn download_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let target = state.gateway.download(&id).await?;

    let file = tokio::fs::File::open(&target.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::Core(CoreError::NotFound {
                entity: "MediaFile",
                id: id.clone(),
            })
        } else {
            AppError::InternalError(format!("Failed to open media file: {e}"))
        }
    })?;
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read file metadata: {e}")))?
        .len();

    tracing::debug!(job_id = %id, size = file_size, "Streaming media file");

    let stream = ReaderStream::new(file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, target.mime_type)
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", target.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(format!("Failed to build response: {e}")))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Asks the job's poller to stop. The job moves to `error` once the poller
/// has recorded the cancellation, so the response reflects the state at the
/// time of the request.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(&id).await?;
    if job.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "Job {id} already finished with status {}",
            job.status
        ))
        .into());
    }

    state.supervisor.cancel(&id).await.map_err(|e| match e {
        CoreError::NotFound { .. } => {
            CoreError::Conflict(format!("Job {id} has no running poller"))
        }
        other => other,
    })?;

    tracing::info!(job_id = %id, "Job cancellation requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: state.gateway.view(&job),
        }),
    ))
}
