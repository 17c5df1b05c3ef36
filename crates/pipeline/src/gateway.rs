//! Read-only status and download projection of the job store.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use genrelay_core::error::CoreError;
use genrelay_core::job::{Job, JobOutput, JobStatus};
use genrelay_core::types::{MediaKind, Timestamp};

use crate::materializer::extension_for_mime;
use crate::store::JobStore;

/// Caller-facing view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub kind: MediaKind,
    pub status: JobStatus,
    pub model_name: String,
    pub prompt: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// `file`, `remote` or `missing` once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<&'static str>,
    pub status_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_uri: Option<String>,
}

/// A completed job's local file, ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub path: PathBuf,
    pub mime_type: String,
    /// Suggested attachment name, `<model>_<job id>.<ext>`.
    pub file_name: String,
}

pub struct JobGateway {
    store: Arc<JobStore>,
    /// Public path prefix of the job resources, e.g. `/api/v1/jobs`.
    jobs_path: String,
}

impl JobGateway {
    pub fn new(store: Arc<JobStore>, jobs_path: impl Into<String>) -> Self {
        Self {
            store,
            jobs_path: jobs_path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}/{job_id}", self.jobs_path)
    }

    pub fn download_url(&self, job_id: &str) -> String {
        format!("{}/{job_id}/download", self.jobs_path)
    }

    /// Project a job into its caller-facing view.
    pub fn view(&self, job: &Job) -> JobView {
        let completed = job.status == JobStatus::Completed;
        let (download_url, file_type) = match (&job.output, completed) {
            (Some(JobOutput::File(file)), true) => {
                (Some(self.download_url(&job.id)), Some(file.mime_type.clone()))
            }
            _ => (None, None),
        };
        let remote_uri = match &job.output {
            Some(JobOutput::Remote { uri }) => Some(uri.clone()),
            _ => None,
        };

        JobView {
            job_id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            model_name: job.model_name.clone(),
            prompt: job.prompt.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_detail: job.error_detail.clone(),
            output: job.output.as_ref().map(JobOutput::label),
            status_url: self.status_url(&job.id),
            download_url,
            file_type,
            remote_uri,
        }
    }

    pub async fn status(&self, job_id: &str) -> Result<JobView, CoreError> {
        let job = self.store.get(job_id).await?;
        Ok(self.view(&job))
    }

    pub async fn list(&self) -> Vec<JobView> {
        self.store.list().await.iter().map(|job| self.view(job)).collect()
    }

    /// Resolve a download request to the job's materialized file.
    pub async fn download(&self, job_id: &str) -> Result<DownloadTarget, CoreError> {
        let job = self.store.get(job_id).await?;

        let file = match (job.status, &job.output) {
            (JobStatus::Processing, _) => {
                return Err(CoreError::NotReady(format!(
                    "Job {job_id} is still processing"
                )))
            }
            (JobStatus::Completed, Some(JobOutput::File(file))) => file.clone(),
            (JobStatus::Completed, Some(JobOutput::Remote { uri })) => {
                return Err(CoreError::NotReady(format!(
                    "Job {job_id} output is stored remotely at {uri}"
                )))
            }
            (JobStatus::Completed, _) => {
                return Err(CoreError::NotReady(format!(
                    "Job {job_id} completed without output"
                )))
            }
            (status, _) => {
                return Err(CoreError::NotReady(format!(
                    "Job {job_id} ended with status {status}; no file available"
                )))
            }
        };

        if !tokio::fs::try_exists(&file.path).await.unwrap_or(false) {
            tracing::error!(job_id, path = %file.path.display(), "Materialized file is missing on disk");
            return Err(CoreError::NotFound {
                entity: "MediaFile",
                id: job_id.to_string(),
            });
        }

        Ok(DownloadTarget {
            file_name: format!(
                "{}_{}.{}",
                job.model_name,
                job.id,
                extension_for_mime(&file.mime_type)
            ),
            path: file.path,
            mime_type: file.mime_type,
        })
    }
}
