//! Job record and its lifecycle state machine.
//!
//! A job starts in [`JobStatus::Processing`] and moves exactly once into one
//! of the terminal states. All transitions go through the methods on
//! [`Job`], which reject any attempt to leave a terminal state.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{MediaKind, Timestamp};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
    Timeout,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side handle of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A media file written to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub path: std::path::PathBuf,
    pub mime_type: String,
}

/// What a completed job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Binary output written locally and downloadable.
    File(MaterializedFile),
    /// The provider stored the output remotely.
    Remote { uri: String },
    /// The provider reported completion without any usable output.
    Missing,
}

impl JobOutput {
    /// Short label used in status projections.
    pub fn label(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Remote { .. } => "remote",
            Self::Missing => "missing",
        }
    }
}

/// One generation request's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub kind: MediaKind,
    pub model_name: String,
    pub prompt: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub operation: Option<OperationHandle>,
    pub output: Option<JobOutput>,
    pub error_detail: Option<String>,
}

impl Job {
    /// Create a job in the `processing` state.
    pub fn new(
        id: String,
        kind: MediaKind,
        model_name: impl Into<String>,
        prompt: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            model_name: model_name.into(),
            prompt: prompt.into(),
            status: JobStatus::Processing,
            created_at,
            completed_at: None,
            operation: None,
            output: None,
            error_detail: None,
        }
    }

    /// Attach the provider operation handle. The handle can be set once.
    pub fn with_operation(mut self, handle: OperationHandle) -> Self {
        if self.operation.is_none() {
            self.operation = Some(handle);
        }
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Local file path, present only when binary output was produced.
    pub fn file_path(&self) -> Option<&std::path::Path> {
        match &self.output {
            Some(JobOutput::File(file)) => Some(file.path.as_path()),
            _ => None,
        }
    }

    pub fn file_mime_type(&self) -> Option<&str> {
        match &self.output {
            Some(JobOutput::File(file)) => Some(file.mime_type.as_str()),
            _ => None,
        }
    }

    /// processing -> completed, recording the output in the same step.
    pub fn complete(&mut self, output: JobOutput, at: Timestamp) -> Result<(), CoreError> {
        self.ensure_processing("complete")?;
        self.status = JobStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(at);
        Ok(())
    }

    /// processing -> error.
    pub fn fail(&mut self, detail: impl Into<String>, at: Timestamp) -> Result<(), CoreError> {
        self.ensure_processing("fail")?;
        self.status = JobStatus::Error;
        self.error_detail = Some(detail.into());
        self.completed_at = Some(at);
        Ok(())
    }

    /// processing -> timeout.
    pub fn time_out(&mut self, detail: impl Into<String>, at: Timestamp) -> Result<(), CoreError> {
        self.ensure_processing("time out")?;
        self.status = JobStatus::Timeout;
        self.error_detail = Some(detail.into());
        self.completed_at = Some(at);
        Ok(())
    }

    fn ensure_processing(&self, action: &str) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Cannot {action} job {}: already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn video_job() -> Job {
        Job::new(
            "vid_test".into(),
            MediaKind::Video,
            "veo3",
            "ocean waves",
            Utc::now(),
        )
    }

    #[test]
    fn new_job_is_processing_without_output() {
        let job = video_job();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.completed_at.is_none());
        assert!(job.file_path().is_none());
    }

    #[test]
    fn complete_sets_output_and_completed_at() {
        let mut job = video_job();
        let file = MaterializedFile {
            path: "/tmp/vid_test.mp4".into(),
            mime_type: "video/mp4".into(),
        };
        job.complete(JobOutput::File(file), Utc::now()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.file_mime_type(), Some("video/mp4"));
        assert_eq!(
            job.file_path(),
            Some(std::path::Path::new("/tmp/vid_test.mp4"))
        );
    }

    #[test]
    fn remote_output_has_no_file_path() {
        let mut job = video_job();
        job.complete(
            JobOutput::Remote {
                uri: "gs://bucket/out.mp4".into(),
            },
            Utc::now(),
        )
        .unwrap();
        assert!(job.file_path().is_none());
        assert!(job.file_mime_type().is_none());
    }

    #[test]
    fn terminal_state_cannot_be_left() {
        let mut job = video_job();
        job.time_out("gave up", Utc::now()).unwrap();
        let first_completed_at = job.completed_at;

        assert_matches!(
            job.complete(JobOutput::Missing, Utc::now()),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(job.fail("late", Utc::now()), Err(CoreError::Conflict(_)));
        assert_eq!(job.status, JobStatus::Timeout);
        assert_eq!(job.completed_at, first_completed_at);
        assert_eq!(job.error_detail.as_deref(), Some("gave up"));
    }

    #[test]
    fn operation_handle_is_set_once() {
        let job = video_job()
            .with_operation(OperationHandle("ops/1".into()))
            .with_operation(OperationHandle("ops/2".into()));
        assert_eq!(job.operation.unwrap().as_str(), "ops/1");
    }
}
