//! Long-running operation poller.
//!
//! One [`OperationPoller::run`] call drives a single video job from
//! `processing` to a terminal state: it queries the provider once per
//! attempt, sleeps between attempts without holding any lock, and records
//! the outcome on the job. Failures are recorded on the job, never returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use genrelay_core::job::{JobOutput, JobStatus, OperationHandle};
use genrelay_core::provider::{GeneratedMedia, GenerationProvider, OperationStatus};
use genrelay_core::types::BearerToken;

use crate::materializer::MediaMaterializer;
use crate::store::JobStore;

/// Default delay between polling attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default number of polling attempts before a job times out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Tunable polling parameters.
///
/// The defaults reproduce a fixed 15 s cadence with 30 attempts and no
/// retries: any provider fault ends the job.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second attempt.
    pub interval: Duration,
    /// Total number of provider queries before giving up.
    pub max_attempts: u32,
    /// Factor applied to the delay after each attempt (1.0 = fixed cadence).
    pub backoff_multiplier: f64,
    /// Upper bound on the delay between attempts.
    pub max_interval: Duration,
    /// How many retryable provider errors are tolerated per job.
    pub transient_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(120),
            transient_retries: 0,
        }
    }
}

/// Calculate the next delay from the current delay and config.
///
/// The result is clamped to [`PollConfig::max_interval`], and never drops
/// below the current delay.
pub fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    let multiplier = config.backoff_multiplier.max(1.0);
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_interval.max(current))
}

/// Everything a poller needs to query one operation.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub job_id: String,
    /// Provider model id the operation was started on.
    pub model_id: String,
    pub handle: OperationHandle,
    /// Credential captured when the job was submitted.
    pub token: BearerToken,
}

/// Terminal outcome computed by the polling loop, before it is recorded.
#[derive(Debug)]
enum PollOutcome {
    Completed(JobOutput),
    Failed(String),
    TimedOut(String),
}

/// Drives video jobs to completion against a [`GenerationProvider`].
#[derive(Clone)]
pub struct OperationPoller {
    store: Arc<JobStore>,
    provider: Arc<dyn GenerationProvider>,
    materializer: Arc<MediaMaterializer>,
    config: PollConfig,
}

impl OperationPoller {
    pub fn new(
        store: Arc<JobStore>,
        provider: Arc<dyn GenerationProvider>,
        materializer: Arc<MediaMaterializer>,
        config: PollConfig,
    ) -> Self {
        Self {
            store,
            provider,
            materializer,
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll until the job reaches a terminal state and return that state.
    pub async fn run(&self, target: PollTarget, cancel: CancellationToken) -> JobStatus {
        tracing::info!(
            job_id = %target.job_id,
            operation = %target.handle.as_str(),
            max_attempts = self.config.max_attempts,
            "Polling started",
        );

        let outcome = self.drive(&target, &cancel).await;
        self.record(&target.job_id, outcome).await
    }

    async fn drive(&self, target: &PollTarget, cancel: &CancellationToken) -> PollOutcome {
        let max_attempts = self.config.max_attempts;
        let mut delay = self.config.interval;
        let mut retries_left = self.config.transient_retries;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return PollOutcome::Failed(format!("Polling cancelled before attempt {attempt}"));
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    return PollOutcome::Failed(format!("Polling cancelled during attempt {attempt}"));
                }
                result = self.provider.poll_operation(&target.token, &target.model_id, &target.handle) => result,
            };

            match result {
                Ok(OperationStatus::Pending) => {
                    tracing::debug!(job_id = %target.job_id, attempt, "Operation still running");
                }
                Ok(OperationStatus::Done(media)) => {
                    tracing::info!(job_id = %target.job_id, attempt, "Operation done");
                    return self.resolve_output(&target.job_id, media).await;
                }
                Ok(OperationStatus::Failed(detail)) => {
                    return PollOutcome::Failed(detail);
                }
                Err(e) if e.is_retryable() && retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        job_id = %target.job_id,
                        attempt,
                        retries_left,
                        error = %e,
                        "Transient polling error, retrying",
                    );
                }
                Err(e) => {
                    return PollOutcome::Failed(format!("Polling failed on attempt {attempt}: {e}"));
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return PollOutcome::Failed(format!("Polling cancelled after attempt {attempt}"));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = next_delay(delay, &self.config);
            }
        }

        PollOutcome::TimedOut(format!(
            "Operation did not complete after {max_attempts} polling attempts"
        ))
    }

    /// Turn provider media into a job output.
    ///
    /// Runs once, on the attempt that reports `done`. The file only sticks if
    /// the terminal transition in [`Self::record`] is accepted.
    async fn resolve_output(&self, job_id: &str, media: GeneratedMedia) -> PollOutcome {
        match media {
            GeneratedMedia::Inline {
                data_base64,
                mime_type,
            } => {
                match self
                    .materializer
                    .materialize(job_id, &data_base64, &mime_type)
                    .await
                {
                    Ok(file) => PollOutcome::Completed(JobOutput::File(file)),
                    Err(e) => {
                        tracing::error!(job_id, error = %e, "Materialization failed");
                        PollOutcome::Failed(e.to_string())
                    }
                }
            }
            GeneratedMedia::Remote { uri } => PollOutcome::Completed(JobOutput::Remote { uri }),
            GeneratedMedia::Missing => {
                tracing::warn!(job_id, "Operation finished without usable output");
                PollOutcome::Completed(JobOutput::Missing)
            }
        }
    }

    async fn record(&self, job_id: &str, outcome: PollOutcome) -> JobStatus {
        let now = Utc::now();
        let orphan = match &outcome {
            PollOutcome::Completed(JobOutput::File(file)) => Some(file.path.clone()),
            _ => None,
        };

        let result = match outcome {
            PollOutcome::Completed(output) => {
                self.store
                    .transition(job_id, |job| job.complete(output, now))
                    .await
            }
            PollOutcome::Failed(detail) => {
                tracing::warn!(job_id, detail = %detail, "Job failed");
                self.store
                    .transition(job_id, |job| job.fail(detail, now))
                    .await
            }
            PollOutcome::TimedOut(detail) => {
                tracing::warn!(job_id, detail = %detail, "Job timed out");
                self.store
                    .transition(job_id, |job| job.time_out(detail, now))
                    .await
            }
        };

        if let Err(e) = result {
            tracing::warn!(job_id, error = %e, "Could not record polling outcome");
            if let Some(path) = orphan {
                let _ = self.materializer.remove(&path).await;
            }
        }

        match self.store.get(job_id).await {
            Ok(job) => {
                tracing::info!(job_id, status = %job.status, "Polling finished");
                job.status
            }
            // The job disappeared while polling; report it as failed.
            Err(_) => JobStatus::Error,
        }
    }
}
