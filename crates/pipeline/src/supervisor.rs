//! Supervised poller tasks.
//!
//! [`PollerSupervisor`] owns every background poller. It refuses a second
//! poller for a job that already has one, can cancel a single job's poller,
//! and at shutdown cancels all of them and waits for each to record its
//! final state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use genrelay_core::error::CoreError;

use crate::poller::{OperationPoller, PollTarget};

/// Internal bookkeeping for one running poller.
struct ManagedPoller {
    task_handle: tokio::task::JoinHandle<()>,
    /// Per-job cancellation token (child of the master token).
    cancel: CancellationToken,
}

pub struct PollerSupervisor {
    poller: OperationPoller,
    /// Running pollers indexed by job id.
    active: Arc<RwLock<HashMap<String, ManagedPoller>>>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

impl PollerSupervisor {
    pub fn new(poller: OperationPoller) -> Self {
        Self {
            poller,
            active: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Launch the poller for `target.job_id`.
    ///
    /// Fails with `Conflict` if that job already has a running poller or the
    /// supervisor is shutting down.
    pub async fn spawn(&self, target: PollTarget) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Conflict(
                "Poller supervisor is shutting down".into(),
            ));
        }

        let mut active = self.active.write().await;
        if active.contains_key(&target.job_id) {
            return Err(CoreError::Conflict(format!(
                "Job {} already has a running poller",
                target.job_id
            )));
        }

        let job_id = target.job_id.clone();
        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();
        let poller = self.poller.clone();
        let registry = Arc::clone(&self.active);
        let task_job_id = job_id.clone();

        // The registry write lock is held until the entry is inserted, so the
        // task's own removal below always runs after it.
        let task_handle = tokio::spawn(async move {
            poller.run(target, task_cancel).await;
            registry.write().await.remove(&task_job_id);
        });

        active.insert(
            job_id.clone(),
            ManagedPoller {
                task_handle,
                cancel,
            },
        );
        tracing::debug!(job_id = %job_id, active = active.len(), "Poller spawned");
        Ok(())
    }

    /// Ask the poller of `job_id` to stop. The job ends in `error`.
    pub async fn cancel(&self, job_id: &str) -> Result<(), CoreError> {
        let active = self.active.read().await;
        let managed = active.get(job_id).ok_or_else(|| CoreError::NotFound {
            entity: "Poller",
            id: job_id.to_string(),
        })?;
        managed.cancel.cancel();
        tracing::info!(job_id, "Poller cancellation requested");
        Ok(())
    }

    pub async fn is_active(&self, job_id: &str) -> bool {
        self.active.read().await.contains_key(job_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Cancel every poller and wait, up to `timeout` in total, for them to
    /// record their final state. Pollers still running at the deadline are
    /// aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        tracing::info!("Shutting down poller supervisor");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        let drained: Vec<(String, ManagedPoller)> = self.active.write().await.drain().collect();
        for (job_id, mut managed) in drained {
            managed.cancel.cancel();
            if tokio::time::timeout_at(deadline, &mut managed.task_handle)
                .await
                .is_err()
            {
                tracing::warn!(job_id = %job_id, "Poller did not stop in time, aborting");
                managed.task_handle.abort();
            }
        }

        tracing::info!("Poller supervisor shut down complete");
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use genrelay_core::job::{Job, JobStatus, OperationHandle};
    use genrelay_core::provider::{GeneratedMedia, OperationStatus};
    use genrelay_core::types::{BearerToken, MediaKind};

    use super::*;
    use crate::materializer::MediaMaterializer;
    use crate::poller::PollConfig;
    use crate::store::JobStore;
    use crate::testing::ScriptedProvider;

    async fn setup(interval: Duration) -> (Arc<JobStore>, Arc<ScriptedProvider>, PollerSupervisor) {
        let store = Arc::new(JobStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let poller = OperationPoller::new(
            Arc::clone(&store),
            provider.clone(),
            Arc::new(MediaMaterializer::new(std::env::temp_dir())),
            PollConfig {
                interval,
                max_attempts: 30,
                ..PollConfig::default()
            },
        );
        (store, provider, PollerSupervisor::new(poller))
    }

    async fn put_job(store: &JobStore, id: &str) -> PollTarget {
        store
            .put(
                Job::new(id.into(), MediaKind::Video, "veo3", "waves", Utc::now())
                    .with_operation(OperationHandle("ops/1".into())),
            )
            .await
            .unwrap();
        PollTarget {
            job_id: id.into(),
            model_id: "veo-3.0-generate-001".into(),
            handle: OperationHandle("ops/1".into()),
            token: BearerToken::new("t"),
        }
    }

    async fn wait_until_idle(supervisor: &PollerSupervisor) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while supervisor.active_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("pollers should finish");
    }

    #[tokio::test]
    async fn second_poller_for_same_job_is_refused() {
        let (store, _provider, supervisor) = setup(Duration::from_secs(3600)).await;
        let target = put_job(&store, "vid_1").await;

        supervisor.spawn(target.clone()).await.unwrap();
        assert_matches!(
            supervisor.spawn(target).await,
            Err(CoreError::Conflict(_))
        );
        assert_eq!(supervisor.active_count().await, 1);

        supervisor.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn finished_pollers_leave_the_registry() {
        let (store, provider, supervisor) = setup(Duration::from_millis(1)).await;
        provider.push_poll(Ok(OperationStatus::Done(GeneratedMedia::Missing)));
        let target = put_job(&store, "vid_1").await;

        supervisor.spawn(target).await.unwrap();
        wait_until_idle(&supervisor).await;

        assert!(!supervisor.is_active("vid_1").await);
        assert_eq!(
            store.get("vid_1").await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn cancel_stops_a_single_poller() {
        let (store, _provider, supervisor) = setup(Duration::from_secs(3600)).await;
        let first = put_job(&store, "vid_1").await;
        let second = put_job(&store, "vid_2").await;
        supervisor.spawn(first).await.unwrap();
        supervisor.spawn(second).await.unwrap();

        supervisor.cancel("vid_1").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while supervisor.is_active("vid_1").await {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(store.get("vid_1").await.unwrap().status, JobStatus::Error);
        assert_eq!(
            store.get("vid_2").await.unwrap().status,
            JobStatus::Processing
        );

        supervisor.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_not_found() {
        let (_store, _provider, supervisor) = setup(Duration::from_secs(1)).await;
        assert_matches!(
            supervisor.cancel("vid_none").await,
            Err(CoreError::NotFound { entity: "Poller", .. })
        );
    }

    #[tokio::test]
    async fn shutdown_wait_is_bounded_in_total() {
        let (_store, _provider, supervisor) = setup(Duration::from_secs(1)).await;
        {
            let mut active = supervisor.active.write().await;
            for i in 0..3 {
                // Tasks that ignore cancellation.
                active.insert(
                    format!("vid_stuck_{i}"),
                    ManagedPoller {
                        task_handle: tokio::spawn(tokio::time::sleep(Duration::from_secs(3600))),
                        cancel: CancellationToken::new(),
                    },
                );
            }
        }

        let started = std::time::Instant::now();
        supervisor.shutdown(Duration::from_millis(300)).await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(800), "took {elapsed:?}");
        assert_eq!(supervisor.active_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_records_terminal_state_and_refuses_new_work() {
        let (store, _provider, supervisor) = setup(Duration::from_secs(3600)).await;
        let target = put_job(&store, "vid_1").await;
        supervisor.spawn(target).await.unwrap();

        supervisor.shutdown(Duration::from_secs(5)).await;

        let job = store.get("vid_1").await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error_detail.unwrap().contains("cancelled"));
        assert_eq!(supervisor.active_count().await, 0);

        let late = put_job(&store, "vid_2").await;
        assert_matches!(supervisor.spawn(late).await, Err(CoreError::Conflict(_)));
    }
}
