//! In-memory job record store.
//!
//! Single source of truth for every job in the process. Thread-safe via an
//! interior `RwLock`; designed to be wrapped in `Arc` and shared between the
//! dispatcher, the pollers and the HTTP handlers.

use std::collections::HashMap;

use tokio::sync::RwLock;

use genrelay_core::error::CoreError;
use genrelay_core::job::Job;
use genrelay_core::types::Timestamp;

/// Keyed map from job id to job state.
///
/// Readers always receive a cloned snapshot, and [`JobStore::mutate`] runs
/// its closure under the write lock, so nobody observes a half-applied
/// update.
///
/// One lock covers the whole map. Closures are synchronous and the guard is
/// never held across an `.await`, so writers only contend for the length of
/// an in-memory field update.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. Ids are never reused, so a duplicate is a conflict.
    pub async fn put(&self, job: Job) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(CoreError::Conflict(format!(
                "Job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: &str) -> Result<Job, CoreError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// Apply `f` to a job atomically and return its result.
    pub async fn mutate<F, R>(&self, id: &str, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| CoreError::job_not_found(id))?;
        Ok(f(job))
    }

    /// Apply a fallible state transition, flattening both error layers.
    pub async fn transition<F>(&self, id: &str, f: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), CoreError>,
    {
        self.mutate(id, f).await?
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Remove terminal jobs that finished before `cutoff` and return them.
    ///
    /// Jobs still processing are never evicted, whatever their age.
    pub async fn evict_terminal_before(&self, cutoff: Timestamp) -> Vec<Job> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .values()
            .filter(|job| job.is_terminal() && job.completed_at.is_some_and(|at| at < cutoff))
            .map(|job| job.id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| jobs.remove(id))
            .collect()
    }
}
