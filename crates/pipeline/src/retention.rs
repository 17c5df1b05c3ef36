//! Eviction of finished jobs and their media files.

use genrelay_core::job::JobOutput;
use genrelay_core::types::Timestamp;

use crate::materializer::MediaMaterializer;
use crate::store::JobStore;

/// What a retention pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub jobs: usize,
    pub files: usize,
}

/// Evict terminal jobs finished before `cutoff` and delete their files.
///
/// File deletion failures are logged and do not stop the pass.
pub async fn purge_expired(
    store: &JobStore,
    materializer: &MediaMaterializer,
    cutoff: Timestamp,
) -> PurgeReport {
    let evicted = store.evict_terminal_before(cutoff).await;
    let mut report = PurgeReport {
        jobs: evicted.len(),
        files: 0,
    };

    for job in evicted {
        if let Some(JobOutput::File(file)) = job.output {
            match materializer.remove(&file.path).await {
                Ok(()) => report.files += 1,
                Err(e) => {
                    tracing::warn!(job_id = %job.id, path = %file.path.display(), error = %e, "Failed to delete expired media file");
                }
            }
        }
    }

    report
}
