//! Periodic cleanup of finished jobs and their media files.
//!
//! Terminal jobs whose completion is older than the retention period are
//! evicted from the store and their files deleted. Jobs still processing
//! are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use genrelay_pipeline::retention::purge_expired;
use genrelay_pipeline::{JobStore, MediaMaterializer};

/// Run the media retention loop until `cancel` is triggered.
pub async fn run(
    store: Arc<JobStore>,
    materializer: Arc<MediaMaterializer>,
    retention: chrono::Duration,
    cleanup_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_hours = retention.num_hours(),
        interval_secs = cleanup_interval.as_secs(),
        "Media retention job started"
    );

    let mut interval = tokio::time::interval(cleanup_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Media retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
                    tracing::warn!("Media retention: window reaches before the representable range, skipping");
                    continue;
                };
                let report = purge_expired(&store, &materializer, cutoff).await;
                if report.jobs > 0 {
                    tracing::info!(jobs = report.jobs, files = report.files, "Media retention: purged expired jobs");
                } else {
                    tracing::debug!("Media retention: nothing to purge");
                }
            }
        }
    }
}
