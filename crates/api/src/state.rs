use std::sync::Arc;

use genrelay_core::catalog::ModelCatalog;
use genrelay_core::provider::{GenerationProvider, TokenSource};
use genrelay_pipeline::{
    GenerationDispatcher, JobGateway, JobStore, MediaMaterializer, OperationPoller,
    PollerSupervisor,
};

use crate::config::ServerConfig;

/// Public path prefix of the job resources.
pub const JOBS_PATH: &str = "/api/v1/jobs";

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<JobStore>,
    pub materializer: Arc<MediaMaterializer>,
    /// Owns every background video poller.
    pub supervisor: Arc<PollerSupervisor>,
    pub dispatcher: Arc<GenerationDispatcher>,
    pub gateway: Arc<JobGateway>,
    /// Provider credential source, also checked by the health endpoint.
    pub tokens: Arc<dyn TokenSource>,
}

impl AppState {
    /// Wire the job pipeline around `provider` and `tokens`.
    pub fn new(
        config: ServerConfig,
        catalog: ModelCatalog,
        provider: Arc<dyn GenerationProvider>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let store = Arc::new(JobStore::new());
        let materializer = Arc::new(MediaMaterializer::new(config.media_dir.clone()));
        let poller = OperationPoller::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            Arc::clone(&materializer),
            config.poll_config(),
        );
        let supervisor = Arc::new(PollerSupervisor::new(poller));
        let dispatcher = Arc::new(GenerationDispatcher::new(
            Arc::new(catalog),
            provider,
            Arc::clone(&tokens),
            Arc::clone(&store),
            Arc::clone(&materializer),
            Arc::clone(&supervisor),
        ));
        let gateway = Arc::new(JobGateway::new(Arc::clone(&store), JOBS_PATH));

        Self {
            config: Arc::new(config),
            store,
            materializer,
            supervisor,
            dispatcher,
            gateway,
            tokens,
        }
    }
}
