//! Generation dispatcher.
//!
//! Validates requests against the model catalog, obtains a credential,
//! makes the initial provider call, and either resolves the job on the spot
//! (images) or hands it to the poller supervisor (videos).

use std::sync::Arc;

use chrono::Utc;

use genrelay_core::catalog::{GenerateRequest, GenerationSpec, ModelCatalog};
use genrelay_core::error::CoreError;
use genrelay_core::job::{Job, JobOutput};
use genrelay_core::provider::{GeneratedMedia, GenerationProvider, TokenSource};
use genrelay_core::types::{new_job_id, BearerToken, MediaKind};

use crate::materializer::MediaMaterializer;
use crate::poller::PollTarget;
use crate::store::JobStore;
use crate::supervisor::PollerSupervisor;

pub struct GenerationDispatcher {
    catalog: Arc<ModelCatalog>,
    provider: Arc<dyn GenerationProvider>,
    tokens: Arc<dyn TokenSource>,
    store: Arc<JobStore>,
    materializer: Arc<MediaMaterializer>,
    supervisor: Arc<PollerSupervisor>,
}

impl GenerationDispatcher {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        provider: Arc<dyn GenerationProvider>,
        tokens: Arc<dyn TokenSource>,
        store: Arc<JobStore>,
        materializer: Arc<MediaMaterializer>,
        supervisor: Arc<PollerSupervisor>,
    ) -> Self {
        Self {
            catalog,
            provider,
            tokens,
            store,
            materializer,
            supervisor,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Submit a generation request and return a snapshot of the new job.
    ///
    /// Validation and credential failures are returned as errors and create
    /// no job. Provider failures are recorded on the returned job instead.
    pub async fn submit(&self, request: &GenerateRequest) -> Result<Job, CoreError> {
        let spec = self.catalog.validate(request)?;

        let token = self.tokens.access_token().await.map_err(|e| {
            tracing::warn!(error = %e, "No provider credential available");
            CoreError::Unauthorized(e.to_string())
        })?;

        match spec.model.kind {
            MediaKind::Image => self.submit_image(&spec, &token).await,
            MediaKind::Video => self.submit_video(&spec, token).await,
        }
    }

    async fn submit_image(
        &self,
        spec: &GenerationSpec,
        token: &BearerToken,
    ) -> Result<Job, CoreError> {
        let mut job = Job::new(
            new_job_id(MediaKind::Image),
            MediaKind::Image,
            spec.model.key,
            spec.prompt.clone(),
            Utc::now(),
        );

        // The job is resolved in memory and only then inserted, so nobody
        // ever observes an image job mid-flight.
        let resolution = match self.provider.generate_image(token, spec).await {
            Ok(GeneratedMedia::Inline {
                data_base64,
                mime_type,
            }) => self
                .materializer
                .materialize(&job.id, &data_base64, &mime_type)
                .await
                .map(JobOutput::File)
                .map_err(|e| e.to_string()),
            Ok(GeneratedMedia::Remote { uri }) => Ok(JobOutput::Remote { uri }),
            Ok(GeneratedMedia::Missing) => Err("No image in provider response".to_string()),
            Err(e) => Err(format!("Image generation failed: {e}")),
        };

        let now = Utc::now();
        match resolution {
            Ok(output) => job.complete(output, now)?,
            Err(detail) => {
                tracing::warn!(job_id = %job.id, model = spec.model.key, detail = %detail, "Image job failed");
                job.fail(detail, now)?;
            }
        }

        self.store.put(job.clone()).await?;
        tracing::info!(job_id = %job.id, model = spec.model.key, status = %job.status, "Image job recorded");
        Ok(job)
    }

    async fn submit_video(
        &self,
        spec: &GenerationSpec,
        token: BearerToken,
    ) -> Result<Job, CoreError> {
        let job = Job::new(
            new_job_id(MediaKind::Video),
            MediaKind::Video,
            spec.model.key,
            spec.prompt.clone(),
            Utc::now(),
        );

        let handle = match self.provider.start_video(&token, spec).await {
            Ok(handle) => handle,
            Err(e) => {
                let mut job = job;
                job.fail(format!("Failed to start video generation: {e}"), Utc::now())?;
                tracing::warn!(job_id = %job.id, model = spec.model.key, error = %e, "Video start failed");
                self.store.put(job.clone()).await?;
                return Ok(job);
            }
        };

        let job = job.with_operation(handle.clone());
        self.store.put(job.clone()).await?;

        let target = PollTarget {
            job_id: job.id.clone(),
            model_id: spec.model.model_id.to_string(),
            handle,
            token,
        };
        if let Err(e) = self.supervisor.spawn(target).await {
            // Without a poller the job would sit in `processing` forever.
            let detail = format!("Could not schedule polling: {e}");
            self.store
                .transition(&job.id, |j| j.fail(detail, Utc::now()))
                .await?;
            return self.store.get(&job.id).await;
        }

        tracing::info!(job_id = %job.id, model = spec.model.key, "Video job submitted");
        Ok(job)
    }
}
