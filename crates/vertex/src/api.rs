//! REST client for Vertex AI publisher models.
//!
//! Wraps the `:predict`, `:predictLongRunning` and `:fetchPredictOperation`
//! endpoints using [`reqwest`] and implements [`GenerationProvider`].

use async_trait::async_trait;
use reqwest::StatusCode;

use genrelay_core::catalog::GenerationSpec;
use genrelay_core::job::OperationHandle;
use genrelay_core::provider::{GeneratedMedia, GenerationProvider, OperationStatus, ProviderError};
use genrelay_core::types::BearerToken;

use crate::messages::{
    FetchOperationRequest, OperationResponse, OperationStarted, PredictRequest, PredictResponse,
};

/// Endpoint verb used to poll long-running operations.
const FETCH_OPERATION_VERB: &str = "fetchPredictOperation";

/// Where and under which project to call Vertex AI.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    /// Base URL override; defaults to the regional endpoint.
    pub base_url: Option<String>,
}

impl VertexConfig {
    /// Load from environment variables.
    ///
    /// | Env Var             | Default        |
    /// |---------------------|----------------|
    /// | `GOOGLE_PROJECT_ID` | required       |
    /// | `GOOGLE_LOCATION`   | `us-central1`  |
    /// | `VERTEX_BASE_URL`   | regional host  |
    pub fn from_env() -> Self {
        let project_id =
            std::env::var("GOOGLE_PROJECT_ID").expect("GOOGLE_PROJECT_ID must be set");
        let location = std::env::var("GOOGLE_LOCATION").unwrap_or_else(|_| "us-central1".into());
        let base_url = std::env::var("VERTEX_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            project_id,
            location,
            base_url,
        }
    }

    /// Base URL without trailing slash.
    pub fn api_base(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Full URL for `model_id:verb`.
    pub fn model_url(&self, model_id: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.api_base(),
            self.project_id,
            self.location,
            model_id,
            verb
        )
    }
}

/// HTTP client for the Vertex AI generation endpoints.
pub struct VertexClient {
    client: reqwest::Client,
    config: VertexConfig,
}

impl VertexClient {
    pub fn new(config: VertexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: VertexConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    async fn post_json<B, T>(
        &self,
        url: String,
        token: &BearerToken,
        body: &B,
    ) -> Result<T, ProviderError>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(&url)
            .bearer_auth(token.secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let response = Self::ensure_success(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Protocol(format!("Undecodable response from {url}: {e}")))
    }

    /// Map a non-2xx response to the matching [`ProviderError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(classify_status(status, body))
    }
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized {
            status: status.as_u16(),
            body,
        },
        _ => ProviderError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl GenerationProvider for VertexClient {
    async fn generate_image(
        &self,
        token: &BearerToken,
        spec: &GenerationSpec,
    ) -> Result<GeneratedMedia, ProviderError> {
        let url = self
            .config
            .model_url(spec.model.model_id, spec.model.endpoint.as_str());
        let response: PredictResponse = self
            .post_json(url, token, &PredictRequest::from_spec(spec))
            .await?;

        tracing::debug!(model = spec.model.key, "Image prediction returned");
        Ok(response.into_media())
    }

    async fn start_video(
        &self,
        token: &BearerToken,
        spec: &GenerationSpec,
    ) -> Result<OperationHandle, ProviderError> {
        let url = self
            .config
            .model_url(spec.model.model_id, spec.model.endpoint.as_str());
        let started: OperationStarted = self
            .post_json(url, token, &PredictRequest::from_spec(spec))
            .await?;

        if started.name.is_empty() {
            return Err(ProviderError::Protocol(
                "Long-running operation response has an empty name".into(),
            ));
        }

        tracing::info!(model = spec.model.key, operation = %started.name, "Video operation started");
        Ok(OperationHandle(started.name))
    }

    async fn poll_operation(
        &self,
        token: &BearerToken,
        model_id: &str,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, ProviderError> {
        let url = self.config.model_url(model_id, FETCH_OPERATION_VERB);
        let body = FetchOperationRequest {
            operation_name: handle.as_str(),
        };
        let response: OperationResponse = self.post_json(url, token, &body).await?;
        Ok(response.into_status())
    }
}
