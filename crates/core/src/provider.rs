//! Seam between the pipeline and the outbound generation platform.
//!
//! The pipeline only ever talks to a [`GenerationProvider`] and a
//! [`TokenSource`]; the HTTP implementation lives in `genrelay-vertex`.

use async_trait::async_trait;

use crate::catalog::GenerationSpec;
use crate::job::OperationHandle;
use crate::types::BearerToken;

/// Media returned by the provider, before materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedMedia {
    /// Base64 payload carried in the response body.
    Inline { data_base64: String, mime_type: String },
    /// Reference to remote storage (e.g. a `gs://` URI).
    Remote { uri: String },
    /// The response carried nothing usable.
    Missing,
}

/// Result of polling a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done(GeneratedMedia),
    /// The operation finished with a provider-side error.
    Failed(String),
}

/// Errors from the outbound provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The request never produced a response (network, DNS, TLS, ...).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider rejected the credential.
    #[error("Credential rejected ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// The provider returned a non-2xx status.
    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Transport failures, rate limiting and 5xx responses are retryable;
    /// everything else is a hard fault.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized { .. } | Self::Protocol(_) => false,
        }
    }
}

/// Outbound generation platform.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Run a synchronous image generation call.
    async fn generate_image(
        &self,
        token: &BearerToken,
        spec: &GenerationSpec,
    ) -> Result<GeneratedMedia, ProviderError>;

    /// Start a long-running video generation and return its handle.
    async fn start_video(
        &self,
        token: &BearerToken,
        spec: &GenerationSpec,
    ) -> Result<OperationHandle, ProviderError>;

    /// Query the state of a long-running operation started for `model_id`.
    async fn poll_operation(
        &self,
        token: &BearerToken,
        model_id: &str,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, ProviderError>;
}

/// Error returned when no credential can be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Credential unavailable: {0}")]
pub struct CredentialError(pub String);

/// Supplies bearer credentials for provider calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<BearerToken, CredentialError>;
}

/// A fixed, pre-issued token.
pub struct StaticTokenSource {
    token: BearerToken,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<BearerToken, CredentialError> {
        Ok(self.token.clone())
    }
}
