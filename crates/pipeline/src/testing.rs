//! Scripted in-memory provider for tests.
//!
//! Responses are queued up front and handed out in order. When a queue runs
//! dry the provider falls back to a neutral answer: a pending operation for
//! polls, a fresh operation handle for video starts, and a tiny PNG for
//! image calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use genrelay_core::catalog::GenerationSpec;
use genrelay_core::job::OperationHandle;
use genrelay_core::provider::{
    CredentialError, GeneratedMedia, GenerationProvider, OperationStatus, ProviderError,
    TokenSource,
};
use genrelay_core::types::BearerToken;

/// Base64 of the 8-byte PNG signature, used as the default image payload.
pub const PNG_SIGNATURE_BASE64: &str = "iVBORw0KGgo=";

#[derive(Default)]
pub struct ScriptedProvider {
    images: Mutex<VecDeque<Result<GeneratedMedia, ProviderError>>>,
    starts: Mutex<VecDeque<Result<OperationHandle, ProviderError>>>,
    polls: Mutex<VecDeque<Result<OperationStatus, ProviderError>>>,
    image_calls: AtomicUsize,
    start_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_image(&self, response: Result<GeneratedMedia, ProviderError>) {
        self.images.lock().unwrap().push_back(response);
    }

    pub fn push_start(&self, response: Result<OperationHandle, ProviderError>) {
        self.starts.lock().unwrap().push_back(response);
    }

    pub fn push_poll(&self, response: Result<OperationStatus, ProviderError>) {
        self.polls.lock().unwrap().push_back(response);
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate_image(
        &self,
        _token: &BearerToken,
        _spec: &GenerationSpec,
    ) -> Result<GeneratedMedia, ProviderError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.images.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(GeneratedMedia::Inline {
                data_base64: PNG_SIGNATURE_BASE64.to_string(),
                mime_type: "image/png".to_string(),
            })
        })
    }

    async fn start_video(
        &self,
        _token: &BearerToken,
        _spec: &GenerationSpec,
    ) -> Result<OperationHandle, ProviderError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OperationHandle(format!("operations/test-{n}"))))
    }

    async fn poll_operation(
        &self,
        _token: &BearerToken,
        _model_id: &str,
        _handle: &OperationHandle,
    ) -> Result<OperationStatus, ProviderError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(OperationStatus::Pending))
    }
}

/// Token source that always fails, for auth-failure paths.
pub struct FailingTokenSource;

#[async_trait]
impl TokenSource for FailingTokenSource {
    async fn access_token(&self) -> Result<BearerToken, CredentialError> {
        Err(CredentialError("no credentials configured".into()))
    }
}
