//! Request and response payloads for the Vertex AI publisher-model API.
//!
//! Only the fields the pipeline needs are modelled; everything else in the
//! provider's responses is ignored by serde.

use serde::{Deserialize, Serialize};

use genrelay_core::catalog::GenerationSpec;
use genrelay_core::provider::{GeneratedMedia, OperationStatus};
use genrelay_core::types::MediaKind;

/// MIME type assumed for inline images when the provider omits one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// MIME type assumed for inline videos when the provider omits one.
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PromptInstance>,
    pub parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
pub struct PromptInstance {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub sample_count: u32,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl PredictRequest {
    /// Build the request body for a validated generation spec.
    pub fn from_spec(spec: &GenerationSpec) -> Self {
        let video = spec.model.kind == MediaKind::Video;
        Self {
            instances: vec![PromptInstance {
                prompt: spec.prompt.clone(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: spec.aspect_ratio.clone(),
                duration_seconds: if video { spec.model.duration_secs } else { None },
                generate_audio: (video && spec.model.audio).then_some(true),
                resolution: if video { spec.resolution.clone() } else { None },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOperationRequest<'a> {
    pub operation_name: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Output entry as returned in `predictions[]` or `response.videos[]`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
    pub gcs_uri: Option<String>,
    pub gcs_output_directory: Option<String>,
}

impl MediaEntry {
    fn into_media(self, default_mime: &str) -> GeneratedMedia {
        if let Some(data) = self.bytes_base64_encoded.filter(|d| !d.is_empty()) {
            return GeneratedMedia::Inline {
                data_base64: data,
                mime_type: self.mime_type.unwrap_or_else(|| default_mime.to_string()),
            };
        }
        match self.gcs_uri.or(self.gcs_output_directory) {
            Some(uri) => GeneratedMedia::Remote { uri },
            None => GeneratedMedia::Missing,
        }
    }
}

/// Response of the synchronous `:predict` call.
#[derive(Debug, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<MediaEntry>,
}

impl PredictResponse {
    /// First prediction, as generated media.
    pub fn into_media(self) -> GeneratedMedia {
        self.predictions
            .into_iter()
            .next()
            .map(|entry| entry.into_media(DEFAULT_IMAGE_MIME))
            .unwrap_or(GeneratedMedia::Missing)
    }
}

/// Response of `:predictLongRunning`.
#[derive(Debug, Deserialize)]
pub struct OperationStarted {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoOutput {
    #[serde(default)]
    pub videos: Vec<MediaEntry>,
}

/// Response of `:fetchPredictOperation`.
#[derive(Debug, Default, Deserialize)]
pub struct OperationResponse {
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<VideoOutput>,
}

impl OperationResponse {
    pub fn into_status(self) -> OperationStatus {
        if !self.done {
            return OperationStatus::Pending;
        }
        if let Some(err) = self.error {
            return OperationStatus::Failed(format!(
                "Operation failed (code {}): {}",
                err.code, err.message
            ));
        }
        let media = self
            .response
            .and_then(|r| r.videos.into_iter().next())
            .map(|entry| entry.into_media(DEFAULT_VIDEO_MIME))
            .unwrap_or(GeneratedMedia::Missing);
        OperationStatus::Done(media)
    }
}
