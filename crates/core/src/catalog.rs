//! Static model catalog and request validation.
//!
//! The catalog is the single list of models the service forwards to. Every
//! inbound generation request is checked against it before any provider
//! call is made, and validation failures name the violated constraint.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::MediaKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Resolution used when the request does not name one.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Resolutions accepted by resolution-capable models.
pub const VALID_RESOLUTIONS: &[&str] = &["720p", "1080p"];

/// Upper bound on prompt length, in characters.
pub const MAX_PROMPT_LEN: usize = 4000;

const IMAGE_RATIOS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];

// ---------------------------------------------------------------------------
// Model specs
// ---------------------------------------------------------------------------

/// Provider endpoint verb used to invoke a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endpoint {
    #[serde(rename = "predict")]
    Predict,
    #[serde(rename = "predictLongRunning")]
    PredictLongRunning,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::PredictLongRunning => "predictLongRunning",
        }
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Public key callers use in requests (e.g. `veo3`).
    pub key: &'static str,
    /// Provider-side model identifier.
    pub model_id: &'static str,
    pub kind: MediaKind,
    pub endpoint: Endpoint,
    pub description: &'static str,
    pub supported_ratios: &'static [&'static str],
    pub default_ratio: &'static str,
    /// Clip length in seconds (video models only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Whether the model generates an audio track.
    pub audio: bool,
    /// Whether the provider accepts a `resolution` parameter for this model.
    pub supports_resolution: bool,
}

impl ModelSpec {
    pub fn supports_ratio(&self, ratio: &str) -> bool {
        self.supported_ratios.contains(&ratio)
    }
}

const BUILTIN_MODELS: &[ModelSpec] = &[
    ModelSpec {
        key: "veo3",
        model_id: "veo-3.0-generate-001",
        kind: MediaKind::Video,
        endpoint: Endpoint::PredictLongRunning,
        description: "Veo 3 (GA)",
        supported_ratios: &["16:9", "9:16"],
        default_ratio: "16:9",
        duration_secs: Some(8),
        audio: true,
        supports_resolution: true,
    },
    ModelSpec {
        key: "veo3-preview",
        model_id: "veo-3.0-generate-preview",
        kind: MediaKind::Video,
        endpoint: Endpoint::PredictLongRunning,
        description: "Veo 3 Preview with audio",
        supported_ratios: &["16:9"],
        default_ratio: "16:9",
        duration_secs: Some(8),
        audio: true,
        supports_resolution: true,
    },
    ModelSpec {
        key: "veo2",
        model_id: "veo-2.0-generate-001",
        kind: MediaKind::Video,
        endpoint: Endpoint::PredictLongRunning,
        description: "Veo 2 (GA)",
        supported_ratios: &["16:9", "9:16"],
        default_ratio: "16:9",
        duration_secs: Some(8),
        audio: false,
        supports_resolution: false,
    },
    ModelSpec {
        key: "imagen4",
        model_id: "imagen-4.0-generate",
        kind: MediaKind::Image,
        endpoint: Endpoint::Predict,
        description: "Imagen 4, high quality images",
        supported_ratios: IMAGE_RATIOS,
        default_ratio: "1:1",
        duration_secs: None,
        audio: false,
        supports_resolution: false,
    },
    ModelSpec {
        key: "imagen4-fast",
        model_id: "imagen-4.0-fast-generate",
        kind: MediaKind::Image,
        endpoint: Endpoint::Predict,
        description: "Imagen 4 Fast, quick image generation",
        supported_ratios: IMAGE_RATIOS,
        default_ratio: "1:1",
        duration_secs: None,
        audio: false,
        supports_resolution: false,
    },
    ModelSpec {
        key: "imagen3",
        model_id: "imagen-3.0-generate-001",
        kind: MediaKind::Image,
        endpoint: Endpoint::Predict,
        description: "Imagen 3 (GA), stable image generation",
        supported_ratios: IMAGE_RATIOS,
        default_ratio: "1:1",
        duration_secs: None,
        audio: false,
        supports_resolution: false,
    },
];

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Inbound generation request as sent by API callers.
///
/// Fields are optional at the serde level so that missing values produce a
/// validation error naming the field instead of a generic decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "aspect_ratio")]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// A request that passed catalog validation, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSpec {
    pub model: ModelSpec,
    pub prompt: String,
    pub aspect_ratio: String,
    /// Only set for models that accept a resolution.
    pub resolution: Option<String>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered collection of supported models.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// The built-in Imagen / Veo catalog.
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_MODELS.to_vec(),
        }
    }

    /// Build a catalog from an explicit model list.
    pub fn from_models(models: Vec<ModelSpec>) -> Self {
        Self { models }
    }

    pub fn get(&self, key: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.key == key)
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.key).collect()
    }

    /// Validate a request and resolve defaults.
    ///
    /// Checks, in order: required fields, prompt length, model existence,
    /// aspect ratio support, resolution.
    pub fn validate(&self, request: &GenerateRequest) -> Result<GenerationSpec, CoreError> {
        let model_key = non_blank(request.model.as_deref());
        let prompt = non_blank(request.prompt.as_deref());

        let (model_key, prompt) = match (model_key, prompt) {
            (Some(m), Some(p)) => (m, p),
            _ => {
                return Err(CoreError::Validation(
                    "Required fields: model, prompt".to_string(),
                ))
            }
        };

        if prompt.chars().count() > MAX_PROMPT_LEN {
            return Err(CoreError::Validation(format!(
                "Prompt must not exceed {MAX_PROMPT_LEN} characters"
            )));
        }

        let model = self.get(model_key).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown model '{model_key}'. Available models: {:?}",
                self.keys()
            ))
        })?;

        let aspect_ratio = non_blank(request.aspect_ratio.as_deref()).unwrap_or(model.default_ratio);
        if !model.supports_ratio(aspect_ratio) {
            return Err(CoreError::Validation(format!(
                "Unsupported aspect ratio '{aspect_ratio}' for model '{}'. Supported: {:?}",
                model.key, model.supported_ratios
            )));
        }

        let resolution = non_blank(request.resolution.as_deref()).unwrap_or(DEFAULT_RESOLUTION);
        if !VALID_RESOLUTIONS.contains(&resolution) {
            return Err(CoreError::Validation(format!(
                "Invalid resolution '{resolution}'. Must be one of: {VALID_RESOLUTIONS:?}"
            )));
        }

        Ok(GenerationSpec {
            model: model.clone(),
            prompt: prompt.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            resolution: model.supports_resolution.then(|| resolution.to_string()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(model: &str, prompt: &str, ratio: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            model: Some(model.to_string()),
            prompt: Some(prompt.to_string()),
            aspect_ratio: ratio.map(str::to_string),
            resolution: None,
        }
    }

    #[test]
    fn builtin_catalog_keeps_declared_order() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            catalog.keys(),
            vec!["veo3", "veo3-preview", "veo2", "imagen4", "imagen4-fast", "imagen3"]
        );
    }

    #[test]
    fn veo3_accepts_portrait_ratio() {
        let spec = ModelCatalog::builtin()
            .validate(&request("veo3", "ocean waves", Some("9:16")))
            .unwrap();
        assert_eq!(spec.model.kind, MediaKind::Video);
        assert_eq!(spec.aspect_ratio, "9:16");
        assert_eq!(spec.resolution.as_deref(), Some("720p"));
    }

    #[test]
    fn veo3_rejects_square_ratio() {
        let err = ModelCatalog::builtin()
            .validate(&request("veo3", "ocean waves", Some("1:1")))
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("1:1") && msg.contains("16:9"));
    }

    #[test]
    fn unknown_model_lists_available_models() {
        let err = ModelCatalog::builtin()
            .validate(&request("dalle", "a cat", None))
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("dalle") && msg.contains("imagen4"));
    }

    #[test]
    fn missing_prompt_is_rejected() {
        let req = GenerateRequest {
            model: Some("imagen4".into()),
            prompt: Some("   ".into()),
            ..Default::default()
        };
        let err = ModelCatalog::builtin().validate(&req).unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation("Required fields: model, prompt".into())
        );
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let prompt = "x".repeat(MAX_PROMPT_LEN + 1);
        let err = ModelCatalog::builtin()
            .validate(&request("imagen4", &prompt, None))
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Prompt"));
    }

    #[test]
    fn image_model_uses_default_ratio_and_drops_resolution() {
        let spec = ModelCatalog::builtin()
            .validate(&request("imagen4", "a red fox", None))
            .unwrap();
        assert_eq!(spec.aspect_ratio, "1:1");
        assert_eq!(spec.resolution, None);
    }

    #[test]
    fn invalid_resolution_is_rejected() {
        let mut req = request("veo3", "ocean waves", None);
        req.resolution = Some("4k".into());
        let err = ModelCatalog::builtin().validate(&req).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("4k"));
    }

    #[test]
    fn snake_case_aspect_ratio_alias_is_accepted() {
        let req: GenerateRequest = serde_json::from_value(serde_json::json!({
            "model": "veo2",
            "prompt": "city lights",
            "aspect_ratio": "9:16",
        }))
        .unwrap();
        assert_eq!(req.aspect_ratio.as_deref(), Some("9:16"));
    }
}
