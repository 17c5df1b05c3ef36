use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// What a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Prefix used when minting job identifiers for this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Video => "vid",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Mint a new job identifier, e.g. `vid_0192b8c6...`.
///
/// UUIDv7 keeps ids unique under load and roughly time-ordered.
pub fn new_job_id(kind: MediaKind) -> String {
    format!("{}_{}", kind.id_prefix(), uuid::Uuid::now_v7().simple())
}

/// Opaque bearer credential forwarded to the provider.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_carry_kind_prefix() {
        assert!(new_job_id(MediaKind::Image).starts_with("img_"));
        assert!(new_job_id(MediaKind::Video).starts_with("vid_"));
    }

    #[test]
    fn job_ids_are_unique() {
        let ids: std::collections::HashSet<_> =
            (0..1000).map(|_| new_job_id(MediaKind::Video)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let token = BearerToken::new("ya29.secret");
        assert_eq!(format!("{token:?}"), "BearerToken(***)");
        assert_eq!(token.secret(), "ya29.secret");
    }
}
