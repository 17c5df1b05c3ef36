//! Writes base64 media payloads to the local media directory.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use genrelay_core::job::MaterializedFile;

/// Errors from decoding or persisting a media payload.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("Failed to decode media payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write media file: {0}")]
    Io(#[from] std::io::Error),
}

/// File extension for a MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

/// Decodes provider payloads into files under a single directory.
#[derive(Debug, Clone)]
pub struct MediaMaterializer {
    dir: PathBuf,
}

impl MediaMaterializer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode `data_base64` and persist it as `<job_id>.<ext>`.
    ///
    /// The bytes are written to a `.part` sibling and renamed into place, so
    /// the final path only ever holds a complete file.
    pub async fn materialize(
        &self,
        job_id: &str,
        data_base64: &str,
        mime_type: &str,
    ) -> Result<MaterializedFile, MaterializeError> {
        let bytes = BASE64.decode(data_base64.trim())?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{job_id}.{}", extension_for_mime(mime_type));
        let path = self.dir.join(&file_name);
        let partial = self.dir.join(format!("{file_name}.part"));

        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(job_id, path = %path.display(), size = bytes.len(), "Media materialized");

        Ok(MaterializedFile {
            path,
            mime_type: mime_type.to_string(),
        })
    }

    /// Delete a materialized file. A file that is already gone is not an error.
    pub async fn remove(&self, path: &Path) -> Result<(), MaterializeError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
