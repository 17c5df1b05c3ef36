/// Domain-level errors shared by every crate in the workspace.
///
/// Each variant maps to one class of the error taxonomy surfaced to API
/// callers; `genrelay_api::error::AppError` turns them into HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request violated a catalog or input constraint.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No usable provider credential could be obtained.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested output exists but cannot be served yet (or at all).
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing job lookup.
    pub fn job_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "Job",
            id: id.to_string(),
        }
    }
}
