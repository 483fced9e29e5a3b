use thiserror::Error;

use crate::slug::SlugError;

/// Error taxonomy shared by every service layer.
///
/// `NotFound`, `Validation`, and `Conflict` are detected before any mutation
/// and carry messages safe to return to callers verbatim. `Unavailable` and
/// `Internal` wrap provider/database failures whose details belong in logs,
/// not responses.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} `{key}` not found"))
    }

    /// Message suitable for an HTTP response body.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(message) | Self::Validation(message) | Self::Conflict(message) => {
                message.clone()
            }
            Self::Unavailable(_) => {
                "The upstream provider did not respond in time. Please retry shortly.".to_string()
            }
            Self::Internal(_) => "An unexpected internal error occurred.".to_string(),
        }
    }
}

impl From<SlugError> for ServiceError {
    fn from(value: SlugError) -> Self {
        Self::Validation(value.to_string())
    }
}
