use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use parley_core::ServiceError;

pub mod agent;
pub mod conversation;
pub mod message;

pub use agent::SqlAgentRepository;
pub use conversation::SqlConversationRepository;
pub use message::SqlMessageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        ServiceError::Internal(value.to_string())
    }
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

pub(crate) fn parse_uuid(column: &str, value: String) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(&value)
        .map_err(|e| RepositoryError::Decode(format!("invalid uuid in `{column}`: {e}")))
}
