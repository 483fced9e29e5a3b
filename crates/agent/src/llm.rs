use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parley_core::ServiceError;

/// One entry in the prompt window, provider-agnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// A fully-resolved completion request. Parameter values come from the agent
/// row, never from caller input.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

/// Normalized provider response: the reply text plus the usage numbers the
/// cost ledger needs.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl ChatCompletion {
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("llm transport failure: {0}")]
    Network(String),
    #[error("llm provider rejected the request (status {status}): {detail}")]
    Provider { status: u16, detail: String },
    #[error("llm response could not be interpreted: {0}")]
    MalformedResponse(String),
}

impl From<LlmError> for ServiceError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::Timeout { .. } | LlmError::Network(_) => {
                ServiceError::Unavailable(value.to_string())
            }
            LlmError::Provider { .. } | LlmError::MalformedResponse(_) => {
                ServiceError::Internal(value.to_string())
            }
        }
    }
}

/// Seam between the conversation service and whichever provider backs it.
/// Production uses `OpenAiClient`; tests substitute a scripted double.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError>;
}

#[cfg(test)]
mod tests {
    use parley_core::ServiceError;

    use super::LlmError;

    #[test]
    fn timeouts_and_transport_failures_map_to_unavailable() {
        let timeout: ServiceError = LlmError::Timeout { timeout_secs: 30 }.into();
        assert!(matches!(timeout, ServiceError::Unavailable(_)));

        let network: ServiceError = LlmError::Network("connection reset".to_string()).into();
        assert!(matches!(network, ServiceError::Unavailable(_)));
    }

    #[test]
    fn provider_rejections_map_to_internal() {
        let provider: ServiceError =
            LlmError::Provider { status: 401, detail: "bad key".to_string() }.into();
        assert!(matches!(provider, ServiceError::Internal(_)));

        let malformed: ServiceError =
            LlmError::MalformedResponse("choices array was empty".to_string()).into();
        assert!(matches!(malformed, ServiceError::Internal(_)));
    }
}
