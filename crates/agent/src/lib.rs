//! LLM gateway - provider access, prompt assembly, and cost accounting
//!
//! This crate isolates everything that talks to (or reasons about) the
//! language-model provider:
//! - `llm` - the `LlmClient` trait plus the chat request/response types
//! - `openai` - the OpenAI-compatible HTTP implementation
//! - `prompt` - deterministic assembly of the message window sent upstream
//! - `pricing` - token-to-dollar conversion from the configured price table
//! - `retrieval` - the knowledge-context seam (currently a no-op)
//!
//! Nothing here touches the database. The conversation service owns
//! persistence and hands this crate fully-loaded history.

pub mod llm;
pub mod openai;
pub mod pricing;
pub mod prompt;
pub mod retrieval;

pub use llm::{ChatCompletion, ChatMessage, ChatRequest, LlmClient, LlmError};
pub use openai::OpenAiClient;
pub use pricing::PriceTable;
pub use retrieval::{ContextRetriever, NoopRetrieval};
