pub mod config;
pub mod domain;
pub mod errors;
pub mod slug;

pub use domain::agent::{Agent, AgentDraft, AgentPatch};
pub use domain::conversation::{
    Channel, Conversation, ConversationStatus, Message, MessageRole,
};
pub use errors::ServiceError;
