//! Request/response bodies for the HTTP surface, plus the error-to-status
//! mapping every handler funnels through.

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use parley_core::domain::agent::{
    DEFAULT_BRAND_COLOR, DEFAULT_INPUT_PLACEHOLDER, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_WELCOME_MESSAGE,
};
use parley_core::{Agent, AgentDraft, AgentPatch, Channel, Conversation, Message, ServiceError};

pub const MAX_CHAT_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

/// Map a service error onto its HTTP status. Internal and upstream failures
/// are logged here with full detail; the response carries only the sanitized
/// user message.
pub fn error_response(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Unavailable(_) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if matches!(err, ServiceError::Internal(_) | ServiceError::Unavailable(_)) {
        error!(error = %err, "request failed");
    }

    (status, Json(ErrorBody { error: err.user_message() }))
}

pub fn validate_chat_message(message: &str) -> Result<(), ServiceError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation("message cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_CHAT_MESSAGE_CHARS {
        return Err(ServiceError::Validation(format!(
            "message cannot exceed {MAX_CHAT_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub system_prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub rag_enabled: bool,
    #[serde(default)]
    pub whatsapp_enabled: bool,
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub email_enabled: bool,
    pub email_address: Option<String>,
    #[serde(default = "default_true")]
    pub web_enabled: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub allow_public_access: bool,
    pub brand_color: Option<String>,
    pub welcome_message: Option<String>,
    pub input_placeholder: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl CreateAgentRequest {
    /// Build a draft with defaults filled in. The slug is assigned separately
    /// once uniqueness is settled.
    pub fn into_draft(self, slug: String) -> AgentDraft {
        AgentDraft {
            name: self.name,
            slug,
            description: self.description,
            avatar_url: self.avatar_url,
            system_prompt: self.system_prompt,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            top_p: self.top_p.unwrap_or(1.0),
            frequency_penalty: self.frequency_penalty.unwrap_or(0.0),
            presence_penalty: self.presence_penalty.unwrap_or(0.0),
            rag_enabled: self.rag_enabled,
            whatsapp_enabled: self.whatsapp_enabled,
            whatsapp_number: self.whatsapp_number,
            email_enabled: self.email_enabled,
            email_address: self.email_address,
            web_enabled: self.web_enabled,
            is_active: self.is_active,
            allow_public_access: self.allow_public_access,
            brand_color: self.brand_color.unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_string()),
            welcome_message: self
                .welcome_message
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
            input_placeholder: self
                .input_placeholder
                .unwrap_or_else(|| DEFAULT_INPUT_PLACEHOLDER.to_string()),
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            og_image_url: self.og_image_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub rag_enabled: Option<bool>,
    pub whatsapp_enabled: Option<bool>,
    pub whatsapp_number: Option<String>,
    pub email_enabled: Option<bool>,
    pub email_address: Option<String>,
    pub web_enabled: Option<bool>,
    pub is_active: Option<bool>,
    pub allow_public_access: Option<bool>,
    pub brand_color: Option<String>,
    pub welcome_message: Option<String>,
    pub input_placeholder: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image_url: Option<String>,
}

impl UpdateAgentRequest {
    /// Everything except the slug, which the handler renormalizes and
    /// uniqueness-checks first.
    pub fn into_patch(self, slug: Option<String>) -> AgentPatch {
        AgentPatch {
            name: self.name,
            slug,
            description: self.description,
            avatar_url: self.avatar_url,
            system_prompt: self.system_prompt,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            rag_enabled: self.rag_enabled,
            whatsapp_enabled: self.whatsapp_enabled,
            whatsapp_number: self.whatsapp_number,
            email_enabled: self.email_enabled,
            email_address: self.email_address,
            web_enabled: self.web_enabled,
            is_active: self.is_active,
            allow_public_access: self.allow_public_access,
            brand_color: self.brand_color,
            welcome_message: self.welcome_message,
            input_placeholder: self.input_placeholder,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            og_image_url: self.og_image_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub rag_enabled: bool,
    pub whatsapp_enabled: bool,
    pub whatsapp_number: Option<String>,
    pub email_enabled: bool,
    pub email_address: Option<String>,
    pub web_enabled: bool,
    pub is_active: bool,
    pub allow_public_access: bool,
    pub brand_color: String,
    pub welcome_message: String,
    pub input_placeholder: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image_url: Option<String>,
    pub public_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentResponse {
    pub fn from_agent(agent: Agent, public_base_url: &str) -> Self {
        let public_url = public_agent_url(public_base_url, &agent.slug);
        Self {
            id: agent.id,
            name: agent.name,
            slug: agent.slug,
            description: agent.description,
            avatar_url: agent.avatar_url,
            system_prompt: agent.system_prompt,
            model: agent.model,
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
            top_p: agent.top_p,
            frequency_penalty: agent.frequency_penalty,
            presence_penalty: agent.presence_penalty,
            rag_enabled: agent.rag_enabled,
            whatsapp_enabled: agent.whatsapp_enabled,
            whatsapp_number: agent.whatsapp_number,
            email_enabled: agent.email_enabled,
            email_address: agent.email_address,
            web_enabled: agent.web_enabled,
            is_active: agent.is_active,
            allow_public_access: agent.allow_public_access,
            brand_color: agent.brand_color,
            welcome_message: agent.welcome_message,
            input_placeholder: agent.input_placeholder,
            meta_title: agent.meta_title,
            meta_description: agent.meta_description,
            og_image_url: agent.og_image_url,
            public_url,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

pub fn public_agent_url(public_base_url: &str, slug: &str) -> String {
    format!("{}/agents/{slug}", public_base_url.trim_end_matches('/'))
}

/// Branding payload for the public widget. Deliberately excludes the system
/// prompt and model parameters.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicAgentResponse {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub brand_color: String,
    pub welcome_message: String,
    pub input_placeholder: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image_url: Option<String>,
}

impl From<Agent> for PublicAgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            name: agent.name,
            slug: agent.slug,
            description: agent.description,
            avatar_url: agent.avatar_url,
            brand_color: agent.brand_color,
            welcome_message: agent.welcome_message,
            input_placeholder: agent.input_placeholder,
            meta_title: agent.meta_title,
            meta_description: agent.meta_description,
            og_image_url: agent.og_image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub agent_id: Uuid,
    pub user_identifier: String,
    pub message: String,
    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct PublicChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub conversation_id: Uuid,
    pub session_id: Uuid,
    pub model_used: Option<String>,
    pub tokens: Option<i64>,
    pub cost: Option<f64>,
    pub processing_time: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub tokens: Option<i64>,
    pub cost: Option<f64>,
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            role: message.role.as_str().to_string(),
            content: message.content,
            tokens: message.tokens,
            cost: message.cost,
            model_used: message.model_used,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub user_identifier: String,
    pub session_id: Uuid,
    pub channel: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<MessageResponse>,
}

impl ConversationResponse {
    pub fn new(conversation: Conversation, messages: Vec<Message>) -> Self {
        Self {
            id: conversation.id,
            agent_id: conversation.agent_id,
            user_identifier: conversation.user_identifier,
            session_id: conversation.session_id,
            channel: conversation.channel.as_str().to_string(),
            status: conversation.status.as_str().to_string(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        }
    }
}

/// Replay payload for the public widget. Unknown sessions get the empty
/// shape rather than an error.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicHistoryResponse {
    pub conversation_id: Option<Uuid>,
    pub messages: Vec<MessageResponse>,
}

impl PublicHistoryResponse {
    pub fn empty() -> Self {
        Self { conversation_id: None, messages: Vec::new() }
    }

    pub fn new(conversation_id: Uuid, messages: Vec<Message>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelDistribution {
    pub web: i64,
    pub whatsapp: i64,
    pub email: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsOverviewResponse {
    pub period: String,
    pub total_agents: i64,
    pub active_agents: i64,
    pub total_conversations: i64,
    pub active_conversations: i64,
    pub total_messages: i64,
    pub total_cost: f64,
    pub avg_response_time: f64,
    pub channel_distribution: ChannelDistribution,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentAnalyticsResponse {
    pub agent: AgentSummary,
    pub period: String,
    pub total_conversations: i64,
    pub total_messages: i64,
    pub total_cost: f64,
    pub avg_response_time: f64,
    pub channel_breakdown: ChannelDistribution,
}
