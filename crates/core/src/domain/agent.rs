use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 1500;
pub const DEFAULT_BRAND_COLOR: &str = "#4F46E5";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Olá! Como posso ajudar?";
pub const DEFAULT_INPUT_PLACEHOLDER: &str = "Digite sua mensagem...";

/// A configured persona that can hold conversations: prompt configuration,
/// model parameters, channel/feature flags, and white-label branding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
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

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Validated input for creating an agent. The slug here is already
/// normalized and uniqueness-checked by the caller.
#[derive(Clone, Debug)]
pub struct AgentDraft {
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
}

impl AgentDraft {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_name(&self.name)?;
        validate_system_prompt(&self.system_prompt)?;
        validate_model_params(
            self.temperature,
            self.max_tokens,
            self.top_p,
            self.frequency_penalty,
            self.presence_penalty,
        )
    }

    /// Materialize a full agent row with fresh id and timestamps.
    pub fn into_agent(self) -> Agent {
        let now = Utc::now();
        Agent {
            id: Uuid::new_v4(),
            name: self.name,
            slug: self.slug,
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
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Partial update for an agent; `None` leaves the field untouched.
/// A supplied slug must already be normalized and uniqueness-checked.
#[derive(Clone, Debug, Default)]
pub struct AgentPatch {
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

impl AgentPatch {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(system_prompt) = &self.system_prompt {
            validate_system_prompt(system_prompt)?;
        }
        validate_model_params(
            self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            self.top_p.unwrap_or(1.0),
            self.frequency_penalty.unwrap_or(0.0),
            self.presence_penalty.unwrap_or(0.0),
        )
    }
}

impl Agent {
    /// Apply a patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: AgentPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(system_prompt) = patch.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(temperature) = patch.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(top_p) = patch.top_p {
            self.top_p = top_p;
        }
        if let Some(frequency_penalty) = patch.frequency_penalty {
            self.frequency_penalty = frequency_penalty;
        }
        if let Some(presence_penalty) = patch.presence_penalty {
            self.presence_penalty = presence_penalty;
        }
        if let Some(rag_enabled) = patch.rag_enabled {
            self.rag_enabled = rag_enabled;
        }
        if let Some(whatsapp_enabled) = patch.whatsapp_enabled {
            self.whatsapp_enabled = whatsapp_enabled;
        }
        if let Some(whatsapp_number) = patch.whatsapp_number {
            self.whatsapp_number = Some(whatsapp_number);
        }
        if let Some(email_enabled) = patch.email_enabled {
            self.email_enabled = email_enabled;
        }
        if let Some(email_address) = patch.email_address {
            self.email_address = Some(email_address);
        }
        if let Some(web_enabled) = patch.web_enabled {
            self.web_enabled = web_enabled;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(allow_public_access) = patch.allow_public_access {
            self.allow_public_access = allow_public_access;
        }
        if let Some(brand_color) = patch.brand_color {
            self.brand_color = brand_color;
        }
        if let Some(welcome_message) = patch.welcome_message {
            self.welcome_message = welcome_message;
        }
        if let Some(input_placeholder) = patch.input_placeholder {
            self.input_placeholder = input_placeholder;
        }
        if let Some(meta_title) = patch.meta_title {
            self.meta_title = Some(meta_title);
        }
        if let Some(meta_description) = patch.meta_description {
            self.meta_description = Some(meta_description);
        }
        if let Some(og_image_url) = patch.og_image_url {
            self.og_image_url = Some(og_image_url);
        }
        self.updated_at = Utc::now();
    }

    /// An agent is chat-capable only while active and not soft-deleted.
    pub fn is_available(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn is_publicly_visible(&self) -> bool {
        self.is_available() && self.allow_public_access
    }
}

fn validate_name(name: &str) -> Result<(), ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation("name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > 200 {
        return Err(ServiceError::Validation("name cannot exceed 200 characters".to_string()));
    }
    Ok(())
}

fn validate_system_prompt(prompt: &str) -> Result<(), ServiceError> {
    if prompt.trim().chars().count() < 10 {
        return Err(ServiceError::Validation(
            "system_prompt must have at least 10 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_model_params(
    temperature: f64,
    max_tokens: i64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
) -> Result<(), ServiceError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ServiceError::Validation("temperature must be in range 0.0..=2.0".to_string()));
    }
    if !(1..=4096).contains(&max_tokens) {
        return Err(ServiceError::Validation("max_tokens must be in range 1..=4096".to_string()));
    }
    if !(0.0..=1.0).contains(&top_p) {
        return Err(ServiceError::Validation("top_p must be in range 0.0..=1.0".to_string()));
    }
    if !(-2.0..=2.0).contains(&frequency_penalty) {
        return Err(ServiceError::Validation(
            "frequency_penalty must be in range -2.0..=2.0".to_string(),
        ));
    }
    if !(-2.0..=2.0).contains(&presence_penalty) {
        return Err(ServiceError::Validation(
            "presence_penalty must be in range -2.0..=2.0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AgentDraft, AgentPatch, DEFAULT_MODEL};
    use crate::errors::ServiceError;

    fn draft() -> AgentDraft {
        AgentDraft {
            name: "Vendedor DUX".to_string(),
            slug: "vendedor-dux".to_string(),
            description: None,
            avatar_url: None,
            system_prompt: "You are a helpful sales assistant.".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1500,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            rag_enabled: false,
            whatsapp_enabled: false,
            whatsapp_number: None,
            email_enabled: false,
            email_address: None,
            web_enabled: true,
            is_active: true,
            allow_public_access: true,
            brand_color: "#4F46E5".to_string(),
            welcome_message: "Olá!".to_string(),
            input_placeholder: "...".to_string(),
            meta_title: None,
            meta_description: None,
            og_image_url: None,
        }
    }

    #[test]
    fn valid_draft_passes_and_materializes() {
        let draft = draft();
        draft.validate().expect("draft should validate");
        let agent = draft.into_agent();
        assert!(agent.is_available());
        assert!(agent.is_publicly_visible());
        assert!(agent.deleted_at.is_none());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut bad = draft();
        bad.temperature = 2.5;
        assert!(matches!(bad.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn short_system_prompt_is_rejected() {
        let mut bad = draft();
        bad.system_prompt = "hi".to_string();
        assert!(matches!(bad.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn patch_applies_only_supplied_fields() {
        let mut agent = draft().into_agent();
        let before_prompt = agent.system_prompt.clone();

        agent.apply(AgentPatch {
            name: Some("Vendedor DUX v2".to_string()),
            temperature: Some(0.2),
            ..AgentPatch::default()
        });

        assert_eq!(agent.name, "Vendedor DUX v2");
        assert_eq!(agent.temperature, 0.2);
        assert_eq!(agent.system_prompt, before_prompt);
    }

    #[test]
    fn inactive_agent_is_not_publicly_visible() {
        let mut agent = draft().into_agent();
        agent.apply(AgentPatch { is_active: Some(false), ..AgentPatch::default() });
        assert!(!agent.is_available());
        assert!(!agent.is_publicly_visible());
    }
}
