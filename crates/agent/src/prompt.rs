use parley_core::{Agent, Message, MessageRole};

use crate::llm::{ChatMessage, ChatRequest};

/// Assemble the provider request for one exchange.
///
/// Layout is fixed: one system entry (agent prompt, plus retrieved knowledge
/// when present), followed by the stored history in chronological order. The
/// caller has already persisted the incoming user message, so it arrives here
/// as the tail of `history`.
pub fn build_request(agent: &Agent, history: &[Message], knowledge: Option<&str>) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_entry(agent, knowledge)));

    for message in history {
        // Stored system messages never replay; the agent prompt is the only
        // system entry the provider sees.
        let entry = match message.role {
            MessageRole::User => ChatMessage::user(message.content.clone()),
            MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
            MessageRole::System => continue,
        };
        messages.push(entry);
    }

    ChatRequest {
        model: agent.model.clone(),
        messages,
        temperature: agent.temperature,
        max_tokens: agent.max_tokens,
        top_p: agent.top_p,
        frequency_penalty: agent.frequency_penalty,
        presence_penalty: agent.presence_penalty,
    }
}

fn system_entry(agent: &Agent, knowledge: Option<&str>) -> String {
    match knowledge.map(str::trim).filter(|context| !context.is_empty()) {
        Some(context) => format!(
            "{}\n\nUse the following knowledge base context when relevant:\n{}",
            agent.system_prompt, context
        ),
        None => agent.system_prompt.clone(),
    }
}
