//! Conversation orchestration: one exchange = one transaction.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use parley_agent::{prompt, ContextRetriever, LlmClient, PriceTable};
use parley_core::{Agent, Channel, Conversation, Message, MessageRole, ServiceError};
use parley_db::repositories::{conversation, message, SqlAgentRepository, SqlConversationRepository};
use parley_db::DbPool;

use crate::schemas::{error_response, validate_chat_message, ApiError, ChatRequestBody, ChatResponseBody};

#[derive(Clone)]
pub struct ChatService {
    pool: DbPool,
    llm: Arc<dyn LlmClient>,
    prices: PriceTable,
    retriever: Arc<dyn ContextRetriever>,
    history_limit: u32,
}

pub struct ChatOutcome {
    pub conversation: Conversation,
    pub reply: Message,
}

impl ChatService {
    pub fn new(
        pool: DbPool,
        llm: Arc<dyn LlmClient>,
        prices: PriceTable,
        retriever: Arc<dyn ContextRetriever>,
        history_limit: u32,
    ) -> Self {
        Self { pool, llm, prices, retriever, history_limit }
    }

    /// Run one exchange against an already-resolved, available agent.
    ///
    /// `session_id` is stored on a newly created conversation and handed back
    /// to clients, so the value they replay resolves the same thread later.
    ///
    /// The user message, history fetch, provider call, assistant message, and
    /// conversation bump all live in one transaction: a provider failure
    /// leaves no trace of the attempt.
    pub async fn send_message(
        &self,
        agent: &Agent,
        user_identifier: &str,
        channel: Channel,
        session_id: Uuid,
        message_text: &str,
    ) -> Result<ChatOutcome, ServiceError> {
        validate_chat_message(message_text)?;

        let conversations = SqlConversationRepository::new(self.pool.clone());
        let conversation = conversations
            .find_or_create_active(agent.id, user_identifier, channel, session_id)
            .await?;

        let knowledge = if agent.rag_enabled {
            self.retriever.retrieve(agent.id, message_text).await?
        } else {
            None
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ServiceError::Internal(format!("failed to open transaction: {e}")))?;

        let user_message = Message::user(conversation.id, message_text.trim());
        message::insert(&mut *tx, &user_message).await?;

        let history =
            message::recent_history(&mut *tx, conversation.id, self.history_limit).await?;
        let request = prompt::build_request(agent, &history, knowledge.as_deref());

        let started = Instant::now();
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(err) => {
                // Drop the transaction: the user message must not survive a
                // failed exchange.
                tx.rollback()
                    .await
                    .map_err(|e| ServiceError::Internal(format!("rollback failed: {e}")))?;
                return Err(err.into());
            }
        };
        let processing_time = started.elapsed().as_secs_f64();

        let cost =
            self.prices.cost_usd(&completion.model, completion.input_tokens, completion.output_tokens);
        let now = Utc::now();

        let reply = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            role: MessageRole::Assistant,
            content: completion.content.clone(),
            tokens: Some(completion.total_tokens()),
            input_tokens: Some(completion.input_tokens),
            output_tokens: Some(completion.output_tokens),
            cost: Some(cost),
            processing_time: Some(processing_time),
            model_used: Some(completion.model.clone()),
            created_at: now,
        };
        message::insert(&mut *tx, &reply).await?;
        conversation::touch(&mut *tx, conversation.id, now).await?;

        tx.commit()
            .await
            .map_err(|e| ServiceError::Internal(format!("failed to commit exchange: {e}")))?;

        info!(
            agent_slug = %agent.slug,
            conversation_id = %conversation.id,
            model = %completion.model,
            tokens = completion.total_tokens(),
            "exchange completed"
        );

        Ok(ChatOutcome { conversation, reply })
    }
}

#[derive(Clone)]
pub struct ChatState {
    pub pool: DbPool,
    pub chat: ChatService,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/chat", post(send)).with_state(state)
}

/// Admin chat endpoint: addresses the agent by id and supplies an explicit
/// user identity and channel.
pub async fn send(
    State(state): State<ChatState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let agents = SqlAgentRepository::new(state.pool.clone());
    let agent = agents
        .find_by_id(body.agent_id)
        .await
        .map_err(|e| error_response(e.into()))?
        .filter(Agent::is_available)
        .ok_or_else(|| error_response(ServiceError::not_found("agent", body.agent_id)))?;

    let user_identifier = body.user_identifier.trim();
    if user_identifier.is_empty() {
        return Err(error_response(ServiceError::Validation(
            "user_identifier cannot be empty".to_string(),
        )));
    }

    let channel = body.channel.unwrap_or_default();
    let outcome = state
        .chat
        .send_message(&agent, user_identifier, channel, Uuid::new_v4(), &body.message)
        .await
        .map_err(error_response)?;

    Ok(Json(ChatResponseBody {
        response: outcome.reply.content,
        conversation_id: outcome.conversation.id,
        session_id: outcome.conversation.session_id,
        model_used: outcome.reply.model_used,
        tokens: outcome.reply.tokens,
        cost: outcome.reply.cost,
        processing_time: outcome.reply.processing_time,
    }))
}
