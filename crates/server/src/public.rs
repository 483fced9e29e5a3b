//! Unauthenticated widget endpoints, addressed by agent slug.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use parley_core::{slug, Agent, Channel, ServiceError};
use parley_db::repositories::{SqlAgentRepository, SqlConversationRepository, SqlMessageRepository};

use crate::chat::ChatState;
use crate::schemas::{
    error_response, ApiError, ChatResponseBody, PublicAgentResponse, PublicChatRequest,
    PublicHistoryResponse,
};

/// How many stored messages a reloading widget gets back.
const HISTORY_PAGE_SIZE: usize = 50;

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/public/agents/{slug}", get(branding))
        .route("/api/public/agents/{slug}/chat", post(chat))
        .route("/api/public/agents/{slug}/history/{session_id}", get(history))
        .with_state(state)
}

async fn resolve_public_agent(state: &ChatState, raw_slug: &str) -> Result<Agent, ServiceError> {
    // Slugs arriving from URLs are renormalized, so `Vendedor%20DUX` and
    // `vendedor-dux` resolve identically.
    let normalized = slug::normalize(raw_slug);

    let repo = SqlAgentRepository::new(state.pool.clone());
    repo.find_by_slug(&normalized)
        .await?
        .filter(Agent::is_publicly_visible)
        .ok_or_else(|| ServiceError::not_found("agent", normalized))
}

/// White-label branding payload for the chat widget. Never exposes the
/// system prompt or model parameters.
pub async fn branding(
    State(state): State<ChatState>,
    Path(raw_slug): Path<String>,
) -> Result<Json<PublicAgentResponse>, ApiError> {
    let agent = resolve_public_agent(&state, &raw_slug).await.map_err(error_response)?;
    Ok(Json(PublicAgentResponse::from(agent)))
}

/// Public chat: the session id doubles as the user identity, so a browser
/// that replays its session id lands in the same conversation. The stored
/// `conversation.session_id` is that same value, which is what the history
/// endpoint resolves by.
pub async fn chat(
    State(state): State<ChatState>,
    Path(raw_slug): Path<String>,
    Json(body): Json<PublicChatRequest>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let agent = resolve_public_agent(&state, &raw_slug).await.map_err(error_response)?;

    let session = body
        .session_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .unwrap_or_else(Uuid::new_v4);

    let outcome = state
        .chat
        .send_message(&agent, &session.to_string(), Channel::Web, session, &body.message)
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

/// Conversation replay for a widget that reloaded with a stored session id.
/// An unknown or malformed session yields an empty history, never an error.
pub async fn history(
    State(state): State<ChatState>,
    Path((raw_slug, raw_session)): Path<(String, String)>,
) -> Result<Json<PublicHistoryResponse>, ApiError> {
    let agent = resolve_public_agent(&state, &raw_slug).await.map_err(error_response)?;

    let Some(session) = Uuid::parse_str(raw_session.trim()).ok() else {
        return Ok(Json(PublicHistoryResponse::empty()));
    };

    let conversations = SqlConversationRepository::new(state.pool.clone());
    let Some(conversation) = conversations
        .find_by_session(agent.id, session)
        .await
        .map_err(|e| error_response(e.into()))?
    else {
        return Ok(Json(PublicHistoryResponse::empty()));
    };

    let mut messages = SqlMessageRepository::new(state.pool.clone())
        .list_for_conversation(conversation.id)
        .await
        .map_err(|e| error_response(e.into()))?;
    if messages.len() > HISTORY_PAGE_SIZE {
        messages.drain(..messages.len() - HISTORY_PAGE_SIZE);
    }

    Ok(Json(PublicHistoryResponse::new(conversation.id, messages)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;

    use uuid::Uuid;

    use parley_core::AgentPatch;
    use parley_db::repositories::{SqlAgentRepository, SqlConversationRepository};

    use super::{branding, chat, history};
    use crate::chat::tests::{service, setup_pool, ScriptedLlm};
    use crate::chat::ChatState;
    use crate::schemas::PublicChatRequest;

    async fn setup_state() -> ChatState {
        let pool = setup_pool().await;
        let chat = service(
            pool.clone(),
            Arc::new(ScriptedLlm {
                reply: "Posso ajudar!".to_string(),
                input_tokens: 10,
                output_tokens: 4,
            }),
        );
        ChatState { pool, chat }
    }

    async fn insert_agent(state: &ChatState, public: bool) -> parley_core::Agent {
        let mut agent = crate::agents::tests::draft("Vendedor DUX", "vendedor-dux").into_agent();
        agent.apply(AgentPatch { allow_public_access: Some(public), ..AgentPatch::default() });
        SqlAgentRepository::new(state.pool.clone()).insert(&agent).await.expect("insert agent");
        agent
    }

    #[tokio::test]
    async fn branding_resolves_unnormalized_slugs() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(payload) = branding(State(state.clone()), Path("Vendedor DUX".to_string()))
            .await
            .expect("branding");

        assert_eq!(payload.slug, "vendedor-dux");
        assert_eq!(payload.brand_color, "#4F46E5");

        state.pool.close().await;
    }

    #[tokio::test]
    async fn private_agent_is_invisible_publicly() {
        let state = setup_state().await;
        insert_agent(&state, false).await;

        let (status, _) = branding(State(state.clone()), Path("vendedor-dux".to_string()))
            .await
            .err()
            .expect("expected not found");
        assert_eq!(status, StatusCode::NOT_FOUND);

        state.pool.close().await;
    }

    #[tokio::test]
    async fn replayed_session_id_continues_the_conversation() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(first) = chat(
            State(state.clone()),
            Path("vendedor-dux".to_string()),
            Json(PublicChatRequest { message: "oi".to_string(), session_id: None }),
        )
        .await
        .expect("first message");

        let Json(second) = chat(
            State(state.clone()),
            Path("vendedor-dux".to_string()),
            Json(PublicChatRequest {
                message: "e o preço?".to_string(),
                session_id: Some(first.session_id.to_string()),
            }),
        )
        .await
        .expect("second message");

        assert_eq!(first.conversation_id, second.conversation_id);
        assert_eq!(first.session_id, second.session_id);

        state.pool.close().await;
    }

    #[tokio::test]
    async fn response_session_id_matches_the_stored_conversation() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(reply) = chat(
            State(state.clone()),
            Path("vendedor-dux".to_string()),
            Json(PublicChatRequest { message: "oi".to_string(), session_id: None }),
        )
        .await
        .expect("message");

        let conversation = SqlConversationRepository::new(state.pool.clone())
            .find_by_id(reply.conversation_id)
            .await
            .expect("find conversation")
            .expect("conversation exists");
        assert_eq!(conversation.session_id, reply.session_id);

        state.pool.close().await;
    }

    #[tokio::test]
    async fn history_replays_the_session_conversation() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(first) = chat(
            State(state.clone()),
            Path("vendedor-dux".to_string()),
            Json(PublicChatRequest { message: "oi".to_string(), session_id: None }),
        )
        .await
        .expect("first message");

        let Json(replay) = history(
            State(state.clone()),
            Path(("vendedor-dux".to_string(), first.session_id.to_string())),
        )
        .await
        .expect("history");

        assert_eq!(replay.conversation_id, Some(first.conversation_id));
        assert_eq!(replay.messages.len(), 2);
        assert_eq!(replay.messages[0].role, "user");
        assert_eq!(replay.messages[0].content, "oi");
        assert_eq!(replay.messages[1].role, "assistant");

        state.pool.close().await;
    }

    #[tokio::test]
    async fn history_for_unknown_or_malformed_session_is_empty() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(unknown) = history(
            State(state.clone()),
            Path(("vendedor-dux".to_string(), Uuid::new_v4().to_string())),
        )
        .await
        .expect("history");
        assert_eq!(unknown.conversation_id, None);
        assert!(unknown.messages.is_empty());

        let Json(malformed) = history(
            State(state.clone()),
            Path(("vendedor-dux".to_string(), "not-a-uuid".to_string())),
        )
        .await
        .expect("history");
        assert!(malformed.messages.is_empty());

        state.pool.close().await;
    }

    #[tokio::test]
    async fn garbage_session_id_gets_a_fresh_one() {
        let state = setup_state().await;
        insert_agent(&state, true).await;

        let Json(reply) = chat(
            State(state.clone()),
            Path("vendedor-dux".to_string()),
            Json(PublicChatRequest {
                message: "oi".to_string(),
                session_id: Some("not-a-uuid".to_string()),
            }),
        )
        .await
        .expect("message");

        assert_eq!(reply.response, "Posso ajudar!");
        assert_eq!(reply.model_used.as_deref(), Some("gpt-4o-mini"));

        state.pool.close().await;
    }
}
