//! Conversation inspection endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use parley_core::ServiceError;
use parley_db::repositories::{SqlConversationRepository, SqlMessageRepository};
use parley_db::DbPool;

use crate::schemas::{error_response, ApiError, ConversationResponse};

#[derive(Clone)]
pub struct ConversationsState {
    pub pool: DbPool,
}

pub fn router(state: ConversationsState) -> Router {
    Router::new().route("/api/conversations/{id}", get(get_by_id)).with_state(state)
}

pub async fn get_by_id(
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversations = SqlConversationRepository::new(state.pool.clone());
    let conversation = conversations
        .find_by_id(id)
        .await
        .map_err(|e| error_response(e.into()))?
        .ok_or_else(|| error_response(ServiceError::not_found("conversation", id)))?;

    let messages = SqlMessageRepository::new(state.pool.clone())
        .list_for_conversation(id)
        .await
        .map_err(|e| error_response(e.into()))?;

    Ok(Json(ConversationResponse::new(conversation, messages)))
}
