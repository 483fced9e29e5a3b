//! Admin CRUD for agents.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use parley_core::{slug, ServiceError};
use parley_db::repositories::{RepositoryError, SqlAgentRepository};
use parley_db::DbPool;

use crate::schemas::{
    error_response, AgentResponse, ApiError, CreateAgentRequest, UpdateAgentRequest,
};

#[derive(Clone)]
pub struct AgentsState {
    pub pool: DbPool,
    pub public_base_url: String,
}

pub fn router(state: AgentsState) -> Router {
    Router::new()
        .route("/api/agents", post(create))
        .route("/api/agents", get(list))
        .route("/api/agents/{id}", get(get_by_id))
        .route("/api/agents/{id}", put(update))
        .route("/api/agents/{id}", delete(remove))
        .with_state(state)
}

pub async fn create(
    State(state): State<AgentsState>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), ApiError> {
    let repo = SqlAgentRepository::new(state.pool.clone());
    let taken = repo.live_slugs().await.map_err(|e| error_response(e.into()))?;

    let slug_value = match body.slug.as_deref() {
        // An explicit slug is the caller's choice: normalize it, but a
        // collision is their problem, not ours to suffix away.
        Some(raw) => {
            let normalized = slug::normalize(raw);
            slug::validate(&normalized).map_err(|e| error_response(e.into()))?;
            if taken.contains(&normalized) {
                return Err(error_response(ServiceError::Conflict(format!(
                    "slug `{normalized}` is already in use"
                ))));
            }
            normalized
        }
        None => {
            let base = slug::normalize(&body.name);
            slug::validate(&base).map_err(|e| error_response(e.into()))?;
            slug::generate_unique(&base, &taken)
        }
    };

    let draft = body.into_draft(slug_value);
    draft.validate().map_err(error_response)?;
    let agent = draft.into_agent();

    repo.insert(&agent).await.map_err(|e| error_response(map_slug_collision(e)))?;
    info!(agent_id = %agent.id, slug = %agent.slug, "agent created");

    Ok((StatusCode::CREATED, Json(AgentResponse::from_agent(agent, &state.public_base_url))))
}

pub async fn list(
    State(state): State<AgentsState>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let repo = SqlAgentRepository::new(state.pool.clone());
    let agents = repo.list().await.map_err(|e| error_response(e.into()))?;

    Ok(Json(
        agents
            .into_iter()
            .map(|agent| AgentResponse::from_agent(agent, &state.public_base_url))
            .collect(),
    ))
}

pub async fn get_by_id(
    State(state): State<AgentsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, ApiError> {
    let repo = SqlAgentRepository::new(state.pool.clone());
    let agent = repo
        .find_by_id(id)
        .await
        .map_err(|e| error_response(e.into()))?
        .ok_or_else(|| error_response(ServiceError::not_found("agent", id)))?;

    Ok(Json(AgentResponse::from_agent(agent, &state.public_base_url)))
}

pub async fn update(
    State(state): State<AgentsState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let repo = SqlAgentRepository::new(state.pool.clone());
    let mut agent = repo
        .find_by_id(id)
        .await
        .map_err(|e| error_response(e.into()))?
        .ok_or_else(|| error_response(ServiceError::not_found("agent", id)))?;

    let new_slug = match body.slug.as_deref() {
        Some(raw) => {
            let normalized = slug::normalize(raw);
            slug::validate(&normalized).map_err(|e| error_response(e.into()))?;
            if normalized != agent.slug {
                let taken = repo.live_slugs().await.map_err(|e| error_response(e.into()))?;
                if taken.contains(&normalized) {
                    return Err(error_response(ServiceError::Conflict(format!(
                        "slug `{normalized}` is already in use"
                    ))));
                }
            }
            Some(normalized)
        }
        None => None,
    };

    let patch = body.into_patch(new_slug);
    patch.validate().map_err(error_response)?;
    agent.apply(patch);

    let updated = repo.update(&agent).await.map_err(|e| error_response(map_slug_collision(e)))?;
    if !updated {
        return Err(error_response(ServiceError::not_found("agent", id)));
    }
    info!(agent_id = %agent.id, slug = %agent.slug, "agent updated");

    Ok(Json(AgentResponse::from_agent(agent, &state.public_base_url)))
}

pub async fn remove(
    State(state): State<AgentsState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = SqlAgentRepository::new(state.pool.clone());
    let deleted =
        repo.soft_delete(id, Utc::now()).await.map_err(|e| error_response(e.into()))?;

    if !deleted {
        return Err(error_response(ServiceError::not_found("agent", id)));
    }
    info!(agent_id = %id, "agent soft-deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// The live-slug pre-check can race a concurrent create; the partial unique
/// index is the backstop, and its violation reads as a conflict.
fn map_slug_collision(err: RepositoryError) -> ServiceError {
    if let RepositoryError::Database(db_err) = &err {
        if db_err.as_database_error().is_some_and(|d| d.is_unique_violation()) {
            return ServiceError::Conflict("slug is already in use".to_string());
        }
    }
    err.into()
}
