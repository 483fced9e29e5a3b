//! Aggregate usage metrics over live tables.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use parley_core::ServiceError;
use parley_db::repositories::SqlAgentRepository;
use parley_db::DbPool;

use crate::schemas::{
    error_response, AgentAnalyticsResponse, AgentSummary, AnalyticsOverviewResponse, ApiError,
    ChannelDistribution,
};

#[derive(Clone)]
pub struct AnalyticsState {
    pub pool: DbPool,
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub period: Option<String>,
}

pub fn router(state: AnalyticsState) -> Router {
    Router::new()
        .route("/api/analytics/overview", get(overview))
        .route("/api/analytics/agents/{agent_id}", get(agent_detail))
        .with_state(state)
}

fn period_days(raw: Option<&str>) -> (String, i64) {
    match raw {
        Some("30d") => ("30d".to_string(), 30),
        Some("90d") => ("90d".to_string(), 90),
        // Unknown values degrade to the default window instead of erroring.
        _ => ("7d".to_string(), 7),
    }
}

fn db_error(err: sqlx::Error) -> ApiError {
    error_response(ServiceError::Internal(err.to_string()))
}

fn distribution_from_rows(rows: Vec<(String, i64)>) -> ChannelDistribution {
    let mut distribution = ChannelDistribution { web: 0, whatsapp: 0, email: 0 };
    for (channel, count) in rows {
        match channel.as_str() {
            "web" => distribution.web = count,
            "whatsapp" => distribution.whatsapp = count,
            "email" => distribution.email = count,
            _ => {}
        }
    }
    distribution
}

pub async fn overview(
    State(state): State<AnalyticsState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<AnalyticsOverviewResponse>, ApiError> {
    let (period, days) = period_days(query.period.as_deref());
    let since = (Utc::now() - Duration::days(days)).to_rfc3339();
    let pool = &state.pool;

    let total_agents =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM agents WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await
            .map_err(db_error)?;

    let active_agents = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM agents WHERE deleted_at IS NULL AND is_active = 1",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let total_conversations =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations")
            .fetch_one(pool)
            .await
            .map_err(db_error)?;

    let active_conversations = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM conversations WHERE status = 'active'",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let total_messages =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE created_at >= ?")
            .bind(&since)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;

    let total_cost = sqlx::query_scalar::<_, f64>(
        "SELECT IFNULL(SUM(cost), 0.0) FROM messages WHERE created_at >= ?",
    )
    .bind(&since)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let avg_response_time = sqlx::query_scalar::<_, f64>(
        "SELECT IFNULL(AVG(processing_time), 0.0) FROM messages
         WHERE role = 'assistant' AND created_at >= ?",
    )
    .bind(&since)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let channel_rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT channel, COUNT(*) FROM conversations GROUP BY channel",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(Json(AnalyticsOverviewResponse {
        period,
        total_agents,
        active_agents,
        total_conversations,
        active_conversations,
        total_messages,
        total_cost,
        avg_response_time,
        channel_distribution: distribution_from_rows(channel_rows),
    }))
}

/// Same aggregates as `overview`, scoped to one agent. Messages are reached
/// through their conversation's `agent_id`.
pub async fn agent_detail(
    State(state): State<AnalyticsState>,
    Path(agent_id): Path<Uuid>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<AgentAnalyticsResponse>, ApiError> {
    let (period, days) = period_days(query.period.as_deref());
    let since = (Utc::now() - Duration::days(days)).to_rfc3339();
    let pool = &state.pool;

    let agent = SqlAgentRepository::new(pool.clone())
        .find_by_id(agent_id)
        .await
        .map_err(|e| error_response(e.into()))?
        .ok_or_else(|| error_response(ServiceError::not_found("agent", agent_id)))?;

    let total_conversations =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_one(pool)
            .await
            .map_err(db_error)?;

    let total_messages = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages m
         JOIN conversations c ON c.id = m.conversation_id
         WHERE c.agent_id = ? AND m.created_at >= ?",
    )
    .bind(agent_id.to_string())
    .bind(&since)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let total_cost = sqlx::query_scalar::<_, f64>(
        "SELECT IFNULL(SUM(m.cost), 0.0) FROM messages m
         JOIN conversations c ON c.id = m.conversation_id
         WHERE c.agent_id = ? AND m.created_at >= ?",
    )
    .bind(agent_id.to_string())
    .bind(&since)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let avg_response_time = sqlx::query_scalar::<_, f64>(
        "SELECT IFNULL(AVG(m.processing_time), 0.0) FROM messages m
         JOIN conversations c ON c.id = m.conversation_id
         WHERE c.agent_id = ? AND m.role = 'assistant' AND m.created_at >= ?",
    )
    .bind(agent_id.to_string())
    .bind(&since)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let channel_rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT channel, COUNT(*) FROM conversations WHERE agent_id = ? GROUP BY channel",
    )
    .bind(agent_id.to_string())
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(Json(AgentAnalyticsResponse {
        agent: AgentSummary { id: agent.id, name: agent.name, slug: agent.slug },
        period,
        total_conversations,
        total_messages,
        total_cost,
        avg_response_time,
        channel_breakdown: distribution_from_rows(channel_rows),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use uuid::Uuid;

    use parley_core::Channel;
    use parley_db::repositories::SqlAgentRepository;

    use super::{agent_detail, overview, period_days, AnalyticsState, OverviewQuery};
    use crate::chat::tests::{service, setup_pool, ScriptedLlm};

    #[test]
    fn unknown_periods_fall_back_to_seven_days() {
        assert_eq!(period_days(Some("30d")), ("30d".to_string(), 30));
        assert_eq!(period_days(Some("90d")), ("90d".to_string(), 90));
        assert_eq!(period_days(Some("1y")), ("7d".to_string(), 7));
        assert_eq!(period_days(None), ("7d".to_string(), 7));
    }

    #[tokio::test]
    async fn overview_counts_real_usage() {
        let pool = setup_pool().await;
        let agent = crate::agents::tests::draft("Vendedor", "vendedor").into_agent();
        SqlAgentRepository::new(pool.clone()).insert(&agent).await.expect("insert agent");

        let chat = service(
            pool.clone(),
            Arc::new(ScriptedLlm { reply: "olá!".to_string(), input_tokens: 10, output_tokens: 5 }),
        );
        chat.send_message(&agent, "user-1", Channel::Web, Uuid::new_v4(), "oi")
            .await
            .expect("exchange one");
        chat.send_message(&agent, "user-2", Channel::Whatsapp, Uuid::new_v4(), "oi")
            .await
            .expect("exchange two");

        let state = AnalyticsState { pool: pool.clone() };
        let Json(report) =
            overview(State(state), Query(OverviewQuery { period: Some("30d".to_string()) }))
                .await
                .expect("overview");

        assert_eq!(report.period, "30d");
        assert_eq!(report.total_agents, 1);
        assert_eq!(report.active_agents, 1);
        assert_eq!(report.total_conversations, 2);
        assert_eq!(report.active_conversations, 2);
        assert_eq!(report.total_messages, 4);
        assert!(report.total_cost > 0.0);
        assert_eq!(report.channel_distribution.web, 1);
        assert_eq!(report.channel_distribution.whatsapp, 1);
        assert_eq!(report.channel_distribution.email, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn agent_detail_scopes_metrics_to_that_agent() {
        let pool = setup_pool().await;
        let busy = crate::agents::tests::draft("Vendedor", "vendedor").into_agent();
        let idle = crate::agents::tests::draft("Suporte", "suporte").into_agent();
        let repo = SqlAgentRepository::new(pool.clone());
        repo.insert(&busy).await.expect("insert busy agent");
        repo.insert(&idle).await.expect("insert idle agent");

        let chat = service(
            pool.clone(),
            Arc::new(ScriptedLlm { reply: "olá!".to_string(), input_tokens: 10, output_tokens: 5 }),
        );
        chat.send_message(&busy, "user-1", Channel::Web, Uuid::new_v4(), "oi")
            .await
            .expect("exchange");

        let state = AnalyticsState { pool: pool.clone() };
        let Json(report) = agent_detail(
            State(state.clone()),
            Path(busy.id),
            Query(OverviewQuery { period: None }),
        )
        .await
        .expect("busy agent report");

        assert_eq!(report.agent.slug, "vendedor");
        assert_eq!(report.period, "7d");
        assert_eq!(report.total_conversations, 1);
        assert_eq!(report.total_messages, 2);
        assert!(report.total_cost > 0.0);
        assert!(report.avg_response_time >= 0.0);
        assert_eq!(report.channel_breakdown.web, 1);

        let Json(quiet) = agent_detail(
            State(state.clone()),
            Path(idle.id),
            Query(OverviewQuery { period: None }),
        )
        .await
        .expect("idle agent report");
        assert_eq!(quiet.total_conversations, 0);
        assert_eq!(quiet.total_messages, 0);
        assert_eq!(quiet.total_cost, 0.0);

        pool.close().await;
    }

    #[tokio::test]
    async fn agent_detail_for_unknown_agent_is_not_found() {
        let pool = setup_pool().await;
        let state = AnalyticsState { pool: pool.clone() };

        let (status, _) =
            agent_detail(State(state), Path(Uuid::new_v4()), Query(OverviewQuery { period: None }))
                .await
                .err()
                .expect("expected not found");
        assert_eq!(status, StatusCode::NOT_FOUND);

        pool.close().await;
    }
}
