use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::info;

use parley_agent::{LlmClient, LlmError, NoopRetrieval, OpenAiClient, PriceTable};
use parley_core::config::{AppConfig, ConfigError, LoadOptions};
use parley_db::{connect_with_settings, migrations, DbPool};

use crate::chat::{ChatService, ChatState};
use crate::{agents, analytics, chat, conversations, health, public};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chat: ChatService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client construction failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let llm: Arc<dyn LlmClient> =
        Arc::new(OpenAiClient::new(&config.llm).map_err(BootstrapError::Llm)?);
    let chat = ChatService::new(
        db_pool.clone(),
        llm,
        PriceTable::from_config(&config.pricing),
        Arc::new(NoopRetrieval),
        config.chat.history_limit,
    );

    Ok(Application { config, db_pool, chat })
}

/// Assemble the full HTTP surface. The widget is served cross-origin from
/// customer sites, so CORS stays permissive.
pub fn build_router(app: &Application) -> Router {
    let chat_state = ChatState { pool: app.db_pool.clone(), chat: app.chat.clone() };

    Router::new()
        .merge(health::router(app.db_pool.clone()))
        .merge(agents::router(agents::AgentsState {
            pool: app.db_pool.clone(),
            public_base_url: app.config.server.public_base_url.clone(),
        }))
        .merge(chat::router(chat_state.clone()))
        .merge(public::router(chat_state))
        .merge(conversations::router(conversations::ConversationsState {
            pool: app.db_pool.clone(),
        }))
        .merge(analytics::router(analytics::AnalyticsState { pool: app.db_pool.clone() }))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use parley_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, build_router};

    fn test_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: Some("sk-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_migrates_and_serves_health() {
        let app = bootstrap(test_options()).await.expect("bootstrap");
        let router = build_router(&app);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn agents_list_starts_empty() {
        let app = bootstrap(test_options()).await.expect("bootstrap");
        let router = build_router(&app);

        let response = router
            .oneshot(Request::builder().uri("/api/agents").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}
