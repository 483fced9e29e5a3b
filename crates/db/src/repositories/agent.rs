use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use parley_core::Agent;

use super::{parse_timestamp, parse_uuid, RepositoryError};
use crate::DbPool;

const AGENT_COLUMNS: &str = "id, name, slug, description, avatar_url, system_prompt, model, \
     temperature, max_tokens, top_p, frequency_penalty, presence_penalty, \
     rag_enabled, whatsapp_enabled, whatsapp_number, email_enabled, email_address, web_enabled, \
     is_active, allow_public_access, brand_color, welcome_message, input_placeholder, \
     meta_title, meta_description, og_image_url, created_at, updated_at, deleted_at";

/// Data access for agents. Reads exclude soft-deleted rows; deletion only
/// ever stamps `deleted_at`.
pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, slug, description, avatar_url, system_prompt, model,
                temperature, max_tokens, top_p, frequency_penalty, presence_penalty,
                rag_enabled, whatsapp_enabled, whatsapp_number, email_enabled, email_address, web_enabled,
                is_active, allow_public_access, brand_color, welcome_message, input_placeholder,
                meta_title, meta_description, og_image_url, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.slug)
        .bind(&agent.description)
        .bind(&agent.avatar_url)
        .bind(&agent.system_prompt)
        .bind(&agent.model)
        .bind(agent.temperature)
        .bind(agent.max_tokens)
        .bind(agent.top_p)
        .bind(agent.frequency_penalty)
        .bind(agent.presence_penalty)
        .bind(agent.rag_enabled)
        .bind(agent.whatsapp_enabled)
        .bind(&agent.whatsapp_number)
        .bind(agent.email_enabled)
        .bind(&agent.email_address)
        .bind(agent.web_enabled)
        .bind(agent.is_active)
        .bind(agent.allow_public_access)
        .bind(&agent.brand_color)
        .bind(&agent.welcome_message)
        .bind(&agent.input_placeholder)
        .bind(&agent.meta_title)
        .bind(&agent.meta_description)
        .bind(&agent.og_image_url)
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.deleted_at.map(|ts| ts.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| agent_from_row(&r)).transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE slug = ? AND deleted_at IS NULL"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| agent_from_row(&r)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE deleted_at IS NULL ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(agent_from_row).collect()
    }

    /// Slugs currently in use by live agents; the input to unique-slug
    /// generation.
    pub async fn live_slugs(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT slug FROM agents WHERE deleted_at IS NULL")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| row.try_get::<String, _>("slug").map_err(Into::into)).collect()
    }

    /// Full-row update. Returns false when the agent does not exist (or was
    /// soft-deleted in the meantime).
    pub async fn update(&self, agent: &Agent) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE agents SET
                name = ?, slug = ?, description = ?, avatar_url = ?, system_prompt = ?, model = ?,
                temperature = ?, max_tokens = ?, top_p = ?, frequency_penalty = ?, presence_penalty = ?,
                rag_enabled = ?, whatsapp_enabled = ?, whatsapp_number = ?,
                email_enabled = ?, email_address = ?, web_enabled = ?,
                is_active = ?, allow_public_access = ?,
                brand_color = ?, welcome_message = ?, input_placeholder = ?,
                meta_title = ?, meta_description = ?, og_image_url = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&agent.name)
        .bind(&agent.slug)
        .bind(&agent.description)
        .bind(&agent.avatar_url)
        .bind(&agent.system_prompt)
        .bind(&agent.model)
        .bind(agent.temperature)
        .bind(agent.max_tokens)
        .bind(agent.top_p)
        .bind(agent.frequency_penalty)
        .bind(agent.presence_penalty)
        .bind(agent.rag_enabled)
        .bind(agent.whatsapp_enabled)
        .bind(&agent.whatsapp_number)
        .bind(agent.email_enabled)
        .bind(&agent.email_address)
        .bind(agent.web_enabled)
        .bind(agent.is_active)
        .bind(agent.allow_public_access)
        .bind(&agent.brand_color)
        .bind(&agent.welcome_message)
        .bind(&agent.input_placeholder)
        .bind(&agent.meta_title)
        .bind(&agent.meta_description)
        .bind(&agent.og_image_url)
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp `deleted_at` and deactivate. Returns false when there was no
    /// live row to delete.
    pub async fn soft_delete(
        &self,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE agents SET deleted_at = ?, is_active = 0, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(deleted_at.to_rfc3339())
        .bind(deleted_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn agent_from_row(row: &SqliteRow) -> Result<Agent, RepositoryError> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let deleted_at: Option<String> = row.try_get("deleted_at")?;

    Ok(Agent {
        id: parse_uuid("id", id)?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        avatar_url: row.try_get("avatar_url")?,
        system_prompt: row.try_get("system_prompt")?,
        model: row.try_get("model")?,
        temperature: row.try_get("temperature")?,
        max_tokens: row.try_get("max_tokens")?,
        top_p: row.try_get("top_p")?,
        frequency_penalty: row.try_get("frequency_penalty")?,
        presence_penalty: row.try_get("presence_penalty")?,
        rag_enabled: row.try_get("rag_enabled")?,
        whatsapp_enabled: row.try_get("whatsapp_enabled")?,
        whatsapp_number: row.try_get("whatsapp_number")?,
        email_enabled: row.try_get("email_enabled")?,
        email_address: row.try_get("email_address")?,
        web_enabled: row.try_get("web_enabled")?,
        is_active: row.try_get("is_active")?,
        allow_public_access: row.try_get("allow_public_access")?,
        brand_color: row.try_get("brand_color")?,
        welcome_message: row.try_get("welcome_message")?,
        input_placeholder: row.try_get("input_placeholder")?,
        meta_title: row.try_get("meta_title")?,
        meta_description: row.try_get("meta_description")?,
        og_image_url: row.try_get("og_image_url")?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
        deleted_at: deleted_at.map(|ts| parse_timestamp("deleted_at", ts)).transpose()?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use parley_core::domain::agent::DEFAULT_MODEL;
    use parley_core::{AgentDraft, AgentPatch};

    use super::SqlAgentRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    pub(crate) fn draft(name: &str, slug: &str) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            slug: slug.to_string(),
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

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlAgentRepository::new(pool.clone());

        let agent = draft("Vendedor DUX", "vendedor-dux").into_agent();
        repo.insert(&agent).await.expect("insert");

        let by_id = repo.find_by_id(agent.id).await.expect("find by id");
        assert_eq!(by_id.as_ref().map(|a| a.slug.as_str()), Some("vendedor-dux"));

        let by_slug = repo.find_by_slug("vendedor-dux").await.expect("find by slug");
        assert_eq!(by_slug.map(|a| a.id), Some(agent.id));

        pool.close().await;
    }

    #[tokio::test]
    async fn soft_deleted_agents_disappear_from_reads() {
        let pool = setup_pool().await;
        let repo = SqlAgentRepository::new(pool.clone());

        let agent = draft("Suporte", "suporte-bot").into_agent();
        repo.insert(&agent).await.expect("insert");

        let deleted = repo.soft_delete(agent.id, chrono::Utc::now()).await.expect("soft delete");
        assert!(deleted);

        assert!(repo.find_by_id(agent.id).await.expect("find by id").is_none());
        assert!(repo.find_by_slug("suporte-bot").await.expect("find by slug").is_none());
        assert!(repo.list().await.expect("list").is_empty());
        assert!(repo.live_slugs().await.expect("slugs").is_empty());

        // Deleting twice is a no-op, not an error.
        let again = repo.soft_delete(agent.id, chrono::Utc::now()).await.expect("soft delete");
        assert!(!again);

        pool.close().await;
    }

    #[tokio::test]
    async fn update_persists_patched_fields() {
        let pool = setup_pool().await;
        let repo = SqlAgentRepository::new(pool.clone());

        let mut agent = draft("Vendedor", "vendedor").into_agent();
        repo.insert(&agent).await.expect("insert");

        agent.apply(AgentPatch {
            name: Some("Vendedor v2".to_string()),
            temperature: Some(0.1),
            is_active: Some(false),
            ..AgentPatch::default()
        });
        let updated = repo.update(&agent).await.expect("update");
        assert!(updated);

        let fetched = repo.find_by_id(agent.id).await.expect("find").expect("exists");
        assert_eq!(fetched.name, "Vendedor v2");
        assert_eq!(fetched.temperature, 0.1);
        assert!(!fetched.is_active);
        assert!(!fetched.is_available());

        pool.close().await;
    }

    #[tokio::test]
    async fn live_slugs_feed_unique_generation() {
        let pool = setup_pool().await;
        let repo = SqlAgentRepository::new(pool.clone());

        repo.insert(&draft("A", "vendedor-dux").into_agent()).await.expect("insert a");
        repo.insert(&draft("B", "vendedor-dux-1").into_agent()).await.expect("insert b");

        let slugs = repo.live_slugs().await.expect("slugs");
        let next = parley_core::slug::generate_unique("vendedor-dux", &slugs);
        assert_eq!(next, "vendedor-dux-2");

        pool.close().await;
    }
}
