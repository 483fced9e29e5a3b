use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use parley_core::{Channel, Conversation, ConversationStatus};

use super::{parse_timestamp, parse_uuid, RepositoryError};
use crate::DbPool;

const CONVERSATION_COLUMNS: &str =
    "id, agent_id, user_identifier, session_id, channel, status, created_at, updated_at";

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Return the active conversation for (agent, user, channel), creating it
    /// with the caller's session id if none exists. The stored `session_id`
    /// is what clients hold and replay, so it is never minted here.
    ///
    /// The insert races safely: `ON CONFLICT .. DO NOTHING` against the
    /// partial unique index means two concurrent callers both end up reading
    /// the same winning row.
    pub async fn find_or_create_active(
        &self,
        agent_id: Uuid,
        user_identifier: &str,
        channel: Channel,
        session_id: Uuid,
    ) -> Result<Conversation, RepositoryError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO conversations (id, agent_id, user_identifier, session_id, channel, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'active', ?, ?)
            ON CONFLICT (agent_id, user_identifier, channel) WHERE status = 'active' DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(agent_id.to_string())
        .bind(user_identifier)
        .bind(session_id.to_string())
        .bind(channel.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE agent_id = ? AND user_identifier = ? AND channel = ? AND status = 'active'"
        ))
        .bind(agent_id.to_string())
        .bind(user_identifier)
        .bind(channel.as_str())
        .fetch_one(&self.pool)
        .await?;

        conversation_from_row(&row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| conversation_from_row(&r)).transpose()
    }

    /// Resolve the conversation a client session belongs to. Backs the public
    /// history endpoint, where the widget only knows its session id.
    pub async fn find_by_session(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE agent_id = ? AND session_id = ?"
        ))
        .bind(agent_id.to_string())
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| conversation_from_row(&r)).transpose()
    }
}

/// Bump `updated_at`; called inside the chat transaction after a successful
/// exchange.
pub async fn touch<'e, E>(
    executor: E,
    id: Uuid,
    updated_at: DateTime<Utc>,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(executor)
        .await?;

    Ok(())
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: String = row.try_get("id")?;
    let agent_id: String = row.try_get("agent_id")?;
    let session_id: String = row.try_get("session_id")?;
    let channel: String = row.try_get("channel")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Conversation {
        id: parse_uuid("id", id)?,
        agent_id: parse_uuid("agent_id", agent_id)?,
        user_identifier: row.try_get("user_identifier")?,
        session_id: parse_uuid("session_id", session_id)?,
        channel: Channel::parse(&channel)
            .map_err(|_| RepositoryError::Decode(format!("invalid channel: {channel}")))?,
        status: ConversationStatus::parse(&status)
            .map_err(|_| RepositoryError::Decode(format!("invalid status: {status}")))?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}
