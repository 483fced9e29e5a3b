use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use parley_core::{Message, MessageRole};

use super::{parse_timestamp, parse_uuid, RepositoryError};
use crate::DbPool;

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, tokens, input_tokens, \
     output_tokens, cost, processing_time, model_used, created_at";

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Every message in the conversation, oldest first.
    pub async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

/// Insert one message. Usable inside the chat transaction via `&mut *tx`.
pub async fn insert<'e, E>(executor: E, message: &Message) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO messages (
            id, conversation_id, role, content, tokens, input_tokens,
            output_tokens, cost, processing_time, model_used, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(message.id.to_string())
    .bind(message.conversation_id.to_string())
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(message.tokens)
    .bind(message.input_tokens)
    .bind(message.output_tokens)
    .bind(message.cost)
    .bind(message.processing_time)
    .bind(&message.model_used)
    .bind(message.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

/// The most recent `limit` messages, returned oldest first so they can feed
/// straight into prompt assembly.
pub async fn recent_history<'e, E>(
    executor: E,
    conversation_id: Uuid,
    limit: u32,
) -> Result<Vec<Message>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE conversation_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?"
    ))
    .bind(conversation_id.to_string())
    .bind(limit)
    .fetch_all(executor)
    .await?;

    let mut messages =
        rows.iter().map(message_from_row).collect::<Result<Vec<_>, RepositoryError>>()?;
    messages.reverse();
    Ok(messages)
}

fn message_from_row(row: &SqliteRow) -> Result<Message, RepositoryError> {
    let id: String = row.try_get("id")?;
    let conversation_id: String = row.try_get("conversation_id")?;
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Message {
        id: parse_uuid("id", id)?,
        conversation_id: parse_uuid("conversation_id", conversation_id)?,
        role: MessageRole::parse(&role)
            .map_err(|_| RepositoryError::Decode(format!("invalid role: {role}")))?,
        content: row.try_get("content")?,
        tokens: row.try_get("tokens")?,
        input_tokens: row.try_get("input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        cost: row.try_get("cost")?,
        processing_time: row.try_get("processing_time")?,
        model_used: row.try_get("model_used")?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use parley_core::{Channel, Message, MessageRole};

    use super::SqlMessageRepository;
    use crate::repositories::{SqlAgentRepository, SqlConversationRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, uuid::Uuid) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let agents = SqlAgentRepository::new(pool.clone());
        let agent = crate::repositories::agent::tests::draft("Vendedor", "vendedor").into_agent();
        agents.insert(&agent).await.expect("insert agent");

        let conversations = SqlConversationRepository::new(pool.clone());
        let conversation = conversations
            .find_or_create_active(agent.id, "user-123", Channel::Web, uuid::Uuid::new_v4())
            .await
            .expect("create conversation");

        (pool, conversation.id)
    }

    #[tokio::test]
    async fn history_returns_the_most_recent_window_in_order() {
        let (pool, conversation_id) = setup().await;

        for n in 0..5 {
            let mut message = Message::user(conversation_id, format!("message {n}"));
            message.created_at = chrono::Utc::now() + chrono::Duration::seconds(n);
            super::insert(&pool, &message).await.expect("insert");
        }

        let window = super::recent_history(&pool, conversation_id, 3).await.expect("history");
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn assistant_metadata_round_trips() {
        let (pool, conversation_id) = setup().await;

        let mut reply = Message::user(conversation_id, "Posso ajudar sim!");
        reply.role = MessageRole::Assistant;
        reply.tokens = Some(69);
        reply.input_tokens = Some(57);
        reply.output_tokens = Some(12);
        reply.cost = Some(0.0000157);
        reply.processing_time = Some(1.42);
        reply.model_used = Some("gpt-4o-mini".to_string());
        super::insert(&pool, &reply).await.expect("insert");

        let repo = SqlMessageRepository::new(pool.clone());
        let all = repo.list_for_conversation(conversation_id).await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].role, MessageRole::Assistant);
        assert_eq!(all[0].input_tokens, Some(57));
        assert_eq!(all[0].model_used.as_deref(), Some("gpt-4o-mini"));

        pool.close().await;
    }

    #[tokio::test]
    async fn same_timestamp_messages_keep_insert_order() {
        let (pool, conversation_id) = setup().await;

        let instant = chrono::Utc::now();
        for content in ["first", "second", "third"] {
            let mut message = Message::user(conversation_id, content);
            message.created_at = instant;
            super::insert(&pool, &message).await.expect("insert");
        }

        let window = super::recent_history(&pool, conversation_id, 2).await.expect("history");
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "third"]);

        pool.close().await;
    }
}
