use async_trait::async_trait;

use parley_core::ServiceError;
use uuid::Uuid;

/// Supplies knowledge-base context for an agent's prompt. Wired into the
/// conversation service so a vector-search implementation can slot in without
/// touching the chat flow.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns context text for the query, or `None` when nothing relevant
    /// is indexed.
    async fn retrieve(&self, agent_id: Uuid, query: &str) -> Result<Option<String>, ServiceError>;
}

/// Placeholder retriever: documents are stored but not yet indexed, so every
/// lookup comes back empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRetrieval;

#[async_trait]
impl ContextRetriever for NoopRetrieval {
    async fn retrieve(&self, _agent_id: Uuid, _query: &str) -> Result<Option<String>, ServiceError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{ContextRetriever, NoopRetrieval};

    #[tokio::test]
    async fn noop_retrieval_always_returns_empty() {
        let retriever = NoopRetrieval;
        let context = retriever.retrieve(Uuid::new_v4(), "qual o preço?").await.unwrap();
        assert_eq!(context, None);
    }
}
