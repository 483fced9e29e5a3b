use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] =
        &["agents", "conversations", "messages", "documents", "channel_configs"];

    async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(pool)
        .await
        .expect("query sqlite_master")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 1, "table `{table}` should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 0, "table `{table}` should be dropped");
        }
    }

    #[tokio::test]
    async fn live_slug_index_rejects_duplicates_among_non_deleted() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let insert = "INSERT INTO agents (id, name, slug, system_prompt, created_at, updated_at, deleted_at)
                      VALUES (?, 'A', 'vendedor-dux', 'You are helpful.', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', ?)";

        sqlx::query(insert)
            .bind("a1")
            .bind(Option::<String>::None)
            .execute(&pool)
            .await
            .expect("first live row");

        // Second live row with the same slug must hit the partial index.
        let duplicate = sqlx::query(insert)
            .bind("a2")
            .bind(Option::<String>::None)
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());

        // A soft-deleted row with the same slug is fine.
        sqlx::query(insert)
            .bind("a3")
            .bind(Some("2026-01-02T00:00:00Z".to_string()))
            .execute(&pool)
            .await
            .expect("soft-deleted duplicate slug");
    }
}
