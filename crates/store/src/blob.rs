//! SQLite blob store for sealed prompt records.
//!
//! One table, keyed by prompt hash:
//! - `prompts(hash, record, created_at)` where `record` is the sealed
//!   prompt serialized as JSON.
//!
//! The graph file owns topology; this table only holds content.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use threadline_core::error::StoreError;
use threadline_core::prompt::SealedPrompt;
use tracing::{debug, info};

pub struct BlobStore {
    pool: SqlitePool,
}

impl BlobStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Prompt database opened at {}", path.display());
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prompts (
                hash        TEXT PRIMARY KEY NOT NULL,
                record      TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("prompts table: {e}")))?;
        Ok(())
    }

    /// Write a sealed prompt; an existing row with the same hash is replaced.
    pub async fn put(&self, prompt: &SealedPrompt) -> Result<(), StoreError> {
        let record = serde_json::to_string(prompt)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize prompt: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO prompts (hash, record, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(hash) DO UPDATE SET
                record = excluded.record,
                created_at = excluded.created_at
            "#,
        )
        .bind(prompt.hash())
        .bind(&record)
        .bind(prompt.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert failed: {e}")))?;

        debug!(hash = %prompt.hash(), "Stored prompt record");
        Ok(())
    }

    /// Read the record for `hash`, if any.
    ///
    /// A row that no longer parses is reported as `Corrupt`.
    pub async fn get(&self, hash: &str) -> Result<Option<SealedPrompt>, StoreError> {
        let row = sqlx::query("SELECT record FROM prompts WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Select failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record: String = row
            .try_get("record")
            .map_err(|e| StoreError::Storage(format!("Missing record column: {e}")))?;
        let prompt = serde_json::from_str(&record).map_err(|e| StoreError::Corrupt {
            path: format!("prompts.db#{hash}"),
            reason: e.to_string(),
        })?;
        Ok(Some(prompt))
    }

    /// Delete the record for `hash`. Returns whether a row was removed.
    pub async fn delete(&self, hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM prompts WHERE hash = ?1")
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Delete failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM prompts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Count failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::Storage(format!("Count failed: {e}")))?;
        Ok(n as usize)
    }
}
