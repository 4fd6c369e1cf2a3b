use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::{
    Error, FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS image_generations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt TEXT NOT NULL,
    image_url TEXT NOT NULL,
    image_path TEXT NOT NULL,
    timestamp TEXT NOT NULL
)";

/// One persisted, successful generation. Rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct GenerationRecord {
    pub id: i64,
    pub prompt: String,
    pub image_url: String,
    pub image_path: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct NewGenerationRecord {
    pub prompt: String,
    pub image_url: String,
    pub image_path: String,
}

#[derive(Clone)]
pub struct GenerationStore {
    pool: SqlitePool,
}

impl GenerationStore {
    pub async fn connect(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!(path = %path.display(), "Generation store ready");
        Ok(Self { pool })
    }

    /// Inserts one record inside its own transaction.
    pub async fn insert(&self, record: NewGenerationRecord) -> Result<GenerationRecord, Error> {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO image_generations (prompt, image_url, image_path, timestamp) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.prompt)
        .bind(&record.image_url)
        .bind(&record.image_path)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        tx.commit().await?;

        Ok(GenerationRecord {
            id,
            prompt: record.prompt,
            image_url: record.image_url,
            image_path: record.image_path,
            timestamp,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<GenerationRecord>, Error> {
        sqlx::query_as::<_, GenerationRecord>(
            "SELECT id, prompt, image_url, image_path, timestamp FROM image_generations \
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<GenerationRecord>, Error> {
        sqlx::query_as::<_, GenerationRecord>(
            "SELECT id, prompt, image_url, image_path, timestamp FROM image_generations \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM image_generations")
            .fetch_one(&self.pool)
            .await
    }
}
