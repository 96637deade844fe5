//! Exchange journal backed by SQLite
//!
//! Records each chat exchange served by the HTTP API so fallback replies can
//! be told apart from real ones after the fact.

use crate::bootstrap::{DatastoreConnector, Established};
use crate::resilience::{CallError, FailureReason};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row as _;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS exchanges (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    message TEXT NOT NULL,
    reply TEXT NOT NULL,
    is_fallback BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
";

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid timestamp in row {id}: {value}")]
    InvalidTimestamp { id: String, value: String },
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for CallError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(sqlx::Error::PoolTimedOut) => {
                CallError::new(FailureReason::Timeout, "timed out acquiring a connection")
            }
            other => CallError::remote(other.to_string()),
        }
    }
}

/// One question/answer pair served by the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: String,
    pub message: String,
    pub reply: String,
    pub is_fallback: bool,
    pub created_at: DateTime<Utc>,
}

/// Pooled database handle
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at a `sqlite:` URL and apply the schema
    pub async fn connect(url: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn record_exchange(
        &self,
        message: &str,
        reply: &str,
        is_fallback: bool,
    ) -> DbResult<Exchange> {
        let exchange = Exchange {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.to_string(),
            reply: reply.to_string(),
            is_fallback,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO exchanges (id, message, reply, is_fallback, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&exchange.id)
        .bind(&exchange.message)
        .bind(&exchange.reply)
        .bind(exchange.is_fallback)
        .bind(exchange.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(exchange)
    }

    /// Most recent exchanges, newest first
    pub async fn recent_exchanges(&self, limit: u32) -> DbResult<Vec<Exchange>> {
        let rows = sqlx::query(
            "SELECT id, message, reply, is_fallback, created_at FROM exchanges \
             ORDER BY seq DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> DbResult<Exchange> {
                let id: String = row.try_get("id")?;
                let created_at: String = row.try_get("created_at")?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|_| DbError::InvalidTimestamp {
                        id: id.clone(),
                        value: created_at.clone(),
                    })?
                    .with_timezone(&Utc);

                Ok(Exchange {
                    id,
                    message: row.try_get("message")?,
                    reply: row.try_get("reply")?,
                    is_fallback: row.try_get("is_fallback")?,
                    created_at,
                })
            })
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Host identifier for a `sqlite:` URL: the database file name
pub fn database_host(url: &str) -> String {
    let path = url.strip_prefix("sqlite:").unwrap_or(url);
    let path = path.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path == ":memory:" {
        return "memory".to_string();
    }

    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned())
}

/// Production connector for the bootstrapper
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

#[async_trait]
impl DatastoreConnector for SqliteConnector {
    type Handle = Database;

    async fn connect(&self, target: &str) -> Result<Established<Database>, CallError> {
        let handle = Database::connect(target).await?;
        Ok(Established {
            handle,
            host: database_host(target),
        })
    }

    async fn disconnect(&self, handle: Database) {
        handle.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("assistant.db").display());
        let db = Database::connect(&url).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_record_and_list_newest_first() {
        let (_dir, db) = temp_db().await;

        db.record_exchange("Hello", "Greetings.", true).await.unwrap();
        db.record_exchange("What is the weather", "Sunny.", false)
            .await
            .unwrap();

        let exchanges = db.recent_exchanges(10).await.unwrap();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].message, "What is the weather");
        assert!(!exchanges[0].is_fallback);
        assert_eq!(exchanges[1].reply, "Greetings.");
        assert!(exchanges[1].is_fallback);
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let (_dir, db) = temp_db().await;
        for i in 0..5 {
            db.record_exchange(&format!("q{i}"), "a", false).await.unwrap();
        }

        let exchanges = db.recent_exchanges(2).await.unwrap();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].message, "q4");
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("assistant.db").display());

        let first = Database::connect(&url).await.unwrap();
        first.record_exchange("a", "b", false).await.unwrap();
        first.close().await;

        let second = Database::connect(&url).await.unwrap();
        assert_eq!(second.recent_exchanges(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connector_reports_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("assistant.db").display());

        let established = SqliteConnector.connect(&url).await.unwrap();
        assert_eq!(established.host, "assistant.db");
        SqliteConnector.disconnect(established.handle).await;
    }

    #[tokio::test]
    async fn test_connector_fails_for_unreachable_path() {
        let result = SqliteConnector
            .connect("sqlite:///nonexistent-dir/for/sure/assistant.db")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err: CallError = DbError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.reason, FailureReason::Timeout);
    }

    #[test]
    fn test_database_host() {
        assert_eq!(database_host("sqlite://data/assistant.db"), "assistant.db");
        assert_eq!(database_host("sqlite:assistant.db?mode=rwc"), "assistant.db");
        assert_eq!(database_host("sqlite::memory:"), "memory");
    }
}
