//! Append-only merge history.
//!
//! One row per successfully delivered merge. No update or delete paths
//! exist; retrieval is the most recent K entries for a requester.

use crate::error::{MergeError, Result};
use crate::ids::RequesterId;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Type alias for the history connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// One completed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub requester: RequesterId,
    pub output_name: String,
    pub size_bytes: u64,
    pub segment_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Store for the append-only merge history.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry. Entries are immutable once appended.
    async fn append(&self, entry: &HistoryEntry) -> Result<()>;

    /// The most recent `k` entries for a requester, newest first.
    async fn recent(&self, requester: RequesterId, k: usize) -> Result<Vec<HistoryEntry>>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS merge_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id  INTEGER NOT NULL,
    output_name   TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    segment_count INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_merge_history_requester
    ON merge_history (requester_id, id DESC);
";

/// SQLite-backed history store.
#[derive(Clone)]
pub struct SqliteHistory {
    pool: DbPool,
}

impl SqliteHistory {
    /// Open (creating if needed) a file-backed history database.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(db_path);
        Self::build(manager, 4)
    }

    /// In-memory history store for tests.
    ///
    /// Pool size 1, so every connection sees the same in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::build(SqliteConnectionManager::memory(), 1)
    }

    fn build(manager: SqliteConnectionManager, max_size: u32) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| MergeError::History(format!("failed to create pool: {e}")))?;

        let conn = pool
            .get()
            .map_err(|e| MergeError::History(format!("failed to get connection: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| MergeError::History(format!("failed to create schema: {e}")))?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| MergeError::History(format!("failed to get connection: {e}")))
    }
}

#[async_trait::async_trait]
impl HistoryStore for SqliteHistory {
    async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO merge_history (requester_id, output_name, size_bytes, segment_count, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                entry.requester.0,
                entry.output_name,
                entry.size_bytes as i64,
                entry.segment_count as i64,
                entry.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| MergeError::History(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, requester: RequesterId, k: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT requester_id, output_name, size_bytes, segment_count, created_at
                 FROM merge_history
                 WHERE requester_id = ?
                 ORDER BY id DESC
                 LIMIT ?",
            )
            .map_err(|e| MergeError::History(e.to_string()))?;

        let rows = stmt
            .query_map(params![requester.0, k as i64], |row| {
                Ok(HistoryEntry {
                    requester: RequesterId(row.get(0)?),
                    output_name: row.get(1)?,
                    size_bytes: row.get::<_, i64>(2)? as u64,
                    segment_count: row.get::<_, i64>(3)? as usize,
                    timestamp: DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(|e| MergeError::History(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MergeError::History(e.to_string()))
    }
}
