// store.rs - SQLite response cache
//
// Provides ResponseCache for explorer API bodies with:
// - WAL mode
// - NORMAL synchronous mode
// - Freshness checked against a caller-supplied TTL

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// Default lifetime of a cached explorer response (3 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// ResponseCache stores raw explorer response bodies keyed by request URL
pub struct ResponseCache {
    pub(crate) conn: Connection,
}

impl ResponseCache {
    /// Open (or create) the cache database, initializing the schema if needed
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path).context("Failed to open SQLite database")?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
        .context("Failed to configure database settings")?;

        let schema_sql = include_str!("schema.sql");
        conn.execute_batch(schema_sql)
            .context("Failed to initialize schema")?;

        Ok(ResponseCache { conn })
    }

    /// Get current journal mode (for testing)
    pub fn get_journal_mode(&self) -> Result<String> {
        let mode: String = self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .context("Failed to query journal mode")?;
        Ok(mode)
    }

    /// Cached body for `key` if it is younger than `ttl`
    pub fn get(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        self.get_at(key, ttl, Utc::now().timestamp())
    }

    /// Same as `get` with an explicit "now" in unix seconds
    pub fn get_at(&self, key: &str, ttl: Duration, now: i64) -> Result<Option<String>> {
        let min_fetched_at = now - ttl.as_secs() as i64;
        let body = self
            .conn
            .query_row(
                "SELECT body FROM responses WHERE key = ?1 AND fetched_at >= ?2",
                params![key, min_fetched_at],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read cached response")?;
        Ok(body)
    }

    /// Insert or replace the body for `key`, stamped with the current time
    pub fn put(&self, key: &str, body: &str) -> Result<()> {
        self.put_at(key, body, Utc::now().timestamp())
    }

    pub fn put_at(&self, key: &str, body: &str, fetched_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO responses (key, body, fetched_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at",
                params![key, body, fetched_at],
            )
            .context("Failed to store response")?;
        Ok(())
    }

    /// Delete entries older than `ttl`, returns how many were removed
    pub fn purge_expired(&self, ttl: Duration) -> Result<usize> {
        self.purge_expired_at(ttl, Utc::now().timestamp())
    }

    pub fn purge_expired_at(&self, ttl: Duration, now: i64) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM responses WHERE fetched_at < ?1",
                params![now - ttl.as_secs() as i64],
            )
            .context("Failed to purge expired responses")?;
        Ok(removed)
    }

    /// Number of cached responses
    pub fn len(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))
            .context("Failed to count responses")?;
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
