//! SQLite shared cache
//!
//! File-backed cache. Every process that opens the same database file sees
//! the same entries, which makes it usable for cross-process suspension
//! tracking. Each `set` is a single UPSERT statement, so writes are atomic
//! per key; there is no multi-statement read-modify-write protection.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::SharedCache;
use crate::Result;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening SQLite shared cache at {}", path.display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory cache (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl SharedCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_roundtrip() {
        let cache = SqliteCache::in_memory().unwrap();
        assert_eq!(cache.get("suspended_models").unwrap(), None);

        cache.set("suspended_models", "[1]").unwrap();
        cache.set("suspended_models", "[1,2]").unwrap();
        assert_eq!(
            cache.get("suspended_models").unwrap().as_deref(),
            Some("[1,2]")
        );

        assert!(cache.delete("suspended_models").unwrap());
        assert_eq!(cache.get("suspended_models").unwrap(), None);
    }

    #[test]
    fn test_two_connections_share_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        let writer = SqliteCache::open(&path).unwrap();
        let reader = SqliteCache::open(&path).unwrap();

        writer.set("suspended_models", "[]").unwrap();
        assert_eq!(reader.get("suspended_models").unwrap().as_deref(), Some("[]"));

        reader.delete("suspended_models").unwrap();
        assert_eq!(writer.get("suspended_models").unwrap(), None);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.set("k", "persisted").unwrap();
        }

        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("persisted"));
    }
}
