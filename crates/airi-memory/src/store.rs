//! Backing stores for session memory.
//!
//! A store is a plain key-value map of serialized turn lists. Expiry is
//! absolute and reset on every write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::db::Database;
use crate::error::{MemoryError, Result};

/// Keyed storage for serialized session histories.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// The stored value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value. `ttl` is measured from now; stores without expiry
    /// ignore it.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove the value. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}

// =============================================================================
// In-process map
// =============================================================================

/// Process-local store for development. Contents are lost on restart and
/// never expire.
#[derive(Debug, Default)]
pub struct InProcessStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> MemoryError {
        MemoryError::Storage(format!("Memory map lock poisoned: {}", e))
    }
}

#[async_trait]
impl TurnStore for InProcessStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(Self::lock_error)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(Self::lock_error)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(Self::lock_error)?;
        entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_process"
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Durable store backed by SQLite. Entries expire `ttl` after their last
/// write; expired rows are invisible to reads and removed by
/// [`SqliteStore::purge_expired`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Delete every expired row. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = now_millis();
        let removed = self
            .blocking(move |db| {
                db.with_conn(|conn| {
                    Ok(conn.execute(
                        "DELETE FROM session_memory WHERE expires_at <= ?1",
                        params![now],
                    )?)
                })
            })
            .await?;
        if removed > 0 {
            debug!(removed, "Purged expired session memory");
        }
        Ok(removed)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| MemoryError::Storage(format!("Blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl TurnStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let now = now_millis();
        self.blocking(move |db| {
            db.with_conn(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM session_memory WHERE key = ?1 AND expires_at > ?2",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let key = key.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);
        self.blocking(move |db| {
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO session_memory (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at = excluded.expires_at",
                    params![key, value, expires_at],
                )?;
                Ok(())
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |db| {
            db.with_conn(|conn| {
                conn.execute("DELETE FROM session_memory WHERE key = ?1", params![key])?;
                Ok(())
            })
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn sqlite() -> SqliteStore {
        SqliteStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_in_process_set_get_delete() {
        let store = InProcessStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1".to_string(), HOUR).await.unwrap();
        store.set("k", "v2".to_string(), HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.name(), "in_process");
    }

    #[tokio::test]
    async fn test_sqlite_set_get_delete() {
        let store = sqlite();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1".to_string(), HOUR).await.unwrap();
        store.set("k", "v2".to_string(), HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        store.delete("k").await.unwrap();
        store.delete("missing").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.name(), "sqlite");
    }

    #[tokio::test]
    async fn test_sqlite_expired_entries_are_invisible() {
        let store = sqlite();
        store.set("old", "v".to_string(), Duration::ZERO).await.unwrap();
        store.set("fresh", "v".to_string(), HOUR).await.unwrap();
        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("v"));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_write_resets_expiry() {
        let store = sqlite();
        store.set("k", "v1".to_string(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v2".to_string(), HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");

        let store = SqliteStore::new(Arc::new(Database::new(&path).unwrap()));
        store.set("k", "persisted".to_string(), HOUR).await.unwrap();
        drop(store);

        let reopened = SqliteStore::new(Arc::new(Database::new(&path).unwrap()));
        assert_eq!(
            reopened.get("k").await.unwrap().as_deref(),
            Some("persisted")
        );
    }
}
