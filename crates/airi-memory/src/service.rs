//! Best-effort, bounded conversation history per session.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use airi_core::config::MemoryConfig;
use airi_core::ConversationTurn;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{MemoryError, Result};
use crate::store::{InProcessStore, SqliteStore, TurnStore};

/// Prefix of every session key in the backing store.
pub const KEY_PREFIX: &str = "airi:mem:";

/// Per-session turn history over a pluggable [`TurnStore`].
///
/// Store failures and timeouts never reach the caller: reads degrade to an
/// empty history and writes are dropped with a warning. Concurrent appends
/// to one session are last-writer-wins.
#[derive(Clone)]
pub struct SessionMemory {
    store: Arc<dyn TurnStore>,
    /// Kept separately so expired rows can be purged.
    sqlite: Option<SqliteStore>,
    max_turns: usize,
    max_stored_turns: usize,
    ttl: Duration,
    timeout: Duration,
}

impl SessionMemory {
    pub fn new(store: Arc<dyn TurnStore>, config: &MemoryConfig) -> Self {
        Self {
            store,
            sqlite: None,
            max_turns: config.max_turns,
            max_stored_turns: config.max_stored_turns(),
            ttl: config.ttl(),
            timeout: config.store_timeout(),
        }
    }

    /// Select the backend once: SQLite when `persistent`, otherwise an
    /// in-process map.
    pub fn from_config(config: &MemoryConfig) -> Result<Self> {
        if config.persistent {
            let db = Database::new(Path::new(&config.sqlite_path))?;
            let sqlite = SqliteStore::new(Arc::new(db));
            let mut memory = Self::new(Arc::new(sqlite.clone()), config);
            memory.sqlite = Some(sqlite);
            info!(path = %config.sqlite_path, ttl_secs = config.ttl_secs, "Session memory: sqlite");
            Ok(memory)
        } else {
            info!("Session memory: in-process (not persisted)");
            Ok(Self::new(Arc::new(InProcessStore::new()), config))
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Chronological turns for `session_id`. Empty for a blank id, an
    /// unknown or expired session, or any store failure.
    pub async fn get_history(&self, session_id: &str) -> Vec<ConversationTurn> {
        if session_id.is_empty() {
            return Vec::new();
        }
        match self.load(&session_key(session_id)).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(session_id, error = %e, "Memory read failed; using empty history");
                Vec::new()
            }
        }
    }

    /// Record one exchange, keeping at most `2 * max_turns` turns.
    pub async fn append(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        if session_id.is_empty() {
            return;
        }
        let key = session_key(session_id);
        let outcome = async {
            let mut turns = match self.load(&key).await {
                Ok(turns) => turns,
                // An undecodable value is replaced rather than blocking the session.
                Err(MemoryError::Serialization(e)) => {
                    warn!(session_id, error = %e, "Stored history unreadable; starting fresh");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            turns.push(ConversationTurn::user(user_text));
            turns.push(ConversationTurn::assistant(assistant_text));
            let limit = self.max_stored_turns;
            if turns.len() > limit {
                turns.drain(..turns.len() - limit);
            }
            let value = serde_json::to_string(&turns)?;
            self.bounded(self.store.set(&key, value, self.ttl)).await?;
            Ok::<usize, MemoryError>(turns.len())
        }
        .await;

        match outcome {
            Ok(stored) => debug!(session_id, stored, "Memory appended"),
            Err(e) => warn!(session_id, error = %e, "Memory write dropped"),
        }
    }

    /// Forget a session. Always succeeds from the caller's view.
    pub async fn clear(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        if let Err(e) = self.bounded(self.store.delete(&session_key(session_id))).await {
            warn!(session_id, error = %e, "Memory clear failed");
        }
    }

    /// Remove expired rows from the durable store. No-op for the
    /// in-process map.
    pub async fn purge_expired(&self) -> usize {
        let Some(sqlite) = &self.sqlite else {
            return 0;
        };
        match self.bounded(sqlite.purge_expired()).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Memory purge failed");
                0
            }
        }
    }

    async fn load(&self, key: &str) -> Result<Vec<ConversationTurn>> {
        match self.bounded(self.store.get(key)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(MemoryError::Timeout(self.timeout)))
    }
}

impl std::fmt::Debug for SessionMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMemory")
            .field("backend", &self.store.name())
            .field("max_turns", &self.max_turns)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airi_core::Role;
    use async_trait::async_trait;

    fn config(max_turns: usize) -> MemoryConfig {
        MemoryConfig {
            max_turns,
            ..MemoryConfig::default()
        }
    }

    fn in_process(max_turns: usize) -> SessionMemory {
        SessionMemory::new(Arc::new(InProcessStore::new()), &config(max_turns))
    }

    /// Fails every call.
    struct BrokenStore;

    #[async_trait]
    impl TurnStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(MemoryError::Storage("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            Err(MemoryError::Storage("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(MemoryError::Storage("connection refused".into()))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    /// Never answers within any reasonable timeout.
    struct HungStore;

    #[async_trait]
    impl TurnStore for HungStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        fn name(&self) -> &'static str {
            "hung"
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back_in_order() {
        let memory = in_process(10);
        memory.append("s1", "hello", "{\"intent\":\"llm_response\"}").await;
        memory.append("s1", "open spotify", "{\"intent\":\"open_app\"}").await;

        let history = memory.get_history("s1").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ConversationTurn::user("hello"));
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].content, "open spotify");
    }

    #[tokio::test]
    async fn test_history_is_bounded_oldest_first() {
        let memory = in_process(3);
        for i in 0..7 {
            memory.append("s", &format!("q{}", i), &format!("a{}", i)).await;
        }
        let history = memory.get_history("s").await;
        assert_eq!(history.len(), 6);
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q4", "a4", "q5", "a5", "q6", "a6"]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let memory = in_process(10);
        memory.append("a", "only in a", "ok").await;
        assert!(memory.get_history("b").await.is_empty());
        assert_eq!(memory.get_history("a").await.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_session_is_noop() {
        let memory = in_process(10);
        memory.append("", "hello", "hi").await;
        assert!(memory.get_history("").await.is_empty());
        memory.clear("").await;
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let memory = in_process(10);
        memory.append("s", "hello", "hi").await;
        memory.clear("s").await;
        memory.clear("s").await;
        memory.clear("never-seen").await;
        assert!(memory.get_history("s").await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_value_reads_empty_and_is_overwritten() {
        let store = Arc::new(InProcessStore::new());
        store
            .set("airi:mem:s", "not json".to_string(), Duration::ZERO)
            .await
            .unwrap();
        let memory = SessionMemory::new(store.clone(), &config(10));

        assert!(memory.get_history("s").await.is_empty());
        memory.append("s", "hello", "hi").await;
        memory.append("s", "and now?", "still here").await;

        let history = memory.get_history("s").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[3].content, "still here");
        let raw = store.get("airi:mem:s").await.unwrap().unwrap();
        assert_ne!(raw, "not json");
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let memory = SessionMemory::new(Arc::new(BrokenStore), &config(10));
        assert!(memory.get_history("s").await.is_empty());
        memory.append("s", "hello", "hi").await;
        memory.clear("s").await;
        assert_eq!(memory.backend(), "broken");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_store_is_bounded_by_timeout() {
        let memory = SessionMemory::new(Arc::new(HungStore), &config(10));
        assert!(memory.get_history("s").await.is_empty());
        memory.append("s", "hello", "hi").await;
        memory.clear("s").await;
    }

    #[tokio::test]
    async fn test_sqlite_backend_expires_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(10);
        cfg.persistent = true;
        cfg.sqlite_path = dir.path().join("mem.db").display().to_string();
        cfg.ttl_secs = 0;

        let memory = SessionMemory::from_config(&cfg).unwrap();
        assert_eq!(memory.backend(), "sqlite");
        memory.append("s", "hello", "hi").await;
        assert!(memory.get_history("s").await.is_empty());
        assert_eq!(memory.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn test_sqlite_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(10);
        cfg.persistent = true;
        cfg.sqlite_path = dir.path().join("mem.db").display().to_string();

        let memory = SessionMemory::from_config(&cfg).unwrap();
        memory.append("s", "hello", "hi").await;
        drop(memory);

        let reopened = SessionMemory::from_config(&cfg).unwrap();
        let history = reopened.get_history("s").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ConversationTurn::assistant("hi"));
    }

    #[tokio::test]
    async fn test_in_process_purge_is_noop() {
        let memory = SessionMemory::from_config(&config(10)).unwrap();
        assert_eq!(memory.backend(), "in_process");
        assert_eq!(memory.purge_expired().await, 0);
    }
}
