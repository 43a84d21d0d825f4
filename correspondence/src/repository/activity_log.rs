//! Activity log
//!
//! Best-effort audit trail, newest first, bounded to the most recent
//! entries. Recording an entry never fails the operation it accompanies.

use crate::config::{LOGS_KEY, LOG_CAPACITY};
use crate::error::Result;
use crate::models::{Log, LogAction};
use crate::storage::{load_json, save_json, SharedStore};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Bounded, append-only activity history
#[derive(Clone)]
pub struct ActivityLog {
    store: SharedStore,
    capacity: usize,
    lock: Arc<Mutex<()>>,
}

impl ActivityLog {
    pub fn new(store: SharedStore) -> Self {
        Self::with_capacity(store, LOG_CAPACITY)
    }

    pub fn with_capacity(store: SharedStore, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record an entry. Failures are logged and swallowed.
    pub async fn append(
        &self,
        user_id: &str,
        user_name: &str,
        action: LogAction,
        details: impl Into<String>,
    ) {
        let entry = Log::new(user_id, user_name, action, details);

        if let Err(e) = self.try_append(entry).await {
            tracing::warn!("Could not record {} activity: {}", action, e);
        }
    }

    async fn try_append(&self, entry: Log) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut logs: Vec<Log> = load_json(self.store.as_ref(), LOGS_KEY)
            .await?
            .unwrap_or_default();

        logs.insert(0, entry);
        logs.truncate(self.capacity);

        save_json(self.store.as_ref(), LOGS_KEY, &logs).await
    }

    /// All retained entries, newest first
    pub async fn entries(&self) -> Result<Vec<Log>> {
        Ok(load_json(self.store.as_ref(), LOGS_KEY)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn create_test_log() -> ActivityLog {
        ActivityLog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_newest_first() {
        let log = create_test_log();

        log.append("1", "Alice", LogAction::Login, "first").await;
        log.append("2", "Bob", LogAction::Login, "second").await;

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].details, "second");
        assert_eq!(entries[1].details, "first");
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let log = create_test_log();

        for i in 0..(LOG_CAPACITY + 25) {
            log.append("1", "Alice", LogAction::Login, format!("entry {}", i))
                .await;
        }

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), LOG_CAPACITY);
        assert_eq!(entries[0].details, format!("entry {}", LOG_CAPACITY + 24));
        assert_eq!(entries[LOG_CAPACITY - 1].details, "entry 25");
    }

    #[tokio::test]
    async fn test_never_exceeds_small_capacity() {
        let log = ActivityLog::with_capacity(Arc::new(MemoryStore::new()), 3);

        for i in 0..10 {
            log.append("1", "Alice", LogAction::SignLetter, i.to_string())
                .await;
            assert!(log.entries().await.unwrap().len() <= 3);
        }

        let details: Vec<String> = log
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.details)
            .collect();
        assert_eq!(details, vec!["9", "8", "7"]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let log = ActivityLog::new(store.clone());

        // Does not panic or return an error
        log.append("1", "Alice", LogAction::Login, "too large to fit")
            .await;

        assert!(store.get(LOGS_KEY).await.unwrap().is_none());
        assert!(log.entries().await.unwrap().is_empty());
    }
}
