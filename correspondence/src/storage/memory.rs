//! In-memory key-value store
//!
//! Behaves like browser local storage: process-local, with an optional byte
//! quota counted over keys and values.

use super::{check_quota, KeyValueStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store, mainly for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses writes past `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(quota),
        }
    }

    /// Bytes currently used, counted the same way as the quota
    pub async fn used_bytes(&self) -> usize {
        let entries = self.entries.read().await;
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write().await;

        let used_elsewhere: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_quota(self.quota, used_elsewhere, key, value.len())?;

        tracing::debug!("Set {} ({} bytes)", key, value.len());
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
