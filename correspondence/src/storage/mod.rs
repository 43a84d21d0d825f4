//! Storage module
//!
//! Durable key-value storage underneath the repositories. Each collection
//! is one JSON document under one key, rewritten wholesale on every change.
//!
//! Backends must make `set` all-or-nothing: when a write is refused with
//! [`AppError::CapacityExceeded`] the previous value stays readable.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Trait for durable key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// List every key present
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Store handle shared by all repositories
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read and decode the JSON document under `key`
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and write it under `key`
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, bytes).await
}

/// Compute the capacity check shared by the quota-bounded backends.
///
/// `used_elsewhere` is the footprint of every other entry; an entry costs
/// its key length plus its value length.
pub(crate) fn check_quota(
    quota: Option<usize>,
    used_elsewhere: usize,
    key: &str,
    value_len: usize,
) -> Result<()> {
    let Some(quota) = quota else {
        return Ok(());
    };

    let required = key.len() + value_len;
    let available = quota.saturating_sub(used_elsewhere);

    if required > available {
        tracing::warn!(
            "Refusing write to {}: {} bytes required, {} available",
            key,
            required,
            available
        );
        return Err(AppError::CapacityExceeded {
            key: key.to_string(),
            required,
            available,
        });
    }

    Ok(())
}
