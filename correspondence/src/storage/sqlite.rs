//! SQLite-backed key-value store
//!
//! One row per key in `kv_store`. With a quota, the capacity check and the
//! write happen in a single statement, so a refused write never touches the
//! stored value.

use super::KeyValueStore;
use crate::database::create_pool;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;

/// Durable store on a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    quota: Option<usize>,
}

impl SqliteStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool, quota: Option<usize>) -> Self {
        Self { pool, quota }
    }

    /// Open (creating and migrating if needed) the database at `db_path`.
    pub async fn open(db_path: &Path, quota: Option<usize>) -> Result<Self> {
        let pool = create_pool(db_path).await?;
        Ok(Self::new(pool, quota))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn used_elsewhere(&self, key: &str) -> Result<usize> {
        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(value)), 0)
            FROM kv_store WHERE key != ?
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(used.max(0) as usize)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let now = Utc::now();
        let len = value.len();

        let Some(quota) = self.quota else {
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&self.pool)
            .await?;

            tracing::debug!("Set {} ({} bytes)", key, len);
            return Ok(());
        };

        let required = key.len() + len;
        let rows = sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            SELECT ?1, ?2, ?3
            WHERE (
                SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(value)), 0)
                FROM kv_store WHERE key != ?1
            ) + ?4 <= ?5
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(required as i64)
        .bind(quota as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            let available = quota.saturating_sub(self.used_elsewhere(key).await?);
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

        tracing::debug!("Set {} ({} bytes)", key, len);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }
}
