//! Durable cache tier
//!
//! Entries are self-describing JSON documents `{data, timestamp}` stored under a
//! fixed namespace prefix. Writes past the row quota fail with
//! `Error::QuotaExceeded` so the cache manager can sweep and retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use teamatlas_common::time::is_expired;
use teamatlas_common::{Error, Result};
use tokio::sync::Mutex;

use crate::utils::retry_on_lock;

/// Namespace prefix applied to every durable key
pub const DURABLE_KEY_PREFIX: &str = "teamatlas:";

/// Entry as persisted in the durable tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub data: Value,
    /// Unix milliseconds at write
    pub timestamp: i64,
    #[serde(skip)]
    pub ttl_ms: i64,
}

impl StoredEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        is_expired(self.timestamp, self.ttl_ms, now_ms)
    }
}

/// Persistent key-value store behind the cache's durable tier
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    async fn load(&self, key: &str) -> Result<Option<StoredEntry>>;

    async fn store(&self, key: &str, entry: &StoredEntry) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove keys starting with `prefix` (all when `None`)
    async fn clear(&self, prefix: Option<&str>) -> Result<u64>;

    /// Remove entries whose TTL has elapsed at `now_ms`
    async fn sweep_expired(&self, now_ms: i64) -> Result<u64>;

    async fn len(&self) -> Result<u64>;
}

fn namespaced(key: &str) -> String {
    format!("{}{}", DURABLE_KEY_PREFIX, key)
}

// ============================================================================
// SQLite store
// ============================================================================

/// SQLite-backed durable store (`cache_entries` table)
pub struct SqliteStore {
    pool: SqlitePool,
    max_entries: u64,
    max_lock_wait_ms: u64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, max_entries: u64, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_entries,
            max_lock_wait_ms,
        }
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query("SELECT data, ttl_ms FROM cache_entries WHERE key = ?")
            .bind(namespaced(key))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                let mut entry: StoredEntry = serde_json::from_str(&data)?;
                entry.ttl_ms = row.get("ttl_ms");
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        let key = namespaced(key);
        // Prepare payload before touching the database
        let data = serde_json::to_string(entry)?;
        let max_entries = i64::try_from(self.max_entries).unwrap_or(i64::MAX);

        // Quota check and upsert run as one statement so concurrent writers
        // cannot both pass the count
        let written = retry_on_lock("cache_entries upsert", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                INSERT INTO cache_entries (key, data, timestamp, ttl_ms)
                SELECT ?1, ?2, ?3, ?4
                WHERE EXISTS (SELECT 1 FROM cache_entries WHERE key = ?1)
                   OR (SELECT COUNT(*) FROM cache_entries) < ?5
                ON CONFLICT(key) DO UPDATE SET
                    data = excluded.data,
                    timestamp = excluded.timestamp,
                    ttl_ms = excluded.ttl_ms
                "#,
            )
            .bind(&key)
            .bind(&data)
            .bind(entry.timestamp)
            .bind(entry.ttl_ms)
            .bind(max_entries)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(result.rows_affected())
        })
        .await?;

        if written == 0 {
            return Err(Error::QuotaExceeded(format!(
                "cache_entries holds {} rows",
                self.max_entries
            )));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(namespaced(key))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self, prefix: Option<&str>) -> Result<u64> {
        // LIKE wildcards in the prefix are escaped
        let pattern = format!(
            "{}%",
            namespaced(prefix.unwrap_or(""))
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let result = sqlx::query("DELETE FROM cache_entries WHERE key LIKE ? ESCAPE '\\'")
            .bind(pattern)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE timestamp + ttl_ms <= ?")
            .bind(now_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local durable store with the same quota semantics as SQLite
///
/// Used when no database is configured.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
    max_entries: u64,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
        Ok(self.entries.lock().await.get(&namespaced(key)).cloned())
    }

    async fn store(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        let key = namespaced(key);
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(&key) && entries.len() as u64 >= self.max_entries {
            return Err(Error::QuotaExceeded(format!(
                "memory store holds {} entries",
                self.max_entries
            )));
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(&namespaced(key));
        Ok(())
    }

    async fn clear(&self, prefix: Option<&str>) -> Result<u64> {
        let prefix = namespaced(prefix.unwrap_or(""));
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(&prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now_ms));
        Ok((before - entries.len()) as u64)
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use serde_json::json;

    fn entry(ts: i64, ttl: i64) -> StoredEntry {
        StoredEntry {
            data: json!({"teams": []}),
            timestamp: ts,
            ttl_ms: ttl,
        }
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_keeps_ttl() {
        let store = SqliteStore::new(init_memory_pool().await.unwrap(), 10, 1000);
        store.store("teams:AR", &entry(1_000, 500)).await.unwrap();

        let loaded = store.load("teams:AR").await.unwrap().unwrap();
        assert_eq!(loaded, entry(1_000, 500));
        assert!(store.load("teams:BR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_persists_self_describing_document() {
        let pool = init_memory_pool().await.unwrap();
        let store = SqliteStore::new(pool.clone(), 10, 1000);
        store.store("teams:AR", &entry(42, 500)).await.unwrap();

        let raw: String = sqlx::query_scalar("SELECT data FROM cache_entries WHERE key = ?")
            .bind("teamatlas:teams:AR")
            .fetch_one(&pool)
            .await
            .unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["timestamp"], json!(42));
        assert!(doc.get("data").is_some());
    }

    #[tokio::test]
    async fn test_sqlite_quota_allows_overwrite() {
        let store = SqliteStore::new(init_memory_pool().await.unwrap(), 1, 1000);
        store.store("a", &entry(0, 10)).await.unwrap();
        store.store("a", &entry(1, 10)).await.unwrap();

        let err = store.store("b", &entry(0, 10)).await.unwrap_err();
        assert!(err.is_quota_error());
    }

    #[tokio::test]
    async fn test_sqlite_quota_holds_under_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::init_database_pool(&dir.path().join("cache.db")).await.unwrap();
        let store = std::sync::Arc::new(SqliteStore::new(pool, 3, 5_000));

        let writes: Vec<_> = (0..12)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.store(&format!("teams:{i}"), &entry(0, 10_000)).await })
            })
            .collect();

        let mut stored = 0;
        for write in writes {
            match write.await.unwrap() {
                Ok(()) => stored += 1,
                Err(e) => assert!(e.is_quota_error()),
            }
        }

        assert_eq!(stored, 3);
        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_sweep_and_clear() {
        let store = SqliteStore::new(init_memory_pool().await.unwrap(), 10, 1000);
        store.store("teams:AR", &entry(0, 10)).await.unwrap();
        store.store("teams:BR", &entry(0, 10_000)).await.unwrap();
        store.store("other_x", &entry(0, 10_000)).await.unwrap();

        assert_eq!(store.sweep_expired(100).await.unwrap(), 1);
        assert_eq!(store.clear(Some("teams:")).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_clear_prefix_escapes_wildcards() {
        let store = SqliteStore::new(init_memory_pool().await.unwrap(), 10, 1000);
        store.store("other_x", &entry(0, 10_000)).await.unwrap();
        store.store("otherAx", &entry(0, 10_000)).await.unwrap();

        assert_eq!(store.clear(Some("other_")).await.unwrap(), 1);
        assert!(store.load("otherAx").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_quota() {
        let store = MemoryStore::new(1);
        store.store("a", &entry(0, 10)).await.unwrap();
        assert!(store.store("b", &entry(0, 10)).await.unwrap_err().is_quota_error());

        store.sweep_expired(100).await.unwrap();
        store.store("b", &entry(0, 10)).await.unwrap();
    }
}
