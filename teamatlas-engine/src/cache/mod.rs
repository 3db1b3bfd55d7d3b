//! Two-tier cache manager
//!
//! - **Fast tier:** bounded in-process LRU, short TTL
//! - **Durable tier:** persistent store, longer TTL, best-effort writes
//!
//! Reads check fast first and promote durable hits. Writes always go to the
//! fast tier and to the durable tier when requested. A quota failure in the
//! durable tier triggers an expired-entry sweep and one retry; after that the
//! write is dropped. No lookup ever returns an entry past its TTL.

pub mod durable;
pub mod fast_tier;

pub use durable::{DurableStore, MemoryStore, SqliteStore, StoredEntry, DURABLE_KEY_PREFIX};
pub use fast_tier::{CacheEntry, FastLookup, FastTier};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teamatlas_common::config::CacheSettings;
use teamatlas_common::time::now_millis;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which tiers a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Fast tier only
    Fast,
    /// Fast tier plus durable tier
    Durable,
}

/// Cache sizing and lifetimes
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub fast_ttl: Duration,
    pub durable_ttl: Duration,
    pub fast_max_entries: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            fast_ttl: Duration::from_secs(settings.fast_ttl_secs),
            durable_ttl: Duration::from_secs(settings.durable_ttl_secs),
            fast_max_entries: settings.fast_max_entries,
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs.max(1)),
        }
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    fast_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    writes: AtomicU64,
    durable_write_failures: AtomicU64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub fast_entries: usize,
    pub fast_capacity: usize,
    pub durable_enabled: bool,
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub writes: u64,
    pub durable_write_failures: u64,
}

/// Two-tier cache manager
pub struct TieredCache {
    fast: FastTier,
    durable: Option<Arc<dyn DurableStore>>,
    config: CacheConfig,
    counters: CacheCounters,
}

fn ttl_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl TieredCache {
    pub fn new(config: CacheConfig, durable: Option<Arc<dyn DurableStore>>) -> Self {
        Self {
            fast: FastTier::new(config.fast_max_entries),
            durable,
            config,
            counters: CacheCounters::default(),
        }
    }

    /// Fast tier only (no persistence)
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Typed lookup; entries that fail to deserialize count as misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape, ignoring");
                None
            }
        }
    }

    /// Raw JSON lookup: fast tier, then durable tier with promotion
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        let now = now_millis();

        match self.fast.get(key, now) {
            FastLookup::Hit(value) => {
                self.counters.fast_hits.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }
            FastLookup::Expired => {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            }
            FastLookup::Miss => {}
        }

        if let Some(store) = &self.durable {
            match store.load(key).await {
                Ok(Some(entry)) if !entry.is_expired(now) => {
                    self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);
                    self.promote(key, &entry, now);
                    return Some(entry.data);
                }
                Ok(Some(_)) => {
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = store.remove(key).await {
                        debug!(key, error = %e, "Failed to remove expired durable entry");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key, store = store.name(), error = %e, "Durable cache read failed");
                }
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Copy a durable hit into the fast tier without outliving the durable TTL
    fn promote(&self, key: &str, entry: &StoredEntry, now: i64) {
        let remaining = (entry.timestamp + entry.ttl_ms - now).max(0);
        let ttl = ttl_ms(self.config.fast_ttl).min(remaining);
        self.counters.promotions.fetch_add(1, Ordering::Relaxed);
        self.insert_fast(key, CacheEntry::new(entry.data.clone(), now, ttl));
        debug!(key, ttl_ms = ttl, "Promoted durable entry to fast tier");
    }

    fn insert_fast(&self, key: &str, entry: CacheEntry) {
        if let Some(evicted) = self.fast.insert(key.to_string(), entry) {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(evicted = %evicted, "Fast tier full, evicted least recently used entry");
        }
    }

    /// Typed write
    ///
    /// Serialization failures are logged and the write is skipped.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, tier: CacheTier) {
        match serde_json::to_value(value) {
            Ok(v) => self.set_value(key, v, tier).await,
            Err(e) => warn!(key, error = %e, "Value not cacheable, skipping write"),
        }
    }

    pub async fn set_value(&self, key: &str, value: Value, tier: CacheTier) {
        let now = now_millis();
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        self.insert_fast(key, CacheEntry::new(value.clone(), now, ttl_ms(self.config.fast_ttl)));

        if tier == CacheTier::Durable {
            if let Some(store) = &self.durable {
                let entry = StoredEntry {
                    data: value,
                    timestamp: now,
                    ttl_ms: ttl_ms(self.config.durable_ttl),
                };
                self.write_durable(store.as_ref(), key, &entry).await;
            }
        }
    }

    async fn write_durable(&self, store: &dyn DurableStore, key: &str, entry: &StoredEntry) {
        let err = match store.store(key, entry).await {
            Ok(()) => return,
            Err(e) => e,
        };

        if err.is_quota_error() {
            warn!(key, store = store.name(), error = %err, "Durable tier full, sweeping expired entries");
            match store.sweep_expired(now_millis()).await {
                Ok(removed) => debug!(removed, "Durable sweep before retry"),
                Err(e) => debug!(error = %e, "Durable sweep failed"),
            }
            match store.store(key, entry).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(key, store = store.name(), error = %e, "Durable write dropped after retry");
                }
            }
        } else {
            warn!(key, store = store.name(), error = %err, "Durable write dropped");
        }

        self.counters
            .durable_write_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Remove one key from both tiers
    pub async fn remove(&self, key: &str) {
        self.fast.remove(key);
        if let Some(store) = &self.durable {
            if let Err(e) = store.remove(key).await {
                warn!(key, error = %e, "Durable remove failed");
            }
        }
    }

    /// Remove keys with `prefix` (everything when `None`) from both tiers
    pub async fn clear(&self, prefix: Option<&str>) -> u64 {
        let mut removed = self.fast.clear(prefix) as u64;
        if let Some(store) = &self.durable {
            match store.clear(prefix).await {
                Ok(n) => removed += n,
                Err(e) => warn!(prefix, error = %e, "Durable clear failed"),
            }
        }
        info!(prefix, removed, "Cache cleared");
        removed
    }

    /// Remove TTL-expired entries from both tiers
    pub async fn sweep_expired(&self) -> u64 {
        let now = now_millis();
        let mut removed = self.fast.sweep_expired(now) as u64;
        if let Some(store) = &self.durable {
            match store.sweep_expired(now).await {
                Ok(n) => removed += n,
                Err(e) => warn!(error = %e, "Durable sweep failed"),
            }
        }
        self.counters.expirations.fetch_add(removed, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, "Expired cache entries swept");
        }
        removed
    }

    /// Run `sweep_expired` every `sweep_interval` until cancelled
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let period = cache.config.sweep_interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                }
            }
            debug!("Cache sweeper stopped");
        })
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            fast_entries: self.fast.len(),
            fast_capacity: self.fast.capacity(),
            durable_enabled: self.durable.is_some(),
            fast_hits: c.fast_hits.load(Ordering::Relaxed),
            durable_hits: c.durable_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            promotions: c.promotions.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            durable_write_failures: c.durable_write_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(fast_ttl_ms: u64, durable_ttl_ms: u64, max: usize) -> CacheConfig {
        CacheConfig {
            fast_ttl: Duration::from_millis(fast_ttl_ms),
            durable_ttl: Duration::from_millis(durable_ttl_ms),
            fast_max_entries: max,
            sweep_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let cache = TieredCache::in_memory(config(60_000, 60_000, 10));
        cache.set("k", &json!({"a": 1}), CacheTier::Fast).await;
        assert_eq!(cache.get_value("k").await, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_durable_hit_promotes_to_fast() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new(10));
        let cache = TieredCache::new(config(60_000, 60_000, 10), Some(Arc::clone(&store)));
        store
            .store(
                "k",
                &StoredEntry {
                    data: json!(7),
                    timestamp: now_millis(),
                    ttl_ms: 60_000,
                },
            )
            .await
            .unwrap();

        assert_eq!(cache.get_value("k").await, Some(json!(7)));
        assert_eq!(cache.get_value("k").await, Some(json!(7)));

        let stats = cache.stats();
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.fast_hits, 1);
        assert_eq!(stats.promotions, 1);
    }

    #[tokio::test]
    async fn test_fast_only_write_skips_durable() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new(10));
        let cache = TieredCache::new(config(60_000, 60_000, 10), Some(Arc::clone(&store)));
        cache.set("k", &1, CacheTier::Fast).await;
        assert_eq!(store.len().await.unwrap(), 0);

        cache.set("k", &1, CacheTier::Durable).await;
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_typed_get_with_wrong_shape_is_miss() {
        let cache = TieredCache::in_memory(config(60_000, 60_000, 10));
        cache.set("k", &"text", CacheTier::Fast).await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }
}
