//! Fast (in-process) cache tier
//!
//! Bounded LRU map guarded by a mutex, so get/set/evict are atomic with respect
//! to each other even when several country refreshes run concurrently.

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use teamatlas_common::time::is_expired;

/// Cached value with its write time and lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    /// Unix milliseconds at write
    pub timestamp: i64,
    pub ttl_ms: i64,
}

impl CacheEntry {
    pub fn new(value: Value, timestamp: i64, ttl_ms: i64) -> Self {
        Self {
            value,
            timestamp,
            ttl_ms,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        is_expired(self.timestamp, self.ttl_ms, now_ms)
    }

    /// Milliseconds of life left at `now_ms` (0 when expired)
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.timestamp + self.ttl_ms - now_ms).max(0)
    }
}

/// Result of a fast-tier lookup
#[derive(Debug, PartialEq)]
pub enum FastLookup {
    Hit(Value),
    /// Entry existed but its TTL had elapsed; it has been removed
    Expired,
    Miss,
}

/// Bounded LRU tier
pub struct FastTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: NonZeroUsize,
}

impl FastTier {
    /// Capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lookup; a hit marks the key most recently used
    pub fn get(&self, key: &str, now_ms: i64) -> FastLookup {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => return FastLookup::Hit(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            FastLookup::Expired
        } else {
            FastLookup::Miss
        }
    }

    /// Insert or replace; returns the key evicted to make room, if any
    pub fn insert(&self, key: String, entry: CacheEntry) -> Option<String> {
        let mut entries = self.lock();
        match entries.push(key.clone(), entry) {
            Some((old_key, _)) if old_key != key => Some(old_key),
            _ => None,
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().pop(key).is_some()
    }

    /// Remove keys starting with `prefix` (all keys when `None`)
    pub fn clear(&self, prefix: Option<&str>) -> usize {
        let mut entries = self.lock();
        match prefix {
            None => {
                let count = entries.len();
                entries.clear();
                count
            }
            Some(prefix) => {
                let doomed: Vec<String> = entries
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in &doomed {
                    entries.pop(key);
                }
                doomed.len()
            }
        }
    }

    /// Drop every expired entry; returns how many were removed
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now_ms))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }
}
