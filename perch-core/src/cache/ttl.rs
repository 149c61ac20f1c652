//! TTL cache layered over the persistent key-value store.
//!
//! Every entry carries its own write timestamp and duration; a read past
//! expiry is a miss, not an error. Expired entries are inert: they stay in
//! the store until overwritten or purged, which is what makes the serve-stale
//! and fallback-reconstruction paths possible at all.
//!
//! An LRU layer in front of the persistent store absorbs repeated reads of
//! the same key (the catalog list is consulted on every new tab).

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::keys::{CacheKey, CacheNamespace};
use super::store::{KeyValueStore, StoreError};

const DEFAULT_MEMORY_ENTRIES: usize = 64;

/// A stored value with its freshness metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub written_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    /// Creates an entry stamped with the current time.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            written_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// An entry is expired iff `now - written_at >= ttl`. Entries written in
    /// the future (clock adjustment) count as fresh.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.written_at);
        age.num_seconds() >= 0 && age.num_seconds() as u64 >= self.ttl_secs
    }
}

/// Hit/miss counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Default)]
pub struct CacheStatistics {
    pub hit_count: u64,
    pub miss_count: u64,
    pub memory_entries: usize,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        if self.hit_count + self.miss_count == 0 {
            0.0
        } else {
            (self.hit_count as f64) / ((self.hit_count + self.miss_count) as f64)
        }
    }
}

/// Two-layer TTL cache over a shared persistent backend.
///
/// Cloning is cheap; clones share the same memory layer, counters, and
/// backend, so every logical flow (live request, prefetch, batch warm-up)
/// observes the same cache.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    memory: Arc<RwLock<LruCache<String, CacheEntry<serde_json::Value>>>>,
    hit_count: Arc<RwLock<u64>>,
    miss_count: Arc<RwLock<u64>>,
}

impl TtlCache {
    /// Creates a cache over `store` with an in-memory layer of
    /// `memory_entries` slots.
    pub fn new(store: Arc<dyn KeyValueStore>, memory_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(memory_entries)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_MEMORY_ENTRIES).unwrap());

        Self {
            store,
            memory: Arc::new(RwLock::new(LruCache::new(capacity))),
            hit_count: Arc::new(RwLock::new(0)),
            miss_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Loads a fresh value, or `None` if the key is absent, expired, or the
    /// stored payload does not decode as `T`.
    ///
    /// Expiry never deletes: the stale entry stays behind for
    /// [`Self::load_stale`] consumers.
    pub async fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.entry(key).await?;

        if entry.is_expired(Utc::now()) {
            tracing::debug!("Cache entry {key} expired, treating as miss");
            *self.miss_count.write().await += 1;
            return None;
        }

        *self.hit_count.write().await += 1;
        self.decode(key, entry.value)
    }

    /// Loads a value ignoring expiry entirely.
    ///
    /// Used by the serve-stale catalog path and fallback reconstruction,
    /// where old data is strictly better than none.
    pub async fn load_stale<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.entry(key).await?;
        self.decode(key, entry.value)
    }

    /// Stores a value under `key`, stamping the current time. Overwrites
    /// unconditionally.
    ///
    /// # Errors
    ///
    /// - `StoreError::Serialization` - If `value` cannot be encoded
    /// - `StoreError::Backend` / `StoreError::Io` - If the backend write fails
    pub async fn store<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_value(value).map_err(|e| StoreError::Serialization {
            reason: format!("encoding value for {key} failed: {e}"),
        })?;
        let entry = CacheEntry::new(raw, ttl);
        let encoded = serde_json::to_value(&entry).map_err(|e| StoreError::Serialization {
            reason: format!("encoding entry for {key} failed: {e}"),
        })?;

        let storage_key = key.storage_key();
        self.store.store(&storage_key, encoded).await?;

        let mut memory = self.memory.write().await;
        memory.put(storage_key, entry);
        Ok(())
    }

    /// Deletes every entry in the given namespaces, from both layers.
    ///
    /// Keys that do not parse as bird cache keys are never touched, even if
    /// they happen to share a prefix.
    ///
    /// # Errors
    ///
    /// - `StoreError::Backend` / `StoreError::Io` - If the backend delete fails
    pub async fn purge(&self, namespaces: &[CacheNamespace]) -> Result<(), StoreError> {
        let keys = self.store.keys().await?;
        let matching: Vec<String> = keys
            .into_iter()
            .filter(|raw| {
                CacheKey::parse(raw).is_some_and(|key| namespaces.contains(&key.namespace()))
            })
            .collect();

        if !matching.is_empty() {
            self.store.remove(&matching).await?;
        }

        let mut memory = self.memory.write().await;
        for raw in &matching {
            memory.pop(raw);
        }

        tracing::debug!("Purged {} cache entries", matching.len());
        Ok(())
    }

    /// Enumerates every key in a namespace from the persistent layer,
    /// regardless of entry freshness. Backend failures log and yield an
    /// empty list; enumeration feeds best-effort fallback paths only.
    pub async fn keys_in(&self, namespace: CacheNamespace) -> Vec<CacheKey> {
        let raw_keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Key enumeration failed: {e}");
                return Vec::new();
            }
        };

        raw_keys
            .iter()
            .filter_map(|raw| CacheKey::parse(raw))
            .filter(|key| key.namespace() == namespace)
            .collect()
    }

    /// Current hit/miss statistics.
    pub async fn stats(&self) -> CacheStatistics {
        CacheStatistics {
            hit_count: *self.hit_count.read().await,
            miss_count: *self.miss_count.read().await,
            memory_entries: self.memory.read().await.len(),
        }
    }

    /// Reads the raw entry for a key, filling the memory layer from the
    /// persistent store on a memory miss. Backend and decode failures are
    /// logged and treated as misses.
    async fn entry(&self, key: &CacheKey) -> Option<CacheEntry<serde_json::Value>> {
        let storage_key = key.storage_key();

        {
            let mut memory = self.memory.write().await;
            if let Some(entry) = memory.get(&storage_key) {
                return Some(entry.clone());
            }
        }

        let raw = match self.store.load(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                *self.miss_count.write().await += 1;
                return None;
            }
            Err(e) => {
                tracing::warn!("Backend read for {key} failed: {e}");
                *self.miss_count.write().await += 1;
                return None;
            }
        };

        let entry: CacheEntry<serde_json::Value> = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Stored entry for {key} is malformed: {e}");
                *self.miss_count.write().await += 1;
                return None;
            }
        };

        let mut memory = self.memory.write().await;
        memory.put(storage_key, entry.clone());
        Some(entry)
    }

    fn decode<T: DeserializeOwned>(&self, key: &CacheKey, value: serde_json::Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Cached payload for {key} does not match expected shape: {e}");
                None
            }
        }
    }
}
