//! Persistent key-value backend interface.
//!
//! The browser-profile storage area is an external collaborator; this trait
//! models its async read/write/enumerate contract. Values are stored as raw
//! JSON so the backend stays ignorant of entry shapes and TTL policy, which
//! live one layer up in [`super::TtlCache`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Errors that occur while talking to a persistent backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend failed: {reason}")]
    Backend { reason: String },

    #[error("Value serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async key-value persistence used by the TTL cache.
///
/// Implementations must treat keys as opaque strings and must not interpret
/// values. Concurrent writers to the same key are last-write-wins; entries
/// are immutable payloads replaced wholesale, never merged.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Loads the raw value for a key, `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Stores a value, unconditionally overwriting any previous one.
    async fn store(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// Removes the given keys. Missing keys are not an error.
    async fn remove(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Lists every key currently present, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory backend used in tests and as the default development store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_store_and_load() {
        let store = MemoryKeyValueStore::new();

        store.store("birds_US", json!(["amerob"])).await.unwrap();

        let value = store.load("birds_US").await.unwrap();
        assert_eq!(value, Some(json!(["amerob"])));
        assert_eq!(store.load("birds_CA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let store = MemoryKeyValueStore::new();

        store.store("image_amerob", json!(1)).await.unwrap();
        store.store("image_amerob", json!(2)).await.unwrap();

        assert_eq!(store.load("image_amerob").await.unwrap(), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_ignores_missing_keys() {
        let store = MemoryKeyValueStore::new();
        store.store("audio_amerob", json!(null)).await.unwrap();

        store
            .remove(&["audio_amerob".to_string(), "audio_norcar".to_string()])
            .await
            .unwrap();

        assert!(store.is_empty().await);
    }
}
