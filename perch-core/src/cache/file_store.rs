//! JSON file backend for the key-value store.
//!
//! Persists the whole store as a single JSON document. Writes go to a
//! temporary file first and are renamed into place so a crash mid-write
//! never truncates the previous state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{KeyValueStore, StoreError};

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// File-backed store keeping the full document in memory and writing
/// through on every mutation.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    /// Opens the store, loading any existing document at `path`.
    ///
    /// A missing file starts an empty store; a corrupt document is an error
    /// rather than silent data loss.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - If the file exists but cannot be read
    /// - `StoreError::Serialization` - If the document cannot be parsed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
                    reason: format!("corrupt store document {}: {e}", path.display()),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, serde_json::Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
            reason: format!("store document encoding failed: {e}"),
        })?;

        let mut temp_path = self.path.as_os_str().to_owned();
        temp_path.push(TEMP_FILE_SUFFIX);
        let temp_path = PathBuf::from(temp_path);

        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::debug!(
            "Persisted {} store entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let mut changed = false;
        for key in keys {
            changed |= entries.remove(key).is_some();
        }
        if changed {
            self.persist(&entries).await?;
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
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("perch-cache.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store
                .store("birds_US", json!([{"speciesCode": "amerob"}]))
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.load("birds_US").await.unwrap(),
            Some(json!([{"speciesCode": "amerob"}]))
        );
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("absent.json"))
            .await
            .unwrap();

        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization { .. })));
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("perch-cache.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.store("image_amerob", json!(1)).await.unwrap();
            store.store("image_norcar", json!(2)).await.unwrap();
            store.remove(&["image_amerob".to_string()]).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.load("image_amerob").await.unwrap(), None);
        assert_eq!(reopened.load("image_norcar").await.unwrap(), Some(json!(2)));
    }
}
