use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::traits::KeyValueStore;

/// Serializable entry for disk storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    pub expires_at: u64, // Unix timestamp
}

impl StoredEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: unix_now().saturating_add(ttl.as_secs().max(1)),
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreFile {
    pub entries: HashMap<String, StoredEntry>,
    pub store_version: u32,
    pub saved_at: u64, // Unix timestamp
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            store_version: 1,
            saved_at: unix_now(),
        }
    }
}

/// Key-value store kept in a single JSON file, so the cached article list
/// survives restarts of a single-host deployment.
///
/// Every write rewrites the file through a temporary sibling and a rename.
/// The state lock is held until the rename lands, so snapshots reach disk in
/// write order.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreFile>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!(
                        "Failed to create store directory '{}': {}",
                        parent.display(), e
                    )))?;
            }
        }

        let state = Self::load(&path)?;
        tracing::debug!("Opened file store at {} ({} entries)", path.display(), state.entries.len());

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn load(path: &Path) -> Result<StoreFile> {
        if !path.exists() {
            return Ok(StoreFile::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read store file: {}", e)))?;

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(mut data) => {
                let now = unix_now();
                data.entries.retain(|_, entry| !entry.is_expired(now));
                Ok(data)
            }
            Err(e) => {
                // A corrupt file is the same as an empty one; it gets rewritten on the next set.
                tracing::warn!("Ignoring unreadable store file {}: {}", path.display(), e);
                Ok(StoreFile::default())
            }
        }
    }

    async fn persist(&self, data: &mut StoreFile) -> Result<()> {
        data.saved_at = unix_now();
        let json = serde_json::to_string_pretty(data)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write store file: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to replace store file: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = unix_now();
        let state = self.state.lock().await;
        Ok(state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = unix_now();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        state.entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        self.persist(&mut state).await
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("news", "[1,2,3]".to_string(), Duration::from_secs(60)).await.unwrap();
            assert!(path.exists());
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("news").await.unwrap().as_deref(), Some("[1,2,3]"));
    }

    #[tokio::test]
    async fn test_file_store_expired_entries_are_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut data = StoreFile::default();
        data.entries.insert(
            "old".to_string(),
            StoredEntry {
                value: "stale".to_string(),
                expires_at: 2,
            },
        );
        fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);

        store.set("k", "v".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<StoreFile>(&content).is_ok());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_concurrent_writes_all_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = std::sync::Arc::new(FileStore::open(&path).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.set(&format!("k{}", i), i.to_string(), Duration::from_secs(60)).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        for i in 0..8 {
            assert_eq!(reopened.get(&format!("k{}", i)).await.unwrap(), Some(i.to_string()));
        }
    }
}
