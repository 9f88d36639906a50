pub mod cache;
pub mod persistent_cache;
pub mod rest;
pub mod traits;

pub use cache::{CacheEntry, MemoSlot, MemoryStore};
pub use persistent_cache::FileStore;
pub use rest::RestStore;
pub use traits::KeyValueStore;

use std::sync::Arc;

use crate::config::{CacheSettings, StoreBackend};
use crate::error::{Error, Result};

/// Build the store selected by `[cache] backend`.
pub fn open_store(settings: &CacheSettings, timeout: std::time::Duration) -> Result<Arc<dyn KeyValueStore>> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => {
            let path = match &settings.path {
                Some(path) => path.clone(),
                None => crate::config::Config::cache_dir()?.join("store.json"),
            };
            Ok(Arc::new(FileStore::open(path)?))
        }
        StoreBackend::Rest => {
            let url = settings
                .rest_url
                .as_deref()
                .ok_or_else(|| Error::ConfigMissing("KV_REST_API_URL".to_string()))?;
            let token = settings
                .rest_token
                .as_deref()
                .ok_or_else(|| Error::ConfigMissing("KV_REST_API_TOKEN".to_string()))?;
            Ok(Arc::new(RestStore::new(url, token, timeout)?))
        }
    }
}
