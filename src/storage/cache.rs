use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::error::Result;
use crate::storage::traits::KeyValueStore;

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub expires_at: SystemTime,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: SystemTime::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() > self.expires_at
    }
}

/// In-process key-value store. Lives as long as the process; good for a
/// single server instance and for tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, CacheEntry<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let found = self.entries.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.data.clone())
            }
        });

        match found {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Single-value, in-process cache with a last-fetch timestamp.
///
/// A value is fresh while `now - fetched_at < ttl`. Meant to be built once at
/// startup and handed to whoever needs it.
#[derive(Debug)]
pub struct MemoSlot<T> {
    ttl: Duration,
    slot: RwLock<Option<(Instant, T)>>,
}

impl<T: Clone> MemoSlot<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The stored value if it is still fresh.
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.read();
        match slot.as_ref() {
            Some((fetched_at, value)) if fetched_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub fn put(&self, value: T) {
        *self.slot.write() = Some((Instant::now(), value));
    }
}
