use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A string-valued key-value store with per-key expiry.
///
/// Writes replace the whole value. Expiry is the store's job: once the TTL
/// has elapsed `get` reports the key as absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value, `None` when missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`, expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;
}
