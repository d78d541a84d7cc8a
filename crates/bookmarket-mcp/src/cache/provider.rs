//! Cache provider trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;
use super::key::CacheKey;

/// Async cache provider trait
///
/// Shared decision caches (role grants, policy decisions) are written through
/// this trait. Implementations must replace values atomically: a reader either
/// sees the previous value or the new one, never a partial write.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Get a live value, `None` when absent or expired
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one. `None` uses the backend default TTL.
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    /// Invalidate a key. Returns whether an entry was removed.
    async fn delete(&self, key: &CacheKey) -> CacheResult<bool>;
}
