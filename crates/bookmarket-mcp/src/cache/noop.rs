//! Cache that stores nothing

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;
use super::key::CacheKey;
use super::provider::CacheProvider;

/// Drops every write, so each lookup goes upstream
///
/// Installed when `[cache] enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheProvider for NoopCache {
    async fn get(&self, _key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &CacheKey, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &CacheKey) -> CacheResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_written_decision_is_never_returned() {
        let cache = NoopCache::new();
        let key = CacheKey::policy_decision("get_list", "user_1");

        cache
            .set(&key, b"true", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(!cache.delete(&key).await.unwrap());
    }
}
