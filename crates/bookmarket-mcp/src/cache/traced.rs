//! Traced cache wrapper for observability

use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::error::CacheResult;
use super::key::CacheKey;
use super::provider::CacheProvider;

/// Wrapper that adds tracing spans and hit/miss metrics to any `CacheProvider`
///
/// Keys embed subject identifiers, so only the namespace is recorded.
#[derive(Debug, Clone)]
pub struct TracedCache<C> {
    inner: C,
    cache_name: &'static str,
}

impl<C> TracedCache<C> {
    pub const fn new(cache: C, cache_name: &'static str) -> Self {
        Self {
            inner: cache,
            cache_name,
        }
    }
}

#[async_trait]
impl<C: CacheProvider> CacheProvider for TracedCache<C> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let namespace = key.namespace().as_str();
        let span = tracing::debug_span!(
            "cache.get",
            cache.name = self.cache_name,
            cache.namespace = namespace,
            otel.name = "cache.get",
        );

        let result = self.inner.get(key).instrument(span).await;

        match &result {
            Ok(Some(_)) => {
                tracing::trace!(cache.result = "hit", cache.namespace = namespace);
                #[cfg(feature = "metrics")]
                crate::observability::record_cache_hit(namespace);
            }
            Ok(None) => {
                tracing::trace!(cache.result = "miss", cache.namespace = namespace);
                #[cfg(feature = "metrics")]
                crate::observability::record_cache_miss(namespace);
            }
            Err(e) => {
                tracing::warn!(cache.result = "error", cache.namespace = namespace, error = %e);
            }
        }

        result
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let span = tracing::debug_span!(
            "cache.set",
            cache.name = self.cache_name,
            cache.namespace = key.namespace().as_str(),
            cache.ttl_secs = ttl.map(|d| d.as_secs()),
            otel.name = "cache.set",
        );

        let result = self.inner.set(key, value, ttl).instrument(span).await;

        if let Err(ref e) = result {
            tracing::warn!(
                cache.operation = "set",
                cache.namespace = key.namespace().as_str(),
                error = %e,
            );
        }

        result
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let span = tracing::debug_span!(
            "cache.delete",
            cache.name = self.cache_name,
            cache.namespace = key.namespace().as_str(),
            otel.name = "cache.delete",
        );

        let result = self.inner.delete(key).instrument(span).await;

        if let Err(ref e) = result {
            tracing::warn!(
                cache.operation = "delete",
                cache.namespace = key.namespace().as_str(),
                error = %e,
            );
        }

        result
    }
}
