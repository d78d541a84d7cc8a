//! Cache abstraction for shared authorization state
//!
//! Role grants and policy decisions are process-wide, read by many concurrent
//! requests and written occasionally. They live behind [`CacheProvider`] so the
//! resolver and the policy client can be handed any backend, including an
//! [`InMemoryCache`] on a paused tokio clock in tests.
//!
//! # Available Backends
//!
//! - [`NoopCache`] - stores nothing (caching disabled)
//! - [`InMemoryCache`] - thread-safe in-memory cache with TTL support
//!
//! Wrap any cache with [`TracedCache`] to add tracing spans and hit/miss metrics.
//!
//! The signing key set is not stored here: decoded keys are not byte-serialisable
//! and are held by [`crate::auth::KeySetCache`] instead.

mod config;
mod error;
mod key;
mod memory;
mod noop;
mod provider;
mod traced;

use std::sync::Arc;

pub use config::{CacheBackend, CacheConfig, DEFAULT_MAX_VALUE_SIZE};
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, CacheNamespace};
pub use memory::InMemoryCache;
pub use noop::NoopCache;
pub use provider::CacheProvider;
pub use traced::TracedCache;

/// Create a cache provider based on configuration
#[must_use]
pub fn create_cache(config: &CacheConfig) -> Arc<dyn CacheProvider> {
    if !config.enabled {
        tracing::warn!("Decision caches disabled; every check will reach upstream services");
        return Arc::new(NoopCache::new());
    }

    match config.backend {
        CacheBackend::Noop => Arc::new(NoopCache::new()),
        CacheBackend::Memory => {
            let mut cache = InMemoryCache::new()
                .with_default_ttl(config.default_ttl)
                .with_max_value_size(config.max_value_size);

            if let Some(max) = config.max_entries {
                cache = cache.with_max_entries(max);
            }

            Arc::new(TracedCache::new(cache, "bookmarket-mcp"))
        }
    }
}
