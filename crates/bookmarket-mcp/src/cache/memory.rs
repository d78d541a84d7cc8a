//! In-memory cache implementation with TTL support

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::config::DEFAULT_MAX_VALUE_SIZE;
use super::error::{CacheError, CacheResult};
use super::key::CacheKey;
use super::provider::CacheProvider;

/// Shared immutable payload; replacing an entry swaps the whole `Arc`
struct CacheEntry {
    value: Arc<[u8]>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Thread-safe in-memory cache with TTL support
///
/// Expiry is measured with [`tokio::time::Instant`], so tests running on a paused
/// runtime can move time forward with `tokio::time::advance`.
///
/// When `max_entries` is reached, expired entries are purged first; if the store
/// is still full, the entry closest to expiry is evicted. Entries without a TTL
/// go last.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: Option<usize>,
    max_value_size: usize,
    default_ttl: Option<Duration>,
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("max_entries", &self.max_entries)
            .field("max_value_size", &self.max_value_size)
            .field("default_ttl", &self.default_ttl)
            .field("entry_count", &self.store.read().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            max_entries: None,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            default_ttl: None,
        }
    }

    #[must_use]
    pub const fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    #[must_use]
    pub const fn with_max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = max;
        self
    }

    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    fn make_room(store: &mut HashMap<String, CacheEntry>, max: usize, now: Instant) {
        if store.len() < max {
            return;
        }
        store.retain(|_, entry| !entry.is_expired(now));
        if store.len() < max {
            return;
        }
        let victim = store
            .iter()
            .min_by_key(|(_, entry)| (entry.expires_at.is_none(), entry.expires_at))
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            store.remove(&victim);
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let key_str = key.to_key_string();
        let now = Instant::now();

        Ok(self
            .store
            .read()
            .get(&key_str)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.to_vec()))
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        if value.len() > self.max_value_size {
            return Err(CacheError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_size,
            });
        }

        let key_str = key.to_key_string();
        let now = Instant::now();
        let entry = CacheEntry {
            value: Arc::from(value),
            expires_at: ttl.or(self.default_ttl).map(|d| now + d),
        };

        {
            let mut store = self.store.write();
            if let Some(max) = self.max_entries
                && !store.contains_key(&key_str)
            {
                Self::make_room(&mut store, max, now);
            }
            store.insert(key_str, entry);
        }

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.store.write().remove(&key.to_key_string()).is_some())
    }
}

#[cfg(test)]
impl InMemoryCache {
    fn live_entries(&self) -> usize {
        let now = Instant::now();
        self.store
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }
}
