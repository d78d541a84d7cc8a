//! Cache configuration types

use std::str::FromStr;
use std::time::Duration;

/// Default maximum value size: 64KB. Decision entries are a few bytes each.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 65_536;

/// Cache backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    Noop,
    #[default]
    Memory,
}

impl FromStr for CacheBackend {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "noop" | "none" | "disabled" => Self::Noop,
            _ => Self::Memory,
        })
    }
}

/// Shared cache configuration
///
/// Per-cache TTLs belong to their consumers (`MembershipConfig::cache_ttl`,
/// `PolicyConfig::cache_ttl`); `default_ttl` only applies to writes that pass none.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub default_ttl: Duration,
    /// Maximum entries for in-memory cache
    pub max_entries: Option<usize>,
    pub max_value_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            default_ttl: Duration::from_secs(300),
            max_entries: Some(50_000),
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}
