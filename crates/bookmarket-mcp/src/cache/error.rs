//! Cache error types

use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Value too large: {size} bytes (max: {max} bytes)")]
    ValueTooLarge { size: usize, max: usize },
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
