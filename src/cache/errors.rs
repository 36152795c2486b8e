//! Cache error types

use crate::error::UpstreamError;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key was empty or whitespace-only; the store was not touched
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// The populating operation failed; nothing was cached
    #[error("cache population failed: {0}")]
    FactoryFailed(#[source] UpstreamError),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
