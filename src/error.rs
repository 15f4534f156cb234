//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the two-tier cache.
///
/// Absent keys are not errors: lookups return `Option::None` and deletes of
/// missing keys are no-ops. Accounting violations inside the local container
/// are bugs and fail fast via assertion rather than surfacing here.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Remote store unreachable or the connection dropped mid-operation
    #[error("remote store connection failed: {0}")]
    Connection(String),

    /// Payload could not be encoded or decoded
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Operation attempted on a remote store that has been closed
    #[error("remote store is closed")]
    Closed,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Connection(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
