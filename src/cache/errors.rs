//! Block index cache errors

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Block index cache errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Failed to load block {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}
