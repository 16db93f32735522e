//! Schema errors

use thiserror::Error;

use crate::keygen::KeyGenError;

/// Result type for schema construction
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while assembling a block schema snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Duplicate column id: {0}")]
    DuplicateColumn(String),

    #[error("Complex column {0} must declare at least one element size")]
    MissingElementSize(String),

    #[error("Key layout error: {0}")]
    KeyLayout(#[from] KeyGenError),
}
