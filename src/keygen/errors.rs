//! Key generator errors

use thiserror::Error;

/// Result type for key generator operations
pub type KeyGenResult<T> = Result<T, KeyGenError>;

/// Errors raised while packing or unpacking composite keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyGenError {
    #[error("Invalid bit length {bits} for dimension {dimension} (expected 1..=64)")]
    InvalidBitLength { dimension: usize, bits: u8 },

    #[error("Expected {expected} dimension values, got {actual}")]
    DimensionCountMismatch { expected: usize, actual: usize },

    #[error("Value {value} does not fit in {bits} bits for dimension {dimension}")]
    ValueOverflow { dimension: usize, value: u64, bits: u8 },

    #[error("Expected a {expected}-byte key, got {actual} bytes")]
    KeySizeMismatch { expected: usize, actual: usize },

    #[error("Dimension {dimension} is outside a {count}-dimension key")]
    DimensionOutOfRange { dimension: usize, count: usize },

    #[error("Key layout {target:?} cannot hold keys of layout {source_bits:?}")]
    NotCoverable { target: Vec<u8>, source_bits: Vec<u8> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyGenError::ValueOverflow {
            dimension: 2,
            value: 17,
            bits: 4,
        };
        let display = format!("{}", err);
        assert!(display.contains("17"));
        assert!(display.contains("4 bits"));
    }
}
