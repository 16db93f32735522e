//! Scan result error types
//!
//! Error codes:
//! - SCAN_CURSOR_OUT_OF_RANGE (ERROR)
//! - SCAN_CHUNK_MISSING (ERROR)
//! - SCAN_VECTOR_MISMATCH (ERROR)
//! - SCAN_DECODE_FAILED (ERROR)

use std::fmt;

use crate::keygen::KeyGenError;

/// Scan result error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Row cursor moved past the mapped rows or read before the first advance
    ScanCursorOutOfRange,
    /// A column group the plan needs was not read
    ScanChunkMissing,
    /// Output vectors do not match the plan's columns
    ScanVectorMismatch,
    /// Chunk bytes could not be decoded
    ScanDecodeFailed,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::ScanCursorOutOfRange => "SCAN_CURSOR_OUT_OF_RANGE",
            ExecutorErrorCode::ScanChunkMissing => "SCAN_CHUNK_MISSING",
            ExecutorErrorCode::ScanVectorMismatch => "SCAN_VECTOR_MISMATCH",
            ExecutorErrorCode::ScanDecodeFailed => "SCAN_DECODE_FAILED",
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Scan result error with context
#[derive(Debug, Clone)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    /// Column group involved, if any
    group: Option<usize>,
}

impl ExecutorError {
    pub fn cursor_out_of_range(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ScanCursorOutOfRange,
            message: reason.into(),
            group: None,
        }
    }

    pub fn chunk_missing(group: usize, family: &str) -> Self {
        Self {
            code: ExecutorErrorCode::ScanChunkMissing,
            message: format!("No {} chunk read for column group", family),
            group: Some(group),
        }
    }

    pub fn vector_mismatch(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ScanVectorMismatch,
            message: reason.into(),
            group: None,
        }
    }

    pub fn decode_failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ScanDecodeFailed,
            message: reason.into(),
            group: None,
        }
    }

    pub fn in_group(mut self, group: usize) -> Self {
        self.group = Some(group);
        self
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn group(&self) -> Option<usize> {
        self.group
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code, self.message)?;
        if let Some(group) = self.group {
            write!(f, " [group {}]", group)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutorError {}

impl From<KeyGenError> for ExecutorError {
    fn from(err: KeyGenError) -> Self {
        ExecutorError::decode_failed(err.to_string())
    }
}

/// Result type for scan result operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ExecutorErrorCode::ScanCursorOutOfRange.code(),
            "SCAN_CURSOR_OUT_OF_RANGE"
        );
        assert_eq!(ExecutorErrorCode::ScanChunkMissing.code(), "SCAN_CHUNK_MISSING");
        assert_eq!(ExecutorErrorCode::ScanVectorMismatch.code(), "SCAN_VECTOR_MISMATCH");
        assert_eq!(ExecutorErrorCode::ScanDecodeFailed.code(), "SCAN_DECODE_FAILED");
    }

    #[test]
    fn test_display_with_group() {
        let err = ExecutorError::chunk_missing(4, "measure");
        let display = err.to_string();
        assert!(display.starts_with("[ERROR] SCAN_CHUNK_MISSING"));
        assert!(display.contains("[group 4]"));
    }

    #[test]
    fn test_from_keygen_error() {
        let err: ExecutorError = KeyGenError::KeySizeMismatch {
            expected: 2,
            actual: 3,
        }
        .into();
        assert_eq!(err.code(), ExecutorErrorCode::ScanDecodeFailed);
    }
}
