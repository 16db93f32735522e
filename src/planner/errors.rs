//! Planner error types
//!
//! Error codes:
//! - SCAN_PLAN_INVALID_QUERY (ERROR)
//! - SCAN_PLAN_BLOCK_LOAD (ERROR)
//! - SCAN_PLAN_KEY_STRUCTURE (ERROR)
//! - SCAN_PLAN_RANGE_KEY (ERROR)
//! - SCAN_PLAN_FILTER (ERROR)
//! - SCAN_PLAN_WORKER_POOL (ERROR)
//! - SCAN_QUERY_TEARDOWN (FATAL)
//!
//! Planning errors are block scoped: the failing block gets no plan at all.
//! A teardown error ends the query lifecycle.

use std::fmt;

use crate::cache::CacheError;
use crate::keygen::KeyGenError;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Planning failed; the query cannot run
    Error,
    /// Query resources may have leaked and must be reclaimed elsewhere
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Planner error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Malformed query model
    ScanPlanInvalidQuery,
    /// Block index cache could not load a block
    ScanPlanBlockLoad,
    /// Canonical or column-group key structure could not be derived
    ScanPlanKeyStructure,
    /// Default start/end range key could not be encoded
    ScanPlanRangeKey,
    /// Filter could not be bound to a block layout
    ScanPlanFilter,
    /// Per-query worker pool could not be started
    ScanPlanWorkerPool,
    /// Teardown pool failed to stop in time
    ScanQueryTeardown,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::ScanPlanInvalidQuery => "SCAN_PLAN_INVALID_QUERY",
            PlannerErrorCode::ScanPlanBlockLoad => "SCAN_PLAN_BLOCK_LOAD",
            PlannerErrorCode::ScanPlanKeyStructure => "SCAN_PLAN_KEY_STRUCTURE",
            PlannerErrorCode::ScanPlanRangeKey => "SCAN_PLAN_RANGE_KEY",
            PlannerErrorCode::ScanPlanFilter => "SCAN_PLAN_FILTER",
            PlannerErrorCode::ScanPlanWorkerPool => "SCAN_PLAN_WORKER_POOL",
            PlannerErrorCode::ScanQueryTeardown => "SCAN_QUERY_TEARDOWN",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::ScanQueryTeardown => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error with context
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    /// Block the error is scoped to, if any
    block_id: Option<String>,
}

impl PlannerError {
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanInvalidQuery,
            message: reason.into(),
            block_id: None,
        }
    }

    pub fn block_load(err: CacheError) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanBlockLoad,
            message: err.to_string(),
            block_id: None,
        }
    }

    pub fn key_structure(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanKeyStructure,
            message: reason.into(),
            block_id: None,
        }
    }

    pub fn range_key(err: KeyGenError) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanRangeKey,
            message: format!("Failed to encode range key: {}", err),
            block_id: None,
        }
    }

    pub fn filter(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanFilter,
            message: reason.into(),
            block_id: None,
        }
    }

    pub fn worker_pool(err: std::io::Error) -> Self {
        Self {
            code: PlannerErrorCode::ScanPlanWorkerPool,
            message: format!("Failed to start worker pool: {}", err),
            block_id: None,
        }
    }

    pub fn teardown(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::ScanQueryTeardown,
            message: reason.into(),
            block_id: None,
        }
    }

    /// Scopes the error to a block
    pub fn for_block(mut self, block_id: impl Into<String>) -> Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn block_id(&self) -> Option<&str> {
        self.block_id.as_deref()
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(block_id) = &self.block_id {
            write!(f, " [block {}]", block_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for PlannerError {}

impl From<CacheError> for PlannerError {
    fn from(err: CacheError) -> Self {
        PlannerError::block_load(err)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
