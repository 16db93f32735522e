//! Observability for query planning
//!
//! - Structured JSON logging with deterministic field order
//! - Typed lifecycle events
//! - Atomic counters shared across queries
//! - Begin/complete scopes
//! - Per-query statistics
//!
//! Observability never changes planning results and never fails a query.

mod events;
mod logger;
mod metrics;
mod scope;
mod statistics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;
pub use statistics::{
    QueryStatistic, QueryStatisticsRecorder, LOAD_BLOCKS_EXECUTOR, LOAD_DICTIONARY, SCAN_BLOCKS_NUM,
};

/// Logs a lifecycle event at INFO, or FATAL for fatal events
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
