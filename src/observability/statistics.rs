//! Per-query statistics
//!
//! Named, timestamped measurements recorded while a query is planned, such as
//! how long block loading took or how many blocks were planned.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const LOAD_BLOCKS_EXECUTOR: &str = "load_blocks_executor";
pub const LOAD_DICTIONARY: &str = "load_dictionary";
pub const SCAN_BLOCKS_NUM: &str = "scan_blocks_num";

/// One recorded statistic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStatistic {
    pub name: &'static str,
    /// Duration in milliseconds or a count, depending on the statistic
    pub value: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Collects statistics for one query
#[derive(Debug)]
pub struct QueryStatisticsRecorder {
    query_id: String,
    statistics: Mutex<Vec<QueryStatistic>>,
}

impl QueryStatisticsRecorder {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            statistics: Mutex::new(Vec::new()),
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn record(&self, name: &'static str, value: u64) {
        let mut statistics = self.statistics.lock().unwrap_or_else(PoisonError::into_inner);
        statistics.push(QueryStatistic {
            name,
            value,
            recorded_at: Utc::now(),
        });
    }

    /// Recorded statistics in recording order
    pub fn statistics(&self) -> Vec<QueryStatistic> {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest value recorded under `name`
    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let recorder = QueryStatisticsRecorder::new("q1");
        recorder.record(LOAD_BLOCKS_EXECUTOR, 12);
        recorder.record(SCAN_BLOCKS_NUM, 3);
        recorder.record(SCAN_BLOCKS_NUM, 4);

        assert_eq!(recorder.query_id(), "q1");
        assert_eq!(recorder.statistics().len(), 3);
        assert_eq!(recorder.value_of(SCAN_BLOCKS_NUM), Some(4));
        assert_eq!(recorder.value_of(LOAD_DICTIONARY), None);
    }
}
