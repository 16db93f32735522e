//! Query Lifecycle Tests
//!
//! Tests for planner ownership of query resources:
//! - Block handles are borrowed from the cache until `finish`
//! - `finish` closes the result iterator and drains the worker pool
//! - A worker pool that misses the teardown timeout is fatal
//! - Invalid segments are evicted before blocks are loaded

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blockscan::cache::{BlockIndexCache, TableBlockInfo};
use blockscan::config::ScanConfig;
use blockscan::observability::{LOAD_BLOCKS_EXECUTOR, SCAN_BLOCKS_NUM};
use blockscan::planner::{PlannerErrorCode, QueryIterator, Severity};
use tempfile::TempDir;

use common::{block, block_path, dictionary_segment, model, table, Harness};

struct FlagIterator(Arc<AtomicBool>);

impl QueryIterator for FlagIterator {
    fn close(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn harness(config: ScanConfig) -> Harness {
    Harness::new(config)
        .with_block("a.data", dictionary_segment(&[8]), 1)
        .with_block("b.data", dictionary_segment(&[8]), 1)
}

// =============================================================================
// Finish
// =============================================================================

/// Finish gives every handle back and closes the iterator.
#[test]
fn test_finish_releases_everything() {
    let mut harness = harness(ScanConfig::default());
    let query = model()
        .with_block(block("a.data", 1))
        .with_block(block("b.data", 1))
        .with_dimension("d0");

    let plans = harness.plan(&query);
    assert_eq!(harness.cache.access_count(&table(), &block_path("a.data")), Some(1));

    let closed = Arc::new(AtomicBool::new(false));
    harness
        .planner
        .set_query_iterator(Box::new(FlagIterator(Arc::clone(&closed))));
    harness.planner.release_plans(plans).unwrap();

    harness.planner.finish().unwrap();
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(harness.cache.access_count(&table(), &block_path("a.data")), Some(0));
    assert_eq!(harness.cache.access_count(&table(), &block_path("b.data")), Some(0));
}

/// Cleanup jobs complete before finish returns.
#[test]
fn test_finish_waits_for_cleanup() {
    let mut harness = Harness::new(ScanConfig {
        teardown_workers: 2,
        ..ScanConfig::default()
    })
    .with_block("a.data", dictionary_segment(&[8]), 1);
    harness.plan(&model().with_block(block("a.data", 1)));

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let done = Arc::clone(&done);
        harness
            .planner
            .submit_cleanup(move || {
                std::thread::sleep(Duration::from_millis(10));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    harness.planner.finish().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 4);
}

/// A pool still busy at the deadline fails finish with a fatal error.
#[test]
fn test_teardown_timeout_is_fatal() {
    let mut harness = Harness::new(ScanConfig {
        teardown_timeout_ms: 20,
        ..ScanConfig::default()
    })
    .with_block("a.data", dictionary_segment(&[8]), 1);
    harness.plan(&model().with_block(block("a.data", 1)));

    harness
        .planner
        .submit_cleanup(|| std::thread::sleep(Duration::from_millis(500)))
        .unwrap();

    let err = harness.planner.finish().unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ScanQueryTeardown);
    assert_eq!(err.severity(), Severity::Fatal);
    assert!(err.to_string().starts_with("[FATAL] SCAN_QUERY_TEARDOWN"));
    assert_eq!(harness.planner.metrics().snapshot().teardown_failures, 1);

    // handles were released before the pool was drained
    assert_eq!(harness.cache.access_count(&table(), &block_path("a.data")), Some(0));
}

// =============================================================================
// Planning Errors
// =============================================================================

#[test]
fn test_unknown_block_fails_load() {
    let mut harness = harness(ScanConfig::default());
    let query = model().with_block(block("missing.data", 1));

    let err = harness.planner.build_execution_plans(&query).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ScanPlanBlockLoad);
    assert!(!err.is_fatal());
    harness.planner.finish().unwrap();
}

/// A batch with one unknown block borrows nothing from the cache.
#[test]
fn test_partial_load_failure_borrows_nothing() {
    let mut harness = harness(ScanConfig::default());
    let query = model()
        .with_block(block("a.data", 1))
        .with_block(block("missing.data", 1));

    let err = harness.planner.build_execution_plans(&query).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ScanPlanBlockLoad);
    harness.planner.finish().unwrap();

    let count = harness.cache.access_count(&table(), &block_path("a.data"));
    assert!(matches!(count, None | Some(0)), "leaked handle count: {count:?}");
}

#[test]
fn test_query_without_blocks_rejected() {
    let mut harness = harness(ScanConfig::default());
    let err = harness.planner.build_execution_plans(&model()).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ScanPlanInvalidQuery);
}

// =============================================================================
// Segments and Statistics
// =============================================================================

/// Invalid segments are evicted, so their blocks load afresh.
#[test]
fn test_invalid_segments_evicted() {
    let mut harness = harness(ScanConfig::default());
    let query = model().with_block(block("a.data", 1));

    harness.plan(&query);
    harness.planner.finish().unwrap();
    assert_eq!(harness.cache.load_count(), 1);

    let mut query = query;
    query.invalid_segments = vec!["0".to_string()];
    harness.plan(&query);
    harness.planner.finish().unwrap();
    assert_eq!(harness.cache.load_count(), 2);
}

#[test]
fn test_statistics_recorded() {
    let mut harness = harness(ScanConfig::default());
    let query = model()
        .with_block(block("a.data", 1))
        .with_block(block("b.data", 1));
    harness.plan(&query);

    let statistics = harness.planner.statistics().unwrap();
    assert_eq!(statistics.query_id(), "q-1");
    assert_eq!(statistics.value_of(SCAN_BLOCKS_NUM), Some(2));
    assert!(statistics.value_of(LOAD_BLOCKS_EXECUTOR).is_some());

    let snapshot = harness.planner.metrics().snapshot();
    assert_eq!(snapshot.queries_planned, 1);
    assert_eq!(snapshot.blocks_loaded, 2);
    harness.planner.finish().unwrap();
}

// =============================================================================
// Configuration
// =============================================================================

/// Planner honours a config loaded from disk.
#[test]
fn test_config_file_drives_planner() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.json");
    std::fs::write(&path, r#"{"column_read_batch_size": 1, "teardown_workers": 2}"#).unwrap();
    let config = ScanConfig::load(&path).unwrap();

    let mut harness = Harness::new(config).with_block("a.data", dictionary_segment(&[8, 8, 8]), 1);
    let plans = harness.plan(
        &model()
            .with_block(block("a.data", 1))
            .with_dimension("d0")
            .with_dimension("d1"),
    );
    assert_eq!(plans[0].dimension_read_ranges.len(), 2);
    assert_eq!(harness.planner.config().teardown_workers, 2);
    harness.planner.finish().unwrap();
}

#[test]
fn test_invalid_config_file_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.json");
    std::fs::write(&path, r#"{"teardown_workers": 0}"#).unwrap();
    assert!(ScanConfig::load(&path).is_err());
}

/// Cache handles shared with other planners stay loaded.
#[test]
fn test_cache_shared_between_planners() {
    let mut first = harness(ScanConfig::default());
    let query = model().with_block(block("a.data", 1));
    first.plan(&query);

    let blocks = vec![TableBlockInfo::new(block_path("a.data"), "0", 0, 1)];
    let handles = first.cache.load(&table(), &blocks).unwrap();
    assert_eq!(first.cache.access_count(&table(), &block_path("a.data")), Some(2));

    first.planner.finish().unwrap();
    assert_eq!(first.cache.access_count(&table(), &block_path("a.data")), Some(1));
    first.cache.release(&table(), &handles);
}
