//! Filter Range Tests
//!
//! Tests for the start/end keys derived from a block's filter:
//! - No filter scans from the minimum to the maximum key
//! - Conditions on dictionary dimensions narrow the range
//! - Contradictions produce an empty range
//! - Conditions the range cannot express keep the full range

mod common;

use blockscan::config::ScanConfig;
use blockscan::executor::FilterExecutor;
use blockscan::planner::{
    BlockExecutionPlan, FilterOperator, FilterResolverTree, KeyRange, PlannerErrorCode, QueryModel,
};
use blockscan::schema::MeasureValue;

use common::{block, dictionary_segment, model, Harness};

fn plan_with(filter: Option<FilterResolverTree>) -> BlockExecutionPlan {
    let mut harness = Harness::new(ScanConfig::default())
        .with_block("a.data", dictionary_segment(&[8, 8]), 1);
    let mut query: QueryModel = model()
        .with_block(block("a.data", 1))
        .with_dimension("d0")
        .with_dimension("d1");
    query.filter = filter;
    let mut plans = harness.plan(&query);
    harness.planner.finish().unwrap();
    plans.remove(0)
}

fn range(start: &[u8], end: &[u8]) -> KeyRange {
    KeyRange {
        start: start.to_vec(),
        end: end.to_vec(),
    }
}

// =============================================================================
// Unfiltered
// =============================================================================

#[test]
fn test_no_filter_spans_all_keys() {
    let plan = plan_with(None);
    assert!(plan.filter.is_none());
    assert_eq!(plan.range, range(&[0x00, 0x00], &[0xFF, 0xFF]));
}

// =============================================================================
// Narrowing
// =============================================================================

#[test]
fn test_equality_pins_dimension() {
    let plan = plan_with(Some(FilterResolverTree::dictionary("d0", FilterOperator::Equals, 5)));
    assert_eq!(plan.range, range(&[5, 0], &[5, 0xFF]));
}

#[test]
fn test_conjunction_narrows_both_dimensions() {
    let filter = FilterResolverTree::dictionary("d0", FilterOperator::Equals, 5).and(
        FilterResolverTree::dictionary("d1", FilterOperator::LessThanOrEqual, 3),
    );
    let plan = plan_with(Some(filter));
    assert_eq!(plan.range, range(&[5, 0], &[5, 3]));
}

#[test]
fn test_disjunction_spans_both_sides() {
    let filter = FilterResolverTree::dictionary("d0", FilterOperator::Equals, 2)
        .or(FilterResolverTree::dictionary("d0", FilterOperator::Equals, 9));
    let plan = plan_with(Some(filter));
    assert_eq!(plan.range, range(&[2, 0], &[9, 0xFF]));
}

#[test]
fn test_in_list_uses_min_and_max() {
    let plan = plan_with(Some(FilterResolverTree::dictionary_in("d1", &[40, 7, 12])));
    assert_eq!(plan.range, range(&[0, 7], &[0xFF, 40]));
}

#[test]
fn test_strict_bounds() {
    let plan = plan_with(Some(FilterResolverTree::dictionary("d0", FilterOperator::GreaterThan, 10)));
    assert_eq!(plan.range, range(&[11, 0], &[0xFF, 0xFF]));

    let plan = plan_with(Some(FilterResolverTree::dictionary("d0", FilterOperator::LessThan, 10)));
    assert_eq!(plan.range, range(&[0, 0], &[9, 0xFF]));
}

// =============================================================================
// Empty Ranges
// =============================================================================

#[test]
fn test_contradiction_is_empty() {
    let filter = FilterResolverTree::dictionary("d0", FilterOperator::GreaterThan, 5)
        .and(FilterResolverTree::dictionary("d0", FilterOperator::LessThan, 3));
    let plan = plan_with(Some(filter));
    assert!(plan.range.is_empty());
}

#[test]
fn test_less_than_zero_is_empty() {
    let plan = plan_with(Some(FilterResolverTree::dictionary("d1", FilterOperator::LessThan, 0)));
    assert!(plan.range.is_empty());
}

/// An empty side of a disjunction leaves the other side.
#[test]
fn test_empty_side_of_disjunction() {
    let filter = FilterResolverTree::dictionary("d1", FilterOperator::LessThan, 0)
        .or(FilterResolverTree::dictionary("d0", FilterOperator::Equals, 4));
    let plan = plan_with(Some(filter));
    assert_eq!(plan.range, range(&[4, 0], &[4, 0xFF]));
}

// =============================================================================
// Full Range
// =============================================================================

#[test]
fn test_negation_keeps_full_range() {
    let plan = plan_with(Some(FilterResolverTree::dictionary("d0", FilterOperator::NotEquals, 5)));
    assert_eq!(plan.range, range(&[0, 0], &[0xFF, 0xFF]));
    assert!(plan.filter.is_some());
}

#[test]
fn test_measure_condition_keeps_full_range() {
    let plan = plan_with(Some(FilterResolverTree::measure(
        "amount",
        FilterOperator::GreaterThan,
        MeasureValue::Long(100),
    )));
    assert_eq!(plan.range, range(&[0, 0], &[0xFF, 0xFF]));
    assert!(matches!(plan.filter, Some(FilterExecutor::Measure { group: 0, .. })));
}

/// A column the block does not have never matches.
#[test]
fn test_missing_column_matches_nothing() {
    let plan = plan_with(Some(FilterResolverTree::dictionary("added_later", FilterOperator::Equals, 1)));
    assert_eq!(plan.filter, Some(FilterExecutor::Constant(false)));
    assert_eq!(plan.range, range(&[0, 0], &[0xFF, 0xFF]));
}

// =============================================================================
// Binding Errors
// =============================================================================

#[test]
fn test_literal_type_mismatch_fails_block() {
    let mut harness = Harness::new(ScanConfig::default())
        .with_block("a.data", dictionary_segment(&[8]), 1);
    let query = model()
        .with_block(block("a.data", 1))
        .with_dimension("d0")
        .with_filter(FilterResolverTree::plain("d0", FilterOperator::Equals, "x"));

    let err = harness.planner.build_execution_plans(&query).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ScanPlanFilter);
    assert_eq!(err.block_id(), Some("Part0/Segment_0/a.data"));
    assert_eq!(harness.planner.metrics().snapshot().plan_failures, 1);
    harness.planner.finish().unwrap();
}

#[test]
fn test_measure_literal_on_long_column() {
    let plan = plan_with(Some(FilterResolverTree::measure(
        "amount",
        FilterOperator::LessThanOrEqual,
        MeasureValue::Double(2.5),
    )));
    assert!(matches!(plan.filter, Some(FilterExecutor::Measure { .. })));
}
