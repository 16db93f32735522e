//! Block-level query planning
//!
//! Turns a query model into one immutable execution plan per selected
//! block.
//!
//! # Flow
//!
//! 1. Load block indexes through the block cache
//! 2. Reconcile block key layouts into one canonical key structure
//! 3. Resolve the projection against each block's schema
//! 4. Bind the filter and derive each block's start/end keys
//! 5. Assemble the block execution plans
//!
//! Blocks written under older schemas stay readable: columns are matched by
//! stable id and keys are re-encoded into the canonical layout on demand.

mod block_plan;
mod errors;
mod explain;
mod filter;
mod key_structure;
mod model;
mod planner;
mod projection;
mod resolver;
mod teardown;

pub use block_plan::{
    AggregatorInfo, BlockExecutionPlan, BlockPlanBuilder, ColumnGroupKeyInfo, ComplexDimensionInfo,
};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::{ExplainPlan, RejectedPlan};
pub use filter::{compile_filter, FilterPlan, KeyRange};
pub use key_structure::{
    derive_key_structure, max_key_hint, select_canonical_layout, CanonicalLayout, KeyStructureInfo,
};
pub use model::{QueryDimension, QueryMeasure, QueryModel};
pub use planner::{QueryIterator, QueryPlanner};
pub use projection::{
    compact_read_ranges, dictionary_group_indexes, resolve_projection, restructure_dimensions,
    restructure_measures, ProjectionInfo, ReadRange, ResolvedDimension, ResolvedMeasure,
};
pub use resolver::{ConditionResolver, FilterColumn, FilterOperator, FilterResolverTree, FilterValue};
pub use teardown::TeardownPool;
