//! Query planner
//!
//! Turns a query model into one execution plan per selected block and owns
//! the query's resources until `finish`.
//!
//! Planning order:
//! 1. Sort the selected blocks by file path
//! 2. Evict invalid segments from the block cache, then load the blocks
//! 3. Choose the canonical key layout and derive the key structure
//! 4. Load the dictionaries the projection and filter need
//! 5. Build a plan per block
//!
//! A planner handles a single query. `finish` releases the block handles,
//! closes the result iterator and stops the worker pool.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{BlockHandle, BlockIndexCache};
use crate::config::ScanConfig;
use crate::dictionary::{build_mapping, DictionaryProvider};
use crate::observability::{
    log_event, Event, Logger, MetricsRegistry, ObservationScope, QueryStatisticsRecorder,
    LOAD_BLOCKS_EXECUTOR, LOAD_DICTIONARY, SCAN_BLOCKS_NUM,
};
use crate::schema::{DimensionKind, SegmentProperties, TableIdentity};

use super::block_plan::{BlockExecutionPlan, BlockPlanBuilder};
use super::errors::{PlannerError, PlannerResult};
use super::key_structure::{derive_key_structure, select_canonical_layout, KeyStructureInfo};
use super::model::QueryModel;
use super::teardown::TeardownPool;

/// Iterator over a query's scan results, closed by `finish`
pub trait QueryIterator: Send {
    fn close(&mut self);
}

struct QueryState {
    query_id: String,
    table: TableIdentity,
    blocks: Vec<BlockHandle>,
    key_structure: Option<Arc<KeyStructureInfo>>,
    pool: TeardownPool,
}

pub struct QueryPlanner {
    cache: Arc<dyn BlockIndexCache>,
    dictionaries: Arc<dyn DictionaryProvider>,
    config: ScanConfig,
    metrics: Arc<MetricsRegistry>,
    statistics: Option<Arc<QueryStatisticsRecorder>>,
    state: Option<QueryState>,
    iterator: Option<Box<dyn QueryIterator>>,
}

impl QueryPlanner {
    pub fn new(
        cache: Arc<dyn BlockIndexCache>,
        dictionaries: Arc<dyn DictionaryProvider>,
        config: ScanConfig,
    ) -> Self {
        Self {
            cache,
            dictionaries,
            config,
            metrics: Arc::new(MetricsRegistry::new()),
            statistics: None,
            state: None,
            iterator: None,
        }
    }

    /// Shares a metrics registry across planners
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Statistics of the current query, once planning has started
    pub fn statistics(&self) -> Option<Arc<QueryStatisticsRecorder>> {
        self.statistics.clone()
    }

    /// Canonical key structure of the current query
    pub fn key_structure(&self) -> Option<Arc<KeyStructureInfo>> {
        self.state.as_ref().and_then(|s| s.key_structure.clone())
    }

    /// Registers the iterator `finish` closes
    pub fn set_query_iterator(&mut self, iterator: Box<dyn QueryIterator>) {
        self.iterator = Some(iterator);
    }

    /// Builds one execution plan per selected block, in block order.
    ///
    /// Any block failing to plan fails the whole call; loaded handles stay
    /// owned by the planner and are released by `finish`.
    pub fn build_execution_plans(&mut self, model: &QueryModel) -> PlannerResult<Vec<BlockExecutionPlan>> {
        if self.state.is_some() {
            return Err(PlannerError::invalid_query(
                "Planner already holds a query; call finish first",
            ));
        }
        if model.blocks.is_empty() {
            return Err(PlannerError::invalid_query("Query selects no blocks"));
        }

        let scope = ObservationScope::with_fields(
            "PLAN",
            vec![
                ("query_id", model.query_id.clone()),
                ("table", model.table.table_name.clone()),
            ],
        );
        match self.plan(model) {
            Ok(plans) => {
                self.metrics.increment_queries_planned();
                scope.complete_with_fields(&[("blocks", &plans.len().to_string())]);
                Ok(plans)
            }
            Err(err) => {
                self.metrics.increment_plan_failures();
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    fn plan(&mut self, model: &QueryModel) -> PlannerResult<Vec<BlockExecutionPlan>> {
        let statistics = Arc::new(QueryStatisticsRecorder::new(model.query_id.clone()));
        self.statistics = Some(Arc::clone(&statistics));

        let mut infos = model.blocks.clone();
        infos.sort();

        if !model.invalid_segments.is_empty() {
            self.cache.invalidate(&model.table, &model.invalid_segments);
            log_event(
                Event::SegmentsInvalidated,
                &[("segments", &model.invalid_segments.join(","))],
            );
        }

        let pool = TeardownPool::new(self.config.teardown_workers)?;
        let started = Instant::now();
        let blocks = self.cache.load(&model.table, &infos)?;
        statistics.record(LOAD_BLOCKS_EXECUTOR, started.elapsed().as_millis() as u64);
        self.metrics.add_blocks_loaded(blocks.len() as u64);
        log_event(Event::BlocksLoaded, &[("count", &blocks.len().to_string())]);

        let state = self.state.insert(QueryState {
            query_id: model.query_id.clone(),
            table: model.table.clone(),
            blocks,
            key_structure: None,
            pool,
        });

        let layout = select_canonical_layout(&state.blocks)?;
        let reference = state.blocks[layout.reference].segment_properties();
        let key_structure = Arc::new(derive_key_structure(
            &model.dimensions,
            reference,
            layout.key_generator,
        )?);
        let dictionary_columns = dictionary_columns(model, reference);
        if key_structure.max_key().is_none() {
            self.metrics.increment_max_key_degradations();
        }
        state.key_structure = Some(Arc::clone(&key_structure));
        log_event(
            Event::KeyStructureDerived,
            &[
                ("bits", &key_structure.key_generator().total_bits().to_string()),
                ("key_size", &key_structure.key_size().to_string()),
                ("widened", &layout.widened.to_string()),
            ],
        );

        let started = Instant::now();
        let mapping = Arc::new(build_mapping(
            self.dictionaries.as_ref(),
            &model.table,
            dictionary_columns.iter().map(String::as_str),
        ));
        statistics.record(LOAD_DICTIONARY, started.elapsed().as_millis() as u64);

        let builder = BlockPlanBuilder::new(
            model,
            key_structure,
            mapping,
            self.config.column_read_batch_size,
        );
        let mut plans = Vec::with_capacity(infos.len());
        for (info, block) in infos.iter().zip(&state.blocks) {
            match builder.build(info, block) {
                Ok(plan) => {
                    self.metrics.increment_blocks_planned();
                    Logger::trace(
                        Event::BlockPlanned.as_str(),
                        &[
                            ("block_id", &plan.block_id),
                            ("remap", &plan.fixed_key_update_required.to_string()),
                        ],
                    );
                    plans.push(plan);
                }
                Err(err) => {
                    Logger::error(
                        Event::BlockPlanFailed.as_str(),
                        &[
                            ("block_id", err.block_id().unwrap_or("")),
                            ("error", &err.to_string()),
                        ],
                    );
                    return Err(err);
                }
            }
        }

        statistics.record(SCAN_BLOCKS_NUM, plans.len() as u64);
        log_event(
            Event::PlansBuilt,
            &[("query_id", &model.query_id), ("plans", &plans.len().to_string())],
        );
        Ok(plans)
    }

    /// Runs a cleanup job on the query's worker pool; `finish` waits for it
    pub fn submit_cleanup<F>(&self, job: F) -> PlannerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PlannerError::invalid_query("No query is being planned"))?;
        state.pool.submit(job)
    }

    /// Drops plans on the worker pool instead of the calling thread
    pub fn release_plans(&self, plans: Vec<BlockExecutionPlan>) -> PlannerResult<()> {
        self.submit_cleanup(move || drop(plans))
    }

    /// Releases the query's resources.
    ///
    /// Waits up to the configured teardown timeout for pool jobs; exceeding
    /// it is fatal. Calling `finish` without a planned query only closes the
    /// iterator.
    pub fn finish(&mut self) -> PlannerResult<()> {
        let query_id = self
            .state
            .as_ref()
            .map(|s| s.query_id.clone())
            .unwrap_or_default();
        let scope = ObservationScope::with_fields("QUERY_FINISH", vec![("query_id", query_id.clone())]);

        if let Some(mut iterator) = self.iterator.take() {
            iterator.close();
        }

        let Some(mut state) = self.state.take() else {
            scope.complete();
            return Ok(());
        };
        self.cache.release(&state.table, &state.blocks);
        let released = state.blocks.len();
        state.blocks.clear();

        let timeout = self.config.teardown_timeout();
        match state.pool.shutdown(timeout) {
            Ok(()) => {
                log_event(
                    Event::BlocksReleased,
                    &[("query_id", &query_id), ("released_blocks", &released.to_string())],
                );
                scope.complete();
                Ok(())
            }
            Err(err) => {
                self.metrics.increment_teardown_failures();
                log_event(Event::TeardownTimeout, &[("query_id", &query_id), ("error", &err.to_string())]);
                scope.fail_fatal(&err.to_string());
                Err(err)
            }
        }
    }
}

/// Columns whose dictionaries the plans carry: projected and filtered
/// dictionary dimensions plus dictionary-encoded complex children.
fn dictionary_columns(model: &QueryModel, reference: &SegmentProperties) -> BTreeSet<String> {
    let (filter_dimensions, _) = model.filter_columns();
    let mut columns = BTreeSet::new();
    let ids = model
        .dimensions
        .iter()
        .map(|d| d.column_id.as_str())
        .chain(filter_dimensions.iter().map(String::as_str));
    for id in ids {
        let Some(column) = reference.dimension_by_id(id) else {
            continue;
        };
        match column.kind() {
            DimensionKind::Dictionary { .. } => {
                columns.insert(id.to_string());
            }
            DimensionKind::Complex { children, .. } => {
                columns.extend(
                    children
                        .iter()
                        .filter(|c| c.dictionary_encoded)
                        .map(|c| c.column_id.clone()),
                );
            }
            DimensionKind::Plain => {}
        }
    }
    columns
}
