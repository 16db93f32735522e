//! Query model handed to the planner
//!
//! Owned by the caller and read-only during planning.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::cache::TableBlockInfo;
use crate::schema::{MeasureDataType, MeasureValue, TableIdentity};

use super::resolver::FilterResolverTree;

/// Requested dimension, identified by stable column id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDimension {
    pub column_id: String,
    /// Position in the query's projection
    pub query_order: usize,
}

/// Requested measure
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMeasure {
    pub column_id: String,
    pub data_type: MeasureDataType,
    /// Position in the query's projection
    pub query_order: usize,
    /// Value reported by blocks written before the measure was added
    pub default_value: Option<MeasureValue>,
}

/// Projection, filter and options of one query
#[derive(Debug, Clone)]
pub struct QueryModel {
    pub query_id: String,
    pub table: TableIdentity,
    /// Blocks selected for the query
    pub blocks: Vec<TableBlockInfo>,
    pub dimensions: Vec<QueryDimension>,
    pub measures: Vec<QueryMeasure>,
    pub filter: Option<FilterResolverTree>,
    /// Carry nested children of complex columns into the plans
    pub need_complex_children: bool,
    /// Decode as column vectors rather than row iteration
    pub vector_reader: bool,
    /// Emit raw rows without aggregation
    pub raw_detail_query: bool,
    /// Segments removed by compaction or deletion
    pub invalid_segments: Vec<String>,
}

impl QueryModel {
    /// Creates an empty query against a table with a fresh query id
    pub fn new(table: TableIdentity) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            table,
            blocks: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
            filter: None,
            need_complex_children: true,
            vector_reader: false,
            raw_detail_query: false,
            invalid_segments: Vec::new(),
        }
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = query_id.into();
        self
    }

    pub fn with_block(mut self, block: TableBlockInfo) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_dimension(mut self, column_id: impl Into<String>) -> Self {
        let query_order = self.dimensions.len() + self.measures.len();
        self.dimensions.push(QueryDimension {
            column_id: column_id.into(),
            query_order,
        });
        self
    }

    pub fn with_measure(self, column_id: impl Into<String>, data_type: MeasureDataType) -> Self {
        self.push_measure(column_id.into(), data_type, None)
    }

    /// Measure with the value reported by blocks that predate it
    pub fn with_measure_default(
        self,
        column_id: impl Into<String>,
        data_type: MeasureDataType,
        default_value: MeasureValue,
    ) -> Self {
        self.push_measure(column_id.into(), data_type, Some(default_value))
    }

    fn push_measure(mut self, column_id: String, data_type: MeasureDataType, default_value: Option<MeasureValue>) -> Self {
        let query_order = self.dimensions.len() + self.measures.len();
        self.measures.push(QueryMeasure {
            column_id,
            data_type,
            query_order,
            default_value,
        });
        self
    }

    pub fn with_filter(mut self, filter: FilterResolverTree) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_vector_reader(mut self, vector_reader: bool) -> Self {
        self.vector_reader = vector_reader;
        self
    }

    pub fn with_raw_detail_query(mut self, raw_detail_query: bool) -> Self {
        self.raw_detail_query = raw_detail_query;
        self
    }

    pub fn with_complex_children(mut self, need_complex_children: bool) -> Self {
        self.need_complex_children = need_complex_children;
        self
    }

    pub fn with_invalid_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.invalid_segments.push(segment_id.into());
        self
    }

    /// Column ids the filter reads, split into dimensions and measures
    pub fn filter_columns(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut dimensions = BTreeSet::new();
        let mut measures = BTreeSet::new();
        if let Some(filter) = &self.filter {
            filter.collect_columns(&mut dimensions, &mut measures);
        }
        (dimensions, measures)
    }
}
