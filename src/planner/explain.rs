//! Explain output for block execution plans
//!
//! Deterministic JSON summary of what a plan reads and how its keys relate
//! to the query's canonical layout. Keys are rendered as lowercase hex.

use std::fmt;

use serde::Serialize;

use super::block_plan::BlockExecutionPlan;
use super::errors::PlannerError;
use super::projection::ReadRange;

/// Explain output of one block plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPlan {
    pub block_id: String,
    pub start_blocklet: usize,
    pub blocklet_count: usize,
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    /// Measures the block predates, reported with their default
    pub defaulted_measures: Vec<String>,
    pub dictionary_groups: Vec<usize>,
    pub plain_groups: Vec<usize>,
    pub complex_parent_groups: Vec<usize>,
    pub dimension_reads: Vec<ReadRange>,
    pub measure_reads: Vec<ReadRange>,
    pub filtered: bool,
    pub start_key: String,
    pub end_key: String,
    pub key_remap: bool,
    pub canonical_bits: usize,
    pub vectorized: bool,
    pub raw_detail_query: bool,
}

impl ExplainPlan {
    pub fn from_plan(plan: &BlockExecutionPlan) -> Self {
        Self {
            block_id: plan.block_id.clone(),
            start_blocklet: plan.start_blocklet,
            blocklet_count: plan.blocklet_count,
            dimensions: plan
                .dimensions
                .iter()
                .map(|d| d.column.column_id().to_string())
                .collect(),
            measures: plan.measures.iter().map(|m| m.column_id.clone()).collect(),
            defaulted_measures: plan
                .measures
                .iter()
                .filter(|m| !m.exists())
                .map(|m| m.column_id.clone())
                .collect(),
            dictionary_groups: plan.dictionary_groups.clone(),
            plain_groups: plan.plain_groups.clone(),
            complex_parent_groups: plan.complex_parent_groups.clone(),
            dimension_reads: plan.dimension_read_ranges.clone(),
            measure_reads: plan.measure_read_ranges.clone(),
            filtered: plan.filter.is_some(),
            start_key: hex(&plan.range.start),
            end_key: hex(&plan.range.end),
            key_remap: plan.fixed_key_update_required,
            canonical_bits: plan.key_structure.key_generator().total_bits(),
            vectorized: plan.vectorized,
            raw_detail_query: plan.raw_detail_query,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BLOCK {}", self.block_id)?;
        writeln!(
            f,
            "  blocklets: {}..{}",
            self.start_blocklet,
            self.start_blocklet + self.blocklet_count
        )?;
        writeln!(f, "  dimensions: {}", self.dimensions.join(", "))?;
        writeln!(f, "  measures: {}", self.measures.join(", "))?;
        writeln!(f, "  range: [{}, {}]", self.start_key, self.end_key)?;
        write!(f, "  key remap: {}", self.key_remap)
    }
}

/// Explain output for a planning failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPlan {
    pub code: String,
    pub reason: String,
    pub block_id: Option<String>,
}

impl RejectedPlan {
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            code: err.code().code().to_string(),
            reason: err.message().to_string(),
            block_id: err.block_id().map(str::to_string),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::{BlockIndex, TableBlockInfo};
    use crate::planner::block_plan::BlockPlanBuilder;
    use crate::planner::key_structure::derive_key_structure;
    use crate::planner::QueryModel;
    use crate::schema::{MeasureDataType, SegmentProperties, TableIdentity};

    #[test]
    fn test_explain_json() {
        let table = TableIdentity::new("/s", "db", "t", "1");
        let segment = SegmentProperties::builder()
            .dictionary("a", 8)
            .measure("m", MeasureDataType::Long)
            .build()
            .unwrap();
        let model = QueryModel::new(table.clone())
            .with_dimension("a")
            .with_measure("m", MeasureDataType::Long)
            .with_measure("n", MeasureDataType::Long);
        let key_structure =
            Arc::new(derive_key_structure(&model.dimensions, &segment, segment.key_generator().clone()).unwrap());
        let block = Arc::new(BlockIndex::new("/s/db/t/Fact/Part0/b.data", "0", segment, 1));
        let plan = BlockPlanBuilder::new(&model, key_structure, Arc::default(), 10)
            .build(&TableBlockInfo::new("/s/db/t/Fact/Part0/b.data", "0", 0, 1), &block)
            .unwrap();

        let explain = ExplainPlan::from_plan(&plan);
        assert_eq!(explain.start_key, "00");
        assert_eq!(explain.end_key, "ff");
        assert_eq!(explain.defaulted_measures, vec!["n".to_string()]);

        let json = explain.to_json();
        assert_eq!(json["block_id"], "Part0/b.data");
        assert_eq!(json["dimension_reads"][0]["start"], 0);
        assert!(explain.to_string().starts_with("BLOCK Part0/b.data"));
    }

    #[test]
    fn test_rejected_plan() {
        let err = PlannerError::filter("bad literal").for_block("Part0/b.data");
        let rejected = RejectedPlan::from_error(&err);
        assert_eq!(rejected.code, "SCAN_PLAN_FILTER");
        assert_eq!(rejected.block_id.as_deref(), Some("Part0/b.data"));
    }
}
