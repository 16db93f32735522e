//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use blockscan::cache::{MemoryBlockIndexCache, TableBlockInfo};
use blockscan::config::ScanConfig;
use blockscan::dictionary::NoDictionaries;
use blockscan::planner::{BlockExecutionPlan, QueryModel, QueryPlanner};
use blockscan::schema::{MeasureDataType, SegmentProperties, TableIdentity};

pub fn table() -> TableIdentity {
    TableIdentity::new("/store", "retail", "sales", "t-100")
}

pub fn block_path(name: &str) -> String {
    format!("/store/retail/sales/Fact/Part0/Segment_0/{}", name)
}

pub fn block(name: &str, blocklets: usize) -> TableBlockInfo {
    TableBlockInfo::new(block_path(name), "0", 0, blocklets)
}

/// Segment of single-column dictionary dimensions `d0..dn` plus one measure
pub fn dictionary_segment(bits: &[u8]) -> SegmentProperties {
    let mut builder = SegmentProperties::builder();
    for (i, &b) in bits.iter().enumerate() {
        builder = builder.dictionary(format!("d{}", i), b);
    }
    builder.measure("amount", MeasureDataType::Long).build().unwrap()
}

pub struct Harness {
    pub cache: Arc<MemoryBlockIndexCache>,
    pub planner: QueryPlanner,
}

impl Harness {
    pub fn new(config: ScanConfig) -> Self {
        let cache = Arc::new(MemoryBlockIndexCache::new());
        let planner = QueryPlanner::new(cache.clone(), Arc::new(NoDictionaries), config);
        Self { cache, planner }
    }

    pub fn with_block(self, name: &str, segment: SegmentProperties, blocklets: usize) -> Self {
        self.cache
            .register_block(&table(), block_path(name), "0", segment, blocklets);
        self
    }

    pub fn plan(&mut self, model: &QueryModel) -> Vec<BlockExecutionPlan> {
        self.planner.build_execution_plans(model).unwrap()
    }
}

pub fn model() -> QueryModel {
    QueryModel::new(table()).with_query_id("q-1")
}
