//! Block references and cached block indexes

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::SegmentProperties;

/// Reference to a persisted block and the blocklets a query scans in it.
///
/// Blocks order by file path so scans visit them deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableBlockInfo {
    pub file_path: String,
    pub segment_id: String,
    pub start_blocklet: usize,
    pub blocklet_count: usize,
}

impl TableBlockInfo {
    pub fn new(
        file_path: impl Into<String>,
        segment_id: impl Into<String>,
        start_blocklet: usize,
        blocklet_count: usize,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            segment_id: segment_id.into(),
            start_blocklet,
            blocklet_count,
        }
    }
}

impl Ord for TableBlockInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file_path
            .cmp(&other.file_path)
            .then(self.start_blocklet.cmp(&other.start_blocklet))
            .then(self.segment_id.cmp(&other.segment_id))
            .then(self.blocklet_count.cmp(&other.blocklet_count))
    }
}

impl PartialOrd for TableBlockInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Loaded metadata of one block, owned by the cache
#[derive(Debug)]
pub struct BlockIndex {
    file_path: String,
    segment_id: String,
    segment: SegmentProperties,
    total_blocklets: usize,
}

impl BlockIndex {
    pub fn new(
        file_path: impl Into<String>,
        segment_id: impl Into<String>,
        segment: SegmentProperties,
        total_blocklets: usize,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            segment_id: segment_id.into(),
            segment,
            total_blocklets,
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub fn segment_properties(&self) -> &SegmentProperties {
        &self.segment
    }

    pub fn total_blocklets(&self) -> usize {
        self.total_blocklets
    }
}

/// Shared handle to a cached block index
pub type BlockHandle = Arc<BlockIndex>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_order_by_path() {
        let mut blocks = vec![
            TableBlockInfo::new("/t/Fact/b.data", "1", 0, 1),
            TableBlockInfo::new("/t/Fact/a.data", "2", 0, 1),
        ];
        blocks.sort();
        assert_eq!(blocks[0].file_path, "/t/Fact/a.data");
    }
}
