//! Block index cache interface
//!
//! The cache is shared by every query running against a table store and is
//! the only structure here that synchronizes internally. Planning borrows
//! reference-counted handles for the lifetime of one query and gives them
//! back through `release` when the query finishes.

mod block;
mod errors;
mod memory;

pub use block::{BlockHandle, BlockIndex, TableBlockInfo};
pub use errors::{CacheError, CacheResult};
pub use memory::MemoryBlockIndexCache;

use crate::schema::TableIdentity;

/// Thread-safe lookup of cached block indexes
pub trait BlockIndexCache: Send + Sync {
    /// Returns one handle per block, loading blocks not yet cached.
    ///
    /// Must be idempotent and load each block reference at most once even
    /// under concurrent calls.
    fn load(&self, table: &TableIdentity, blocks: &[TableBlockInfo]) -> CacheResult<Vec<BlockHandle>>;

    /// Drops cached blocks of deleted or compacted segments
    fn invalidate(&self, table: &TableIdentity, segment_ids: &[String]);

    /// Returns handles borrowed by a finished query
    fn release(&self, table: &TableIdentity, handles: &[BlockHandle]);
}
