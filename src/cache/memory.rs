//! In-memory block index cache
//!
//! Holds persisted block metadata registered up front and hands out shared
//! handles on load. Loads happen under the cache lock, so a block reference
//! is loaded at most once no matter how many queries ask for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::schema::{SegmentProperties, TableIdentity};

use super::block::{BlockHandle, BlockIndex, TableBlockInfo};
use super::errors::{CacheError, CacheResult};
use super::BlockIndexCache;

type BlockKey = (TableIdentity, String);

struct PersistedBlock {
    segment_id: String,
    segment: SegmentProperties,
    total_blocklets: usize,
}

struct CacheEntry {
    handle: BlockHandle,
    access_count: usize,
}

/// Block index cache backed by process memory
#[derive(Default)]
pub struct MemoryBlockIndexCache {
    persisted: Mutex<HashMap<BlockKey, PersistedBlock>>,
    loaded: Mutex<HashMap<BlockKey, CacheEntry>>,
    loads: AtomicU64,
}

impl MemoryBlockIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the metadata of a persisted block
    pub fn register_block(
        &self,
        table: &TableIdentity,
        file_path: impl Into<String>,
        segment_id: impl Into<String>,
        segment: SegmentProperties,
        total_blocklets: usize,
    ) {
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        persisted.insert(
            (table.clone(), file_path.into()),
            PersistedBlock {
                segment_id: segment_id.into(),
                segment,
                total_blocklets,
            },
        );
    }

    /// Number of loads that actually built a block index
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Outstanding handles for a block, `None` if it is not loaded
    pub fn access_count(&self, table: &TableIdentity, file_path: &str) -> Option<usize> {
        let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        loaded
            .get(&(table.clone(), file_path.to_string()))
            .map(|e| e.access_count)
    }
}

impl BlockIndexCache for MemoryBlockIndexCache {
    fn load(&self, table: &TableIdentity, blocks: &[TableBlockInfo]) -> CacheResult<Vec<BlockHandle>> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);

        // Nothing is counted until every block resolves.
        let mut fresh: HashMap<BlockKey, BlockHandle> = HashMap::new();
        {
            let persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
            for block in blocks {
                let key = (table.clone(), block.file_path.clone());
                if loaded.contains_key(&key) || fresh.contains_key(&key) {
                    continue;
                }
                let meta = persisted
                    .get(&key)
                    .ok_or_else(|| CacheError::BlockNotFound(block.file_path.clone()))?;
                let handle = Arc::new(BlockIndex::new(
                    block.file_path.clone(),
                    meta.segment_id.clone(),
                    meta.segment.clone(),
                    meta.total_blocklets,
                ));
                fresh.insert(key, handle);
            }
        }

        let mut handles = Vec::with_capacity(blocks.len());
        for block in blocks {
            let key = (table.clone(), block.file_path.clone());
            if let Some(handle) = fresh.remove(&key) {
                self.loads.fetch_add(1, Ordering::Relaxed);
                loaded.insert(
                    key.clone(),
                    CacheEntry {
                        handle,
                        access_count: 0,
                    },
                );
            }
            if let Some(entry) = loaded.get_mut(&key) {
                entry.access_count += 1;
                handles.push(Arc::clone(&entry.handle));
            }
        }
        Ok(handles)
    }

    fn invalidate(&self, table: &TableIdentity, segment_ids: &[String]) {
        if segment_ids.is_empty() {
            return;
        }
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        loaded.retain(|(t, _), entry| {
            t != table || !segment_ids.iter().any(|s| s == entry.handle.segment_id())
        });
    }

    fn release(&self, table: &TableIdentity, handles: &[BlockHandle]) {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles {
            let key = (table.clone(), handle.file_path().to_string());
            if let Some(entry) = loaded.get_mut(&key) {
                entry.access_count = entry.access_count.saturating_sub(1);
            }
        }
    }
}
