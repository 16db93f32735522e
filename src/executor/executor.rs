//! Blocklet scanner for one block execution plan
//!
//! Reads the blocklets a plan covers in order, applies the plan's filter
//! and hands out one `ScannedResult` per blocklet. The scanner never
//! reorders blocklets and never skips empty ones.

use crate::planner::BlockExecutionPlan;

use super::chunk::ChunkReader;
use super::errors::ExecutorResult;
use super::result::ScannedResult;

/// Scans the blocklets of one plan through a chunk reader
pub struct BlockScanner<'a, R: ChunkReader> {
    plan: &'a BlockExecutionPlan,
    reader: &'a R,
    next_blocklet: usize,
}

impl<'a, R: ChunkReader> BlockScanner<'a, R> {
    /// Creates a scanner positioned at the plan's first blocklet
    pub fn new(plan: &'a BlockExecutionPlan, reader: &'a R) -> Self {
        Self {
            plan,
            reader,
            next_blocklet: plan.start_blocklet,
        }
    }

    fn end_blocklet(&self) -> usize {
        self.plan.start_blocklet + self.plan.blocklet_count
    }

    /// Blocklets not yet scanned
    pub fn remaining(&self) -> usize {
        self.end_blocklet().saturating_sub(self.next_blocklet)
    }

    /// Reads and filters the next blocklet, `None` once the plan is exhausted.
    ///
    /// A failed read still consumes the blocklet.
    pub fn next_blocklet(&mut self) -> Option<ExecutorResult<ScannedResult<'a>>> {
        if self.next_blocklet >= self.end_blocklet() {
            return None;
        }
        let blocklet = self.next_blocklet;
        self.next_blocklet += 1;

        let result = self
            .reader
            .read_blocklet(self.plan, blocklet)
            .and_then(|chunks| ScannedResult::filtered(self.plan, chunks))
            .map(|result| result.with_blocklet(blocklet));
        Some(result)
    }

    /// Total rows selected by the filter across the remaining blocklets
    pub fn count_rows(mut self) -> ExecutorResult<usize> {
        let mut total = 0;
        while let Some(result) = self.next_blocklet() {
            total += result?.row_count();
        }
        Ok(total)
    }
}

impl<'a, R: ChunkReader> Iterator for BlockScanner<'a, R> {
    type Item = ExecutorResult<ScannedResult<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_blocklet()
    }
}
