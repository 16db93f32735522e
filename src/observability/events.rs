//! Typed planner lifecycle events

use std::fmt;

/// Observable events of one query's planning and teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Stale segments evicted from the block cache
    SegmentsInvalidated,
    /// Block indexes loaded from the cache
    BlocksLoaded,
    /// Canonical key structure chosen
    KeyStructureDerived,
    /// Canonical generator widened to cover every block
    KeyStructureWidened,
    /// Max key hint could not be computed
    MaxKeyDegraded,
    /// Execution plan built for a block
    BlockPlanned,
    /// Execution plan for a block failed
    BlockPlanFailed,
    /// All block plans built
    PlansBuilt,
    /// Block handles handed back to the cache
    BlocksReleased,
    /// Teardown pool did not stop in time (FATAL)
    TeardownTimeout,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SegmentsInvalidated => "SEGMENTS_INVALIDATED",
            Event::BlocksLoaded => "BLOCKS_LOADED",
            Event::KeyStructureDerived => "KEY_STRUCTURE_DERIVED",
            Event::KeyStructureWidened => "KEY_STRUCTURE_WIDENED",
            Event::MaxKeyDegraded => "MAX_KEY_DEGRADED",
            Event::BlockPlanned => "BLOCK_PLANNED",
            Event::BlockPlanFailed => "BLOCK_PLAN_FAILED",
            Event::PlansBuilt => "PLANS_BUILT",
            Event::BlocksReleased => "BLOCKS_RELEASED",
            Event::TeardownTimeout => "TEARDOWN_TIMEOUT",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::TeardownTimeout)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
