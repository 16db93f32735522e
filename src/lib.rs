//! blockscan - block-level scan planning for a columnar table store
//!
//! Given a query model (projected dimensions and measures plus an optional
//! resolved filter), the planner loads the relevant blocks, reconciles their
//! key layouts against one canonical key structure and compiles an immutable
//! execution plan per block. The executor side turns decoded column chunks
//! and a row mapping into rows or column vectors.

pub mod cache;
pub mod config;
pub mod dictionary;
pub mod executor;
pub mod keygen;
pub mod observability;
pub mod planner;
pub mod schema;
