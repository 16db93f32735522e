//! Scan result materialization
//!
//! Consumes block execution plans and the decoded chunks of their blocklets.
//!
//! # Flow
//!
//! 1. Read the blocklet's column groups through a `ChunkReader`
//! 2. Apply the plan's filter to get the row mapping
//! 3. Expose the mapped rows row by row or as column vectors
//!
//! # Invariants
//!
//! - Row-wise and columnar output agree value for value
//! - Rows are returned in the order the mapping lists them
//! - Measures a block predates report their default value

mod chunk;
mod errors;
mod executor;
mod filters;
mod result;
mod row_mapping;
mod vector;

pub use chunk::{
    BlockletChunks, ChunkReader, DimensionChunk, FixedLengthChunk, MeasureChunk, MeasureValues,
    VariableLengthChunk,
};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult};
pub use executor::BlockScanner;
pub use filters::{DictionaryLocator, FilterExecutor, ValuePredicate};
pub use result::ScannedResult;
pub use row_mapping::RowMapping;
pub use vector::ColumnVector;
