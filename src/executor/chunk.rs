//! Decoded column chunks of one blocklet
//!
//! Chunks are indexed by physical row. Dictionary groups store fixed-width
//! big-endian codes (or the packed group key for multi-column groups); plain
//! and complex groups store one byte sequence per row.

use std::collections::BTreeMap;

use crate::keygen::{KeyGenResult, KeyGenerator};
use crate::schema::MeasureValue;

use super::errors::{ExecutorError, ExecutorResult};

/// Fixed-width rows in one contiguous buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLengthChunk {
    value_size: usize,
    data: Vec<u8>,
}

impl FixedLengthChunk {
    pub fn new(value_size: usize, data: Vec<u8>) -> Self {
        Self { value_size, data }
    }

    /// Encodes one code per row as `value_size` big-endian bytes
    pub fn from_codes(value_size: usize, codes: &[u64]) -> Self {
        let mut data = Vec::with_capacity(value_size * codes.len());
        for &code in codes {
            let bytes = code.to_be_bytes();
            let width = value_size.min(bytes.len());
            data.extend(std::iter::repeat(0u8).take(value_size - width));
            data.extend_from_slice(&bytes[bytes.len() - width..]);
        }
        Self::new(value_size, data)
    }

    /// Packs each row's codes with a column group's key generator
    pub fn from_group_keys(generator: &KeyGenerator, rows: &[Vec<u64>]) -> KeyGenResult<Self> {
        let mut data = Vec::with_capacity(generator.key_size_in_bytes() * rows.len());
        for row in rows {
            data.extend(generator.generate_key(row)?);
        }
        Ok(Self::new(generator.key_size_in_bytes(), data))
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn row_count(&self) -> usize {
        if self.value_size == 0 {
            0
        } else {
            self.data.len() / self.value_size
        }
    }

    pub fn row(&self, row: usize) -> ExecutorResult<&[u8]> {
        let start = row * self.value_size;
        self.data.get(start..start + self.value_size).ok_or_else(|| {
            ExecutorError::decode_failed(format!(
                "Row {} outside fixed-length chunk of {} rows",
                row,
                self.row_count()
            ))
        })
    }
}

/// One byte sequence per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableLengthChunk {
    rows: Vec<Vec<u8>>,
}

impl VariableLengthChunk {
    pub fn new(rows: Vec<Vec<u8>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> ExecutorResult<&[u8]> {
        self.rows.get(row).map(Vec::as_slice).ok_or_else(|| {
            ExecutorError::decode_failed(format!(
                "Row {} outside variable-length chunk of {} rows",
                row,
                self.rows.len()
            ))
        })
    }
}

/// Dimension chunk tagged by encoding family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionChunk {
    Dictionary(FixedLengthChunk),
    Plain(VariableLengthChunk),
    Complex(VariableLengthChunk),
}

impl DimensionChunk {
    pub fn family(&self) -> &'static str {
        match self {
            DimensionChunk::Dictionary(_) => "dictionary",
            DimensionChunk::Plain(_) => "plain",
            DimensionChunk::Complex(_) => "complex",
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            DimensionChunk::Dictionary(chunk) => chunk.row_count(),
            DimensionChunk::Plain(chunk) | DimensionChunk::Complex(chunk) => chunk.row_count(),
        }
    }
}

/// Typed measure storage
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureValues {
    Long(Vec<i64>),
    Double(Vec<f64>),
    /// Unscaled decimals
    Decimal(Vec<i128>),
}

/// Values of one measure column with an optional null mask
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureChunk {
    values: MeasureValues,
    /// Empty when no row is null
    nulls: Vec<bool>,
}

impl MeasureChunk {
    pub fn new(values: MeasureValues) -> Self {
        Self {
            values,
            nulls: Vec::new(),
        }
    }

    pub fn with_nulls(mut self, nulls: Vec<bool>) -> Self {
        self.nulls = nulls;
        self
    }

    pub fn values(&self) -> &MeasureValues {
        &self.values
    }

    pub fn row_count(&self) -> usize {
        match &self.values {
            MeasureValues::Long(v) => v.len(),
            MeasureValues::Double(v) => v.len(),
            MeasureValues::Decimal(v) => v.len(),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.get(row).copied().unwrap_or(false)
    }

    /// Value at a physical row, `None` for null
    pub fn value(&self, row: usize) -> ExecutorResult<Option<MeasureValue>> {
        if row >= self.row_count() {
            return Err(ExecutorError::decode_failed(format!(
                "Row {} outside measure chunk of {} rows",
                row,
                self.row_count()
            )));
        }
        if self.is_null(row) {
            return Ok(None);
        }
        Ok(Some(match &self.values {
            MeasureValues::Long(v) => MeasureValue::Long(v[row]),
            MeasureValues::Double(v) => MeasureValue::Double(v[row]),
            MeasureValues::Decimal(v) => MeasureValue::Decimal(v[row]),
        }))
    }
}

/// Column chunks read for one blocklet, keyed by column group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockletChunks {
    row_count: usize,
    dimensions: BTreeMap<usize, DimensionChunk>,
    measures: BTreeMap<usize, MeasureChunk>,
}

impl BlockletChunks {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, group: usize, chunk: DimensionChunk) -> Self {
        self.dimensions.insert(group, chunk);
        self
    }

    pub fn with_measure(mut self, group: usize, chunk: MeasureChunk) -> Self {
        self.measures.insert(group, chunk);
        self
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn dimension(&self, group: usize) -> ExecutorResult<&DimensionChunk> {
        self.dimensions
            .get(&group)
            .ok_or_else(|| ExecutorError::chunk_missing(group, "dimension"))
    }

    pub fn dictionary(&self, group: usize) -> ExecutorResult<&FixedLengthChunk> {
        match self.dimension(group)? {
            DimensionChunk::Dictionary(chunk) => Ok(chunk),
            other => Err(ExecutorError::decode_failed(format!(
                "Expected dictionary chunk, found {}",
                other.family()
            ))
            .in_group(group)),
        }
    }

    /// Variable-length chunk of a plain or complex group
    pub fn variable(&self, group: usize) -> ExecutorResult<&VariableLengthChunk> {
        match self.dimension(group)? {
            DimensionChunk::Plain(chunk) | DimensionChunk::Complex(chunk) => Ok(chunk),
            other => Err(ExecutorError::decode_failed(format!(
                "Expected variable-length chunk, found {}",
                other.family()
            ))
            .in_group(group)),
        }
    }

    pub fn measure(&self, group: usize) -> ExecutorResult<&MeasureChunk> {
        self.measures
            .get(&group)
            .ok_or_else(|| ExecutorError::chunk_missing(group, "measure"))
    }
}

/// Source of decoded chunks for the blocklets a plan scans
pub trait ChunkReader {
    /// Reads the dimension and measure groups named by the plan's read ranges
    fn read_blocklet(
        &self,
        plan: &crate::planner::BlockExecutionPlan,
        blocklet: usize,
    ) -> ExecutorResult<BlockletChunks>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_chunk_from_codes() {
        let chunk = FixedLengthChunk::from_codes(2, &[1, 0x0203]);
        assert_eq!(chunk.row_count(), 2);
        assert_eq!(chunk.row(0).unwrap(), &[0x00, 0x01]);
        assert_eq!(chunk.row(1).unwrap(), &[0x02, 0x03]);
        assert!(chunk.row(2).is_err());
    }

    #[test]
    fn test_group_keys() {
        let generator = KeyGenerator::new(vec![4, 4]).unwrap();
        let chunk = FixedLengthChunk::from_group_keys(&generator, &[vec![1, 2], vec![3, 4]]).unwrap();
        assert_eq!(chunk.value_size(), 1);
        assert_eq!(chunk.row(1).unwrap(), &[0x34]);
    }

    #[test]
    fn test_measure_nulls() {
        let chunk = MeasureChunk::new(MeasureValues::Long(vec![5, 6])).with_nulls(vec![false, true]);
        assert_eq!(chunk.value(0).unwrap(), Some(MeasureValue::Long(5)));
        assert_eq!(chunk.value(1).unwrap(), None);
        assert!(chunk.value(2).is_err());
    }

    #[test]
    fn test_missing_group() {
        let chunks = BlockletChunks::new(0);
        assert!(chunks.dimension(3).is_err());
        assert!(chunks.measure(0).is_err());
    }

    #[test]
    fn test_family_mismatch() {
        let chunks = BlockletChunks::new(1)
            .with_dimension(0, DimensionChunk::Plain(VariableLengthChunk::new(vec![b"x".to_vec()])));
        assert!(chunks.dictionary(0).is_err());
        assert_eq!(chunks.variable(0).unwrap().row(0).unwrap(), b"x");
    }
}
