//! Compiled filter evaluation
//!
//! A `FilterExecutor` is bound to one block's physical layout when the plan
//! is built and evaluated per blocklet. Null measures never match.

use std::ops::Bound;

use crate::keygen::{read_be_u64, KeyGenError, KeyGenerator};

use super::chunk::BlockletChunks;
use super::errors::{ExecutorError, ExecutorResult};
use super::row_mapping::RowMapping;

/// Value test of a filter leaf
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePredicate<T> {
    Include(Vec<T>),
    Exclude(Vec<T>),
    Range { lower: Bound<T>, upper: Bound<T> },
}

impl<T: PartialOrd> ValuePredicate<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            ValuePredicate::Include(values) => values.iter().any(|v| v == value),
            ValuePredicate::Exclude(values) => !values.iter().any(|v| v == value),
            ValuePredicate::Range { lower, upper } => {
                let above = match lower {
                    Bound::Included(l) => value >= l,
                    Bound::Excluded(l) => value > l,
                    Bound::Unbounded => true,
                };
                let below = match upper {
                    Bound::Included(u) => value <= u,
                    Bound::Excluded(u) => value < u,
                    Bound::Unbounded => true,
                };
                above && below
            }
        }
    }
}

/// Where a dictionary column's code sits inside its group's rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryLocator {
    /// The group holds only this column
    Single,
    /// Packed with other columns; `position` is the member index
    Grouped { generator: KeyGenerator, position: usize },
}

impl DictionaryLocator {
    pub fn decode(&self, row: &[u8]) -> ExecutorResult<u64> {
        match self {
            DictionaryLocator::Single => Ok(read_be_u64(row)),
            DictionaryLocator::Grouped { generator, position } => {
                let codes = generator.get_key_array(row)?;
                let count = codes.len();
                codes.get(*position).copied().ok_or_else(|| {
                    ExecutorError::from(KeyGenError::DimensionOutOfRange {
                        dimension: *position,
                        count,
                    })
                })
            }
        }
    }
}

/// Filter tree bound to a block layout
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExecutor {
    And(Box<FilterExecutor>, Box<FilterExecutor>),
    Or(Box<FilterExecutor>, Box<FilterExecutor>),
    Dictionary {
        group: usize,
        locator: DictionaryLocator,
        predicate: ValuePredicate<u64>,
    },
    Plain {
        group: usize,
        predicate: ValuePredicate<Vec<u8>>,
    },
    /// Measures compare as doubles across numeric families
    Measure {
        group: usize,
        predicate: ValuePredicate<f64>,
    },
    /// Same outcome for every row
    Constant(bool),
}

impl FilterExecutor {
    /// Evaluates the filter over a blocklet and keeps the matching rows
    pub fn apply(&self, chunks: &BlockletChunks) -> ExecutorResult<RowMapping> {
        Ok(RowMapping::from_selection(&self.evaluate(chunks)?))
    }

    /// One flag per physical row
    pub fn evaluate(&self, chunks: &BlockletChunks) -> ExecutorResult<Vec<bool>> {
        let rows = chunks.row_count();
        match self {
            FilterExecutor::Constant(outcome) => Ok(vec![*outcome; rows]),
            FilterExecutor::And(left, right) => {
                let mut flags = left.evaluate(chunks)?;
                for (flag, other) in flags.iter_mut().zip(right.evaluate(chunks)?) {
                    *flag = *flag && other;
                }
                Ok(flags)
            }
            FilterExecutor::Or(left, right) => {
                let mut flags = left.evaluate(chunks)?;
                for (flag, other) in flags.iter_mut().zip(right.evaluate(chunks)?) {
                    *flag = *flag || other;
                }
                Ok(flags)
            }
            FilterExecutor::Dictionary {
                group,
                locator,
                predicate,
            } => {
                let chunk = chunks.dictionary(*group)?;
                (0..rows)
                    .map(|row| {
                        let code = locator.decode(chunk.row(row)?).map_err(|e| e.in_group(*group))?;
                        Ok(predicate.matches(&code))
                    })
                    .collect()
            }
            FilterExecutor::Plain { group, predicate } => {
                let chunk = chunks.variable(*group)?;
                (0..rows)
                    .map(|row| {
                        let value = chunk.row(row)?.to_vec();
                        Ok(predicate.matches(&value))
                    })
                    .collect()
            }
            FilterExecutor::Measure { group, predicate } => {
                let chunk = chunks.measure(*group)?;
                (0..rows)
                    .map(|row| Ok(chunk.value(row)?.is_some_and(|v| predicate.matches(&v.as_f64()))))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::errors::ExecutorErrorCode;
    use crate::executor::chunk::{
        DimensionChunk, FixedLengthChunk, MeasureChunk, MeasureValues, VariableLengthChunk,
    };

    fn chunks() -> BlockletChunks {
        BlockletChunks::new(4)
            .with_dimension(0, DimensionChunk::Dictionary(FixedLengthChunk::from_codes(1, &[1, 2, 3, 4])))
            .with_dimension(
                1,
                DimensionChunk::Plain(VariableLengthChunk::new(vec![
                    b"a".to_vec(),
                    b"b".to_vec(),
                    b"a".to_vec(),
                    b"c".to_vec(),
                ])),
            )
            .with_measure(
                0,
                MeasureChunk::new(MeasureValues::Double(vec![1.0, 2.0, 3.0, 4.0]))
                    .with_nulls(vec![false, false, true, false]),
            )
    }

    #[test]
    fn test_dictionary_range() {
        let filter = FilterExecutor::Dictionary {
            group: 0,
            locator: DictionaryLocator::Single,
            predicate: ValuePredicate::Range {
                lower: Bound::Excluded(1),
                upper: Bound::Included(3),
            },
        };
        assert_eq!(filter.apply(&chunks()).unwrap(), RowMapping::Selected(vec![1, 2]));
    }

    #[test]
    fn test_and_or() {
        let plain_a = FilterExecutor::Plain {
            group: 1,
            predicate: ValuePredicate::Include(vec![b"a".to_vec()]),
        };
        let measure_big = FilterExecutor::Measure {
            group: 0,
            predicate: ValuePredicate::Range {
                lower: Bound::Included(2.0),
                upper: Bound::Unbounded,
            },
        };
        let and = FilterExecutor::And(Box::new(plain_a.clone()), Box::new(measure_big.clone()));
        // row 2 is "a" but its measure is null
        assert_eq!(and.apply(&chunks()).unwrap(), RowMapping::Selected(vec![]));

        let or = FilterExecutor::Or(Box::new(plain_a), Box::new(measure_big));
        assert_eq!(or.apply(&chunks()).unwrap(), RowMapping::Selected(vec![0, 1, 2, 3]));
    }

    #[test]
    fn test_exclude() {
        let filter = FilterExecutor::Plain {
            group: 1,
            predicate: ValuePredicate::Exclude(vec![b"a".to_vec()]),
        };
        assert_eq!(filter.apply(&chunks()).unwrap(), RowMapping::Selected(vec![1, 3]));
    }

    #[test]
    fn test_grouped_locator() {
        let generator = KeyGenerator::new(vec![4, 4]).unwrap();
        let locator = DictionaryLocator::Grouped {
            generator,
            position: 1,
        };
        assert_eq!(locator.decode(&[0x3A]).unwrap(), 0xA);
    }

    #[test]
    fn test_grouped_locator_rejects_unknown_position() {
        let locator = DictionaryLocator::Grouped {
            generator: KeyGenerator::new(vec![4, 4]).unwrap(),
            position: 2,
        };
        let err = locator.decode(&[0x3A]).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::ScanDecodeFailed);
    }

    #[test]
    fn test_missing_chunk() {
        let filter = FilterExecutor::Dictionary {
            group: 9,
            locator: DictionaryLocator::Single,
            predicate: ValuePredicate::Include(vec![1]),
        };
        assert!(filter.apply(&chunks()).is_err());
    }

    #[test]
    fn test_constant() {
        let mapping = FilterExecutor::Constant(false).apply(&chunks()).unwrap();
        assert!(mapping.is_empty());
    }
}
