//! Filter plan compilation
//!
//! Binds the resolved filter tree to one block's layout and derives the
//! inclusive start/end keys a block scan may skip outside of. The range is
//! conservative: every row the filter can accept lies inside it.

use std::ops::Bound;

use serde::Serialize;

use crate::executor::{DictionaryLocator, FilterExecutor, ValuePredicate};
use crate::keygen::KeyGenerator;
use crate::schema::{DimensionKind, SegmentProperties};

use super::errors::{PlannerError, PlannerResult};
use super::resolver::{ConditionResolver, FilterColumn, FilterOperator, FilterResolverTree, FilterValue};

/// Inclusive composite key range in the block's own layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// True if no key can satisfy the filter
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.as_slice() <= key && key <= self.end.as_slice()
    }
}

/// Bound filter of one block
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    pub executor: Option<FilterExecutor>,
    pub range: KeyRange,
}

/// Compiles the filter against a block.
///
/// Without a filter the range spans the block's whole key space.
pub fn compile_filter(filter: Option<&FilterResolverTree>, segment: &SegmentProperties) -> PlannerResult<FilterPlan> {
    let generator = segment.key_generator();
    let Some(tree) = filter else {
        return Ok(FilterPlan {
            executor: None,
            range: KeyRange {
                start: generator.min_key(),
                end: generator.max_key().map_err(PlannerError::range_key)?,
            },
        });
    };

    let executor = bind(tree, segment)?;
    let bounds = key_bounds(tree, segment, generator)?;
    Ok(FilterPlan {
        executor: Some(executor),
        range: bounds.into_range(generator)?,
    })
}

fn bind(tree: &FilterResolverTree, segment: &SegmentProperties) -> PlannerResult<FilterExecutor> {
    match tree {
        FilterResolverTree::And(left, right) => Ok(FilterExecutor::And(
            Box::new(bind(left, segment)?),
            Box::new(bind(right, segment)?),
        )),
        FilterResolverTree::Or(left, right) => Ok(FilterExecutor::Or(
            Box::new(bind(left, segment)?),
            Box::new(bind(right, segment)?),
        )),
        FilterResolverTree::Condition(condition) => bind_condition(condition, segment),
    }
}

fn bind_condition(condition: &ConditionResolver, segment: &SegmentProperties) -> PlannerResult<FilterExecutor> {
    match &condition.column {
        FilterColumn::Dimension(id) => {
            let Some(column) = segment.dimension_by_id(id) else {
                return Ok(FilterExecutor::Constant(false));
            };
            let group = segment.dimension_group(column.ordinal());
            match column.kind() {
                DimensionKind::Dictionary { .. } => {
                    let values = surrogates(condition)?;
                    let locator = match segment.group_key_generator(group) {
                        Some(generator) => DictionaryLocator::Grouped {
                            generator: generator.clone(),
                            position: segment
                                .position_in_group(column.ordinal())
                                .map_err(PlannerError::range_key)?,
                        },
                        None => DictionaryLocator::Single,
                    };
                    Ok(FilterExecutor::Dictionary {
                        group,
                        locator,
                        predicate: predicate(condition.operator, values, id)?,
                    })
                }
                DimensionKind::Plain => {
                    let values = condition
                        .values
                        .iter()
                        .map(|v| match v {
                            FilterValue::Bytes(bytes) => Ok(bytes.clone()),
                            other => Err(mismatch(id, "bytes", other)),
                        })
                        .collect::<PlannerResult<Vec<_>>>()?;
                    Ok(FilterExecutor::Plain {
                        group,
                        predicate: predicate(condition.operator, values, id)?,
                    })
                }
                DimensionKind::Complex { .. } => Err(PlannerError::filter(format!(
                    "Filter on complex column '{}' is not supported",
                    id
                ))),
            }
        }
        FilterColumn::Measure(id) => {
            let values = condition
                .values
                .iter()
                .map(|v| match v {
                    FilterValue::Measure(m) => Ok(m.as_f64()),
                    other => Err(mismatch(id, "measure", other)),
                })
                .collect::<PlannerResult<Vec<_>>>()?;
            let predicate = predicate(condition.operator, values, id)?;
            match segment.measure_by_id(id) {
                Some(measure) => Ok(FilterExecutor::Measure {
                    group: segment.measure_group(measure.ordinal()),
                    predicate,
                }),
                None => Ok(FilterExecutor::Constant(false)),
            }
        }
    }
}

fn surrogates(condition: &ConditionResolver) -> PlannerResult<Vec<u64>> {
    condition
        .values
        .iter()
        .map(|v| match v {
            FilterValue::Surrogate(code) => Ok(*code),
            other => Err(mismatch(condition.column.column_id(), "surrogate", other)),
        })
        .collect()
}

fn mismatch(column_id: &str, expected: &str, found: &FilterValue) -> PlannerError {
    PlannerError::filter(format!(
        "Column '{}' expects {} literals, found {:?}",
        column_id, expected, found
    ))
}

fn predicate<T>(operator: FilterOperator, mut values: Vec<T>, column_id: &str) -> PlannerResult<ValuePredicate<T>> {
    if values.is_empty() {
        return Err(PlannerError::filter(format!(
            "Condition on '{}' has no literal",
            column_id
        )));
    }
    let single = |values: &mut Vec<T>| -> PlannerResult<T> {
        if values.len() != 1 {
            return Err(PlannerError::filter(format!(
                "Operator {} on '{}' takes one literal, got {}",
                operator.as_str(),
                column_id,
                values.len()
            )));
        }
        values.pop().ok_or_else(|| PlannerError::filter("empty literal list"))
    };
    Ok(match operator {
        FilterOperator::Equals | FilterOperator::In => ValuePredicate::Include(values),
        FilterOperator::NotEquals | FilterOperator::NotIn => ValuePredicate::Exclude(values),
        FilterOperator::GreaterThan => ValuePredicate::Range {
            lower: Bound::Excluded(single(&mut values)?),
            upper: Bound::Unbounded,
        },
        FilterOperator::GreaterThanOrEqual => ValuePredicate::Range {
            lower: Bound::Included(single(&mut values)?),
            upper: Bound::Unbounded,
        },
        FilterOperator::LessThan => ValuePredicate::Range {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(single(&mut values)?),
        },
        FilterOperator::LessThanOrEqual => ValuePredicate::Range {
            lower: Bound::Unbounded,
            upper: Bound::Included(single(&mut values)?),
        },
    })
}

/// Per key ordinal code bounds; `None` when nothing can match
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyBounds(Option<(Vec<u64>, Vec<u64>)>);

impl KeyBounds {
    fn full(generator: &KeyGenerator) -> PlannerResult<Self> {
        let upper = (0..generator.dimension_count())
            .map(|d| generator.max_value(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PlannerError::range_key)?;
        Ok(KeyBounds(Some((vec![0; upper.len()], upper))))
    }

    fn empty() -> Self {
        KeyBounds(None)
    }

    fn and(self, other: KeyBounds) -> Self {
        let (Some((mut lower, mut upper)), Some((other_lower, other_upper))) = (self.0, other.0) else {
            return KeyBounds::empty();
        };
        for d in 0..lower.len() {
            lower[d] = lower[d].max(other_lower[d]);
            upper[d] = upper[d].min(other_upper[d]);
            if lower[d] > upper[d] {
                return KeyBounds::empty();
            }
        }
        KeyBounds(Some((lower, upper)))
    }

    fn or(self, other: KeyBounds) -> Self {
        match (self.0, other.0) {
            (None, bounds) | (bounds, None) => KeyBounds(bounds),
            (Some((mut lower, mut upper)), Some((other_lower, other_upper))) => {
                for d in 0..lower.len() {
                    lower[d] = lower[d].min(other_lower[d]);
                    upper[d] = upper[d].max(other_upper[d]);
                }
                KeyBounds(Some((lower, upper)))
            }
        }
    }

    /// An empty bound set yields the inverted range max..min
    fn into_range(self, generator: &KeyGenerator) -> PlannerResult<KeyRange> {
        match self.0 {
            Some((lower, upper)) => Ok(KeyRange {
                start: generator.generate_key(&lower).map_err(PlannerError::range_key)?,
                end: generator.generate_key(&upper).map_err(PlannerError::range_key)?,
            }),
            None => Ok(KeyRange {
                start: generator.max_key().map_err(PlannerError::range_key)?,
                end: generator.min_key(),
            }),
        }
    }
}

fn key_bounds(
    tree: &FilterResolverTree,
    segment: &SegmentProperties,
    generator: &KeyGenerator,
) -> PlannerResult<KeyBounds> {
    match tree {
        FilterResolverTree::And(left, right) => Ok(key_bounds(left, segment, generator)?
            .and(key_bounds(right, segment, generator)?)),
        FilterResolverTree::Or(left, right) => Ok(key_bounds(left, segment, generator)?
            .or(key_bounds(right, segment, generator)?)),
        FilterResolverTree::Condition(condition) => leaf_bounds(condition, segment, generator),
    }
}

fn leaf_bounds(
    condition: &ConditionResolver,
    segment: &SegmentProperties,
    generator: &KeyGenerator,
) -> PlannerResult<KeyBounds> {
    let full = KeyBounds::full(generator)?;
    let FilterColumn::Dimension(id) = &condition.column else {
        return Ok(full);
    };
    let Some(ordinal) = segment.dimension_by_id(id).and_then(|d| d.key_ordinal()) else {
        return Ok(full);
    };
    if condition.operator.is_negated() {
        return Ok(full);
    }
    let max = generator.max_value(ordinal).map_err(PlannerError::range_key)?;
    let codes: Vec<u64> = surrogates(condition)?;

    let narrowed = match condition.operator {
        FilterOperator::Equals | FilterOperator::In => {
            let in_range: Vec<u64> = codes.into_iter().filter(|&c| c <= max).collect();
            match (in_range.iter().min(), in_range.iter().max()) {
                (Some(&lo), Some(&hi)) => Some((lo, hi)),
                _ => None,
            }
        }
        FilterOperator::GreaterThan => codes
            .first()
            .and_then(|&v| v.checked_add(1))
            .filter(|&lo| lo <= max)
            .map(|lo| (lo, max)),
        FilterOperator::GreaterThanOrEqual => codes.first().filter(|&&v| v <= max).map(|&v| (v, max)),
        FilterOperator::LessThan => codes
            .first()
            .and_then(|&v| v.checked_sub(1))
            .map(|hi| (0, hi.min(max))),
        FilterOperator::LessThanOrEqual => codes.first().map(|&v| (0, v.min(max))),
        FilterOperator::NotEquals | FilterOperator::NotIn => return Ok(full),
    };

    let Some((lo, hi)) = narrowed else {
        return Ok(KeyBounds::empty());
    };
    let Some((mut lower, mut upper)) = full.0 else {
        return Ok(KeyBounds::empty());
    };
    lower[ordinal] = lo;
    upper[ordinal] = hi;
    Ok(KeyBounds(Some((lower, upper))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MeasureDataType, MeasureValue};

    fn segment() -> SegmentProperties {
        SegmentProperties::builder()
            .dictionary("a", 8)
            .dictionary("b", 8)
            .plain("name")
            .measure("amount", MeasureDataType::Double)
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_filter_spans_key_space() {
        let plan = compile_filter(None, &segment()).unwrap();
        assert!(plan.executor.is_none());
        assert_eq!(plan.range.start, vec![0, 0]);
        assert_eq!(plan.range.end, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_equality_narrows_one_dimension() {
        let tree = FilterResolverTree::dictionary("b", FilterOperator::Equals, 7);
        let plan = compile_filter(Some(&tree), &segment()).unwrap();
        assert_eq!(plan.range.start, vec![0, 7]);
        assert_eq!(plan.range.end, vec![0xFF, 7]);
    }

    #[test]
    fn test_and_intersects_or_unions() {
        let and = FilterResolverTree::dictionary("a", FilterOperator::GreaterThan, 3)
            .and(FilterResolverTree::dictionary("a", FilterOperator::LessThanOrEqual, 9));
        let plan = compile_filter(Some(&and), &segment()).unwrap();
        assert_eq!(plan.range.start, vec![4, 0]);
        assert_eq!(plan.range.end, vec![9, 0xFF]);

        let or = FilterResolverTree::dictionary_in("a", &[5, 6])
            .or(FilterResolverTree::dictionary("a", FilterOperator::Equals, 20));
        let plan = compile_filter(Some(&or), &segment()).unwrap();
        assert_eq!(plan.range.start, vec![5, 0]);
        assert_eq!(plan.range.end, vec![20, 0xFF]);
    }

    #[test]
    fn test_contradiction_is_empty() {
        let tree = FilterResolverTree::dictionary("a", FilterOperator::Equals, 1)
            .and(FilterResolverTree::dictionary("a", FilterOperator::Equals, 2));
        let plan = compile_filter(Some(&tree), &segment()).unwrap();
        assert!(plan.range.is_empty());

        let tree = FilterResolverTree::dictionary("a", FilterOperator::LessThan, 0);
        assert!(compile_filter(Some(&tree), &segment()).unwrap().range.is_empty());
    }

    #[test]
    fn test_negated_and_plain_leaves_keep_full_range() {
        let tree = FilterResolverTree::dictionary("a", FilterOperator::NotEquals, 1)
            .and(FilterResolverTree::plain("name", FilterOperator::Equals, "x"));
        let plan = compile_filter(Some(&tree), &segment()).unwrap();
        assert_eq!(plan.range.start, vec![0, 0]);
        assert_eq!(plan.range.end, vec![0xFF, 0xFF]);
        assert!(plan.range.contains(&[0x10, 0x20]));
    }

    #[test]
    fn test_missing_column_is_constant_false() {
        let tree = FilterResolverTree::dictionary("added_later", FilterOperator::Equals, 1);
        let plan = compile_filter(Some(&tree), &segment()).unwrap();
        assert_eq!(plan.executor, Some(FilterExecutor::Constant(false)));
        assert!(!plan.range.is_empty());
    }

    #[test]
    fn test_literal_type_mismatch() {
        let tree = FilterResolverTree::plain("a", FilterOperator::Equals, "x");
        let err = compile_filter(Some(&tree), &segment()).unwrap_err();
        assert_eq!(err.code(), super::super::errors::PlannerErrorCode::ScanPlanFilter);
    }

    #[test]
    fn test_measure_leaf() {
        let tree = FilterResolverTree::measure("amount", FilterOperator::GreaterThan, MeasureValue::Long(2));
        let plan = compile_filter(Some(&tree), &segment()).unwrap();
        assert!(matches!(plan.executor, Some(FilterExecutor::Measure { group: 0, .. })));
    }

    #[test]
    fn test_range_operator_needs_one_literal() {
        let tree = FilterResolverTree::condition(
            FilterColumn::Dimension("a".into()),
            FilterOperator::GreaterThan,
            vec![FilterValue::Surrogate(1), FilterValue::Surrogate(2)],
        );
        assert!(compile_filter(Some(&tree), &segment()).is_err());
    }
}
