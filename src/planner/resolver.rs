//! Resolved filter expression tree
//!
//! The filter resolver outside this crate turns a user predicate into this
//! tree: dictionary literals are already translated to surrogate codes and
//! every leaf names its column by stable column id.

use std::collections::BTreeSet;

use crate::schema::MeasureValue;

/// A resolved literal
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Dictionary code of a dictionary-encoded dimension
    Surrogate(u64),
    /// Raw bytes of a plain dimension
    Bytes(Vec<u8>),
    Measure(MeasureValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "=",
            FilterOperator::NotEquals => "!=",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, FilterOperator::NotEquals | FilterOperator::NotIn)
    }
}

/// Column a filter leaf reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterColumn {
    Dimension(String),
    Measure(String),
}

impl FilterColumn {
    pub fn column_id(&self) -> &str {
        match self {
            FilterColumn::Dimension(id) | FilterColumn::Measure(id) => id,
        }
    }
}

/// Leaf comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionResolver {
    pub column: FilterColumn,
    pub operator: FilterOperator,
    pub values: Vec<FilterValue>,
}

/// Resolved filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResolverTree {
    And(Box<FilterResolverTree>, Box<FilterResolverTree>),
    Or(Box<FilterResolverTree>, Box<FilterResolverTree>),
    Condition(ConditionResolver),
}

impl FilterResolverTree {
    pub fn condition(column: FilterColumn, operator: FilterOperator, values: Vec<FilterValue>) -> Self {
        FilterResolverTree::Condition(ConditionResolver {
            column,
            operator,
            values,
        })
    }

    /// Comparison of a dictionary dimension against one surrogate
    pub fn dictionary(column_id: impl Into<String>, operator: FilterOperator, surrogate: u64) -> Self {
        Self::condition(
            FilterColumn::Dimension(column_id.into()),
            operator,
            vec![FilterValue::Surrogate(surrogate)],
        )
    }

    /// Dictionary dimension IN a set of surrogates
    pub fn dictionary_in(column_id: impl Into<String>, surrogates: &[u64]) -> Self {
        Self::condition(
            FilterColumn::Dimension(column_id.into()),
            FilterOperator::In,
            surrogates.iter().map(|&s| FilterValue::Surrogate(s)).collect(),
        )
    }

    /// Comparison of a plain dimension against raw bytes
    pub fn plain(column_id: impl Into<String>, operator: FilterOperator, value: impl Into<Vec<u8>>) -> Self {
        Self::condition(
            FilterColumn::Dimension(column_id.into()),
            operator,
            vec![FilterValue::Bytes(value.into())],
        )
    }

    pub fn measure(column_id: impl Into<String>, operator: FilterOperator, value: MeasureValue) -> Self {
        Self::condition(
            FilterColumn::Measure(column_id.into()),
            operator,
            vec![FilterValue::Measure(value)],
        )
    }

    pub fn and(self, other: FilterResolverTree) -> Self {
        FilterResolverTree::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterResolverTree) -> Self {
        FilterResolverTree::Or(Box::new(self), Box::new(other))
    }

    /// Collects the column ids of every dimension and measure the filter reads
    pub fn collect_columns(&self, dimensions: &mut BTreeSet<String>, measures: &mut BTreeSet<String>) {
        match self {
            FilterResolverTree::And(left, right) | FilterResolverTree::Or(left, right) => {
                left.collect_columns(dimensions, measures);
                right.collect_columns(dimensions, measures);
            }
            FilterResolverTree::Condition(condition) => match &condition.column {
                FilterColumn::Dimension(id) => {
                    dimensions.insert(id.clone());
                }
                FilterColumn::Measure(id) => {
                    measures.insert(id.clone());
                }
            },
        }
    }
}
