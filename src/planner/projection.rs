//! Projection resolution against one block's schema
//!
//! Query columns are matched to the block by stable column id. Columns the
//! block was written without drop out of the dimension projection; missing
//! measures stay in the projection and report their default value.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::schema::{DimensionColumn, DimensionKind, MeasureDataType, MeasureValue, SegmentProperties};

use super::model::{QueryDimension, QueryMeasure};

/// A query dimension bound to the block's column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDimension {
    /// Column as the block recorded it
    pub column: DimensionColumn,
    pub query_order: usize,
    /// Physical column group in the block
    pub group: usize,
}

/// A query measure bound to the block
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeasure {
    pub column_id: String,
    /// Type tag requested by the query
    pub data_type: MeasureDataType,
    pub query_order: usize,
    /// Measure ordinal in the block, `None` if the block predates it
    pub block_ordinal: Option<usize>,
    pub group: Option<usize>,
    pub default_value: Option<MeasureValue>,
}

impl ResolvedMeasure {
    pub fn exists(&self) -> bool {
        self.block_ordinal.is_some()
    }
}

/// Inclusive run of adjacent column groups fetched in one read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadRange {
    pub start: usize,
    pub end: usize,
}

impl ReadRange {
    pub fn single(group: usize) -> Self {
        Self {
            start: group,
            end: group,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, group: usize) -> bool {
        self.start <= group && group <= self.end
    }
}

/// Column groups a block plan decodes and reads
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInfo {
    pub dimensions: Vec<ResolvedDimension>,
    pub measures: Vec<ResolvedMeasure>,
    /// Dictionary groups in ascending order, each once
    pub dictionary_groups: Vec<usize>,
    /// Plain groups in projection order
    pub plain_groups: Vec<usize>,
    /// Complex parent groups in projection order
    pub complex_parent_groups: Vec<usize>,
    pub dimension_read_ranges: Vec<ReadRange>,
    pub measure_read_ranges: Vec<ReadRange>,
}

/// Binds the query dimensions to the block's columns, in projection order.
///
/// Complex children are stripped unless `need_complex_children` is set.
pub fn restructure_dimensions(
    dimensions: &[QueryDimension],
    segment: &SegmentProperties,
    need_complex_children: bool,
) -> Vec<ResolvedDimension> {
    let mut resolved: Vec<ResolvedDimension> = dimensions
        .iter()
        .filter_map(|query| {
            let column = segment.dimension_by_id(&query.column_id)?;
            Some(ResolvedDimension {
                column: strip_children(column, need_complex_children),
                query_order: query.query_order,
                group: segment.dimension_group(column.ordinal()),
            })
        })
        .collect();
    resolved.sort_by_key(|d| d.query_order);
    resolved
}

fn strip_children(column: &DimensionColumn, need_complex_children: bool) -> DimensionColumn {
    match column.kind() {
        DimensionKind::Complex {
            kind,
            element_sizes,
            ..
        } if !need_complex_children => DimensionColumn::new(
            column.column_id(),
            column.name(),
            column.ordinal(),
            DimensionKind::Complex {
                kind: *kind,
                children: Vec::new(),
                element_sizes: element_sizes.clone(),
            },
        ),
        _ => column.clone(),
    }
}

/// Binds the query measures to the block. Every query measure is kept.
pub fn restructure_measures(measures: &[QueryMeasure], segment: &SegmentProperties) -> Vec<ResolvedMeasure> {
    measures
        .iter()
        .map(|query| {
            let column = segment.measure_by_id(&query.column_id);
            ResolvedMeasure {
                column_id: query.column_id.clone(),
                data_type: query.data_type,
                query_order: query.query_order,
                block_ordinal: column.map(|m| m.ordinal()),
                group: column.map(|m| segment.measure_group(m.ordinal())),
                default_value: column.and_then(|m| m.default_value()).or(query.default_value),
            }
        })
        .collect()
}

/// Groups sorted ascending, each once.
pub fn dictionary_group_indexes(dimensions: &[ResolvedDimension]) -> Vec<usize> {
    dimensions
        .iter()
        .filter(|d| d.column.is_dictionary())
        .map(|d| d.group)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn groups_in_order(dimensions: &[ResolvedDimension], keep: impl Fn(&DimensionColumn) -> bool) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    dimensions
        .iter()
        .filter(|d| keep(&d.column))
        .map(|d| d.group)
        .filter(|g| seen.insert(*g))
        .collect()
}

/// Packs sorted, unique group indexes into read runs of at most `batch_size`
/// adjacent groups.
///
/// If the highest index is `last_group` it is always read on its own, after
/// the other runs.
pub fn compact_read_ranges(indexes: &[usize], last_group: Option<usize>, batch_size: usize) -> Vec<ReadRange> {
    let (body, trailing) = match indexes.split_last() {
        Some((&last, rest)) if Some(last) == last_group => (rest, Some(last)),
        _ => (indexes, None),
    };

    let mut ranges: Vec<ReadRange> = Vec::new();
    for &group in body {
        match ranges.last_mut() {
            Some(run) if run.end + 1 == group && run.len() < batch_size => run.end = group,
            _ => ranges.push(ReadRange::single(group)),
        }
    }
    if let Some(group) = trailing {
        ranges.push(ReadRange::single(group));
    }
    ranges
}

/// Resolves the projection and read groups of one block.
///
/// Filter-only columns present in the block join the read groups but not
/// the projection.
pub fn resolve_projection(
    dimensions: &[QueryDimension],
    measures: &[QueryMeasure],
    filter_dimensions: &BTreeSet<String>,
    filter_measures: &BTreeSet<String>,
    segment: &SegmentProperties,
    need_complex_children: bool,
    batch_size: usize,
) -> ProjectionInfo {
    let dimensions = restructure_dimensions(dimensions, segment, need_complex_children);
    let measures = restructure_measures(measures, segment);

    let dictionary_groups = dictionary_group_indexes(&dimensions);
    let plain_groups = groups_in_order(&dimensions, DimensionColumn::is_plain);
    let complex_parent_groups = groups_in_order(&dimensions, DimensionColumn::is_complex);

    let mut dimension_reads: BTreeSet<usize> = dimensions.iter().map(|d| d.group).collect();
    dimension_reads.extend(
        filter_dimensions
            .iter()
            .filter_map(|id| segment.dimension_by_id(id))
            .map(|d| segment.dimension_group(d.ordinal())),
    );

    let mut measure_reads: BTreeSet<usize> = measures.iter().filter_map(|m| m.group).collect();
    measure_reads.extend(
        filter_measures
            .iter()
            .filter_map(|id| segment.measure_by_id(id))
            .map(|m| segment.measure_group(m.ordinal())),
    );

    let dimension_reads: Vec<usize> = dimension_reads.into_iter().collect();
    let measure_reads: Vec<usize> = measure_reads.into_iter().collect();
    let last_measure_group = segment.measure_group_count().checked_sub(1);

    ProjectionInfo {
        dimension_read_ranges: compact_read_ranges(
            &dimension_reads,
            segment.last_dimension_group(),
            batch_size,
        ),
        measure_read_ranges: compact_read_ranges(&measure_reads, last_measure_group, batch_size),
        dimensions,
        measures,
        dictionary_groups,
        plain_groups,
        complex_parent_groups,
    }
}

/// Per-group dimension ordinals of the projected dictionary columns
pub fn selected_group_members(dimensions: &[ResolvedDimension]) -> BTreeMap<usize, Vec<usize>> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for dimension in dimensions.iter().filter(|d| d.column.is_dictionary()) {
        let entry = members.entry(dimension.group).or_default();
        if !entry.contains(&dimension.column.ordinal()) {
            entry.push(dimension.column.ordinal());
        }
    }
    for ordinals in members.values_mut() {
        ordinals.sort_unstable();
    }
    members
}
