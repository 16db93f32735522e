//! Per-block execution plans
//!
//! A plan carries everything a scan of one block needs: the projection bound
//! to the block's schema, the key layout and its relation to the canonical
//! one, the compiled filter with its key range, and the column groups to
//! read. Plans are immutable once built.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cache::{BlockHandle, TableBlockInfo};
use crate::dictionary::{DictionaryHandle, DictionaryMapping};
use crate::executor::FilterExecutor;
use crate::keygen::{masked_byte_lookup, masked_byte_ranges, read_be_u64, KeyGenError, KeyGenResult, KeyGenerator};
use crate::schema::{ComplexChild, ComplexKind, DimensionKind, MeasureDataType, MeasureValue, SegmentProperties};

use super::errors::{PlannerError, PlannerResult};
use super::filter::{compile_filter, KeyRange};
use super::key_structure::KeyStructureInfo;
use super::model::QueryModel;
use super::projection::{resolve_projection, selected_group_members, ReadRange, ResolvedDimension, ResolvedMeasure};

/// Decoding layout of a projected dictionary column group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroupKeyInfo {
    pub group: usize,
    /// Row width in bytes
    pub value_size: usize,
    /// Packed layout of a multi-column group; `None` for a single column
    pub key_generator: Option<KeyGenerator>,
    /// Member positions of the projected columns, ascending
    pub selected_positions: Vec<usize>,
    pub mask_byte_ranges: Vec<usize>,
    pub max_key: Option<Vec<u8>>,
}

impl ColumnGroupKeyInfo {
    fn build(segment: &SegmentProperties, group: usize, ordinals: &[usize]) -> PlannerResult<Self> {
        let value_size = segment.group_value_size(group).ok_or_else(|| {
            PlannerError::key_structure(format!("Column group {} has no fixed row width", group))
        })?;

        match segment.group_key_generator(group) {
            Some(generator) => {
                let positions = ordinals
                    .iter()
                    .map(|&o| segment.position_in_group(o))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| PlannerError::key_structure(format!("Column group {} member: {}", group, e)))?;
                let mask = masked_byte_ranges(generator, &positions).map_err(|e| {
                    PlannerError::key_structure(format!("Column group {} mask: {}", group, e))
                })?;
                let max_key = generator.max_key_for(&positions).map_err(|e| {
                    PlannerError::key_structure(format!("Column group {} max key: {}", group, e))
                })?;
                Ok(Self {
                    group,
                    value_size,
                    key_generator: Some(generator.clone()),
                    selected_positions: positions,
                    mask_byte_ranges: mask,
                    max_key: Some(max_key),
                })
            }
            None => Ok(Self {
                group,
                value_size,
                key_generator: None,
                selected_positions: vec![0],
                mask_byte_ranges: (0..value_size).collect(),
                max_key: None,
            }),
        }
    }

    /// Number of dictionary columns this group contributes
    pub fn selected_count(&self) -> usize {
        self.selected_positions.len()
    }

    /// Codes of the projected members in one group row
    pub fn decode_selected(&self, row: &[u8]) -> KeyGenResult<Vec<u64>> {
        let Some(generator) = &self.key_generator else {
            return Ok(vec![read_be_u64(row)]);
        };
        let codes = generator.get_key_array(row)?;
        self.selected_positions
            .iter()
            .map(|&p| {
                codes.get(p).copied().ok_or(KeyGenError::DimensionOutOfRange {
                    dimension: p,
                    count: codes.len(),
                })
            })
            .collect()
    }
}

/// Nested column metadata keyed by parent column group
#[derive(Debug, Clone)]
pub struct ComplexDimensionInfo {
    pub column_id: String,
    pub kind: ComplexKind,
    pub children: Vec<ComplexChild>,
    pub element_sizes: Vec<usize>,
    /// Dictionaries of dictionary-encoded children
    pub dictionaries: BTreeMap<String, Arc<dyn DictionaryHandle>>,
}

/// Measure restructuring for one block, in query order
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorInfo {
    /// Query measure types, shared by every plan of the query
    pub measure_types: Arc<[MeasureDataType]>,
    pub measure_exists: Vec<bool>,
    pub block_ordinals: Vec<Option<usize>>,
    /// Reported for measures the block predates
    pub default_values: Vec<Option<MeasureValue>>,
}

impl AggregatorInfo {
    fn from_measures(measure_types: Arc<[MeasureDataType]>, measures: &[ResolvedMeasure]) -> Self {
        Self {
            measure_types,
            measure_exists: measures.iter().map(ResolvedMeasure::exists).collect(),
            block_ordinals: measures.iter().map(|m| m.block_ordinal).collect(),
            default_values: measures.iter().map(|m| m.default_value).collect(),
        }
    }
}

/// Immutable scan plan of one block
#[derive(Debug, Clone)]
pub struct BlockExecutionPlan {
    /// File path relative to the table's fact directory
    pub block_id: String,
    pub file_path: String,
    pub start_blocklet: usize,
    pub blocklet_count: usize,
    pub block: BlockHandle,
    pub raw_detail_query: bool,
    pub vectorized: bool,

    pub dimensions: Vec<ResolvedDimension>,
    pub measures: Vec<ResolvedMeasure>,

    pub block_key_generator: KeyGenerator,
    /// Key bytes of the projected dictionary columns in the block layout
    pub mask_byte_ranges: Vec<usize>,
    pub masked_byte_for_block: Vec<Option<usize>>,
    /// Block keys must be re-encoded before comparing with canonical keys
    pub fixed_key_update_required: bool,
    pub key_structure: Arc<KeyStructureInfo>,

    pub filter: Option<FilterExecutor>,
    pub range: KeyRange,

    pub dimension_read_ranges: Vec<ReadRange>,
    pub measure_read_ranges: Vec<ReadRange>,
    pub dictionary_groups: Vec<usize>,
    pub plain_groups: Vec<usize>,
    pub complex_parent_groups: Vec<usize>,
    pub total_dimension_groups: usize,
    pub total_measure_groups: usize,

    /// Bytes of one row-wise dictionary key array
    pub fixed_length_key_size: usize,
    pub column_group_key_info: BTreeMap<usize, ColumnGroupKeyInfo>,
    pub complex_dimensions: BTreeMap<usize, ComplexDimensionInfo>,
    pub dictionary_mapping: Arc<DictionaryMapping>,
    pub aggregator: AggregatorInfo,
}

impl BlockExecutionPlan {
    /// Re-encodes a key of this block into the canonical layout
    pub fn to_canonical_key(&self, block_key: &[u8]) -> PlannerResult<Vec<u8>> {
        if !self.fixed_key_update_required {
            return Ok(block_key.to_vec());
        }
        self.key_structure
            .key_generator()
            .remap_from(&self.block_key_generator, block_key)
            .map_err(|e| {
                PlannerError::key_structure(format!("Failed to remap block key: {}", e))
                    .for_block(self.block_id.clone())
            })
    }

    /// Canonical key of a block key projected onto the masked bytes
    pub fn masked_canonical_key(&self, block_key: &[u8]) -> PlannerResult<Vec<u8>> {
        Ok(self.key_structure.mask_key(&self.to_canonical_key(block_key)?))
    }

    /// Number of dictionary columns a row-wise integer key array holds
    pub fn dictionary_column_count(&self) -> usize {
        self.column_group_key_info
            .values()
            .map(ColumnGroupKeyInfo::selected_count)
            .sum()
    }
}

/// Builds the plans of one query, one block at a time
pub struct BlockPlanBuilder<'a> {
    model: &'a QueryModel,
    key_structure: Arc<KeyStructureInfo>,
    dictionary_mapping: Arc<DictionaryMapping>,
    measure_types: Arc<[MeasureDataType]>,
    filter_dimensions: BTreeSet<String>,
    filter_measures: BTreeSet<String>,
    batch_size: usize,
}

impl<'a> BlockPlanBuilder<'a> {
    pub fn new(
        model: &'a QueryModel,
        key_structure: Arc<KeyStructureInfo>,
        dictionary_mapping: Arc<DictionaryMapping>,
        batch_size: usize,
    ) -> Self {
        let (filter_dimensions, filter_measures) = model.filter_columns();
        Self {
            model,
            key_structure,
            dictionary_mapping,
            measure_types: model.measures.iter().map(|m| m.data_type).collect(),
            filter_dimensions,
            filter_measures,
            batch_size,
        }
    }

    pub fn build(&self, info: &TableBlockInfo, block: &BlockHandle) -> PlannerResult<BlockExecutionPlan> {
        let block_id = self.model.table.block_id(&info.file_path);
        self.build_inner(info, block)
            .map_err(|e| e.for_block(block_id))
    }

    fn build_inner(&self, info: &TableBlockInfo, block: &BlockHandle) -> PlannerResult<BlockExecutionPlan> {
        let segment = block.segment_properties();
        let projection = resolve_projection(
            &self.model.dimensions,
            &self.model.measures,
            &self.filter_dimensions,
            &self.filter_measures,
            segment,
            self.model.need_complex_children,
            self.batch_size,
        );

        let block_key_generator = segment.key_generator().clone();
        let key_ordinals: Vec<usize> = projection
            .dimensions
            .iter()
            .filter_map(|d| d.column.key_ordinal())
            .collect();
        let mask = masked_byte_ranges(&block_key_generator, &key_ordinals)
            .map_err(|e| PlannerError::key_structure(format!("Failed to mask block key: {}", e)))?;
        let masked_byte_for_block = masked_byte_lookup(block_key_generator.key_size_in_bytes(), &mask);
        let fixed_key_update_required = &block_key_generator != self.key_structure.key_generator();

        let filter = compile_filter(self.model.filter.as_ref(), segment)?;

        let column_group_key_info = selected_group_members(&projection.dimensions)
            .into_iter()
            .map(|(group, ordinals)| Ok((group, ColumnGroupKeyInfo::build(segment, group, &ordinals)?)))
            .collect::<PlannerResult<BTreeMap<_, _>>>()?;

        let dictionary_ordinals: Vec<usize> = projection
            .dimensions
            .iter()
            .filter(|d| d.column.is_dictionary())
            .map(|d| d.column.ordinal())
            .collect();

        Ok(BlockExecutionPlan {
            block_id: self.model.table.block_id(&info.file_path),
            file_path: info.file_path.clone(),
            start_blocklet: info.start_blocklet,
            blocklet_count: info.blocklet_count,
            block: Arc::clone(block),
            raw_detail_query: self.model.raw_detail_query,
            vectorized: self.model.vector_reader,
            fixed_length_key_size: segment.fixed_length_key_size(&dictionary_ordinals),
            complex_dimensions: self.complex_dimensions(&projection.dimensions),
            aggregator: AggregatorInfo::from_measures(Arc::clone(&self.measure_types), &projection.measures),
            dimensions: projection.dimensions,
            measures: projection.measures,
            block_key_generator,
            mask_byte_ranges: mask,
            masked_byte_for_block,
            fixed_key_update_required,
            key_structure: Arc::clone(&self.key_structure),
            filter: filter.executor,
            range: filter.range,
            dimension_read_ranges: projection.dimension_read_ranges,
            measure_read_ranges: projection.measure_read_ranges,
            dictionary_groups: projection.dictionary_groups,
            plain_groups: projection.plain_groups,
            complex_parent_groups: projection.complex_parent_groups,
            total_dimension_groups: segment.dimension_group_count(),
            total_measure_groups: segment.measure_group_count(),
            column_group_key_info,
            dictionary_mapping: Arc::clone(&self.dictionary_mapping),
        })
    }

    fn complex_dimensions(&self, dimensions: &[ResolvedDimension]) -> BTreeMap<usize, ComplexDimensionInfo> {
        dimensions
            .iter()
            .filter_map(|d| match d.column.kind() {
                DimensionKind::Complex {
                    kind,
                    children,
                    element_sizes,
                } => {
                    let dictionaries = children
                        .iter()
                        .filter(|c| c.dictionary_encoded)
                        .filter_map(|c| {
                            self.dictionary_mapping
                                .get(&c.column_id)
                                .map(|h| (c.column_id.clone(), Arc::clone(h)))
                        })
                        .collect();
                    Some((
                        d.group,
                        ComplexDimensionInfo {
                            column_id: d.column.column_id().to_string(),
                            kind: *kind,
                            children: children.clone(),
                            element_sizes: element_sizes.clone(),
                            dictionaries,
                        },
                    ))
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BlockIndex;
    use crate::dictionary::ColumnDictionary;
    use crate::planner::key_structure::derive_key_structure;
    use crate::schema::TableIdentity;

    fn table() -> TableIdentity {
        TableIdentity::new("/store", "db", "sales", "t1")
    }

    fn handle(segment: SegmentProperties) -> BlockHandle {
        Arc::new(BlockIndex::new("/store/db/sales/Fact/Part0/Segment_0/part-0.data", "0", segment, 4))
    }

    fn info() -> TableBlockInfo {
        TableBlockInfo::new("/store/db/sales/Fact/Part0/Segment_0/part-0.data", "0", 1, 2)
    }

    fn key_structure(model: &QueryModel, segment: &SegmentProperties) -> Arc<KeyStructureInfo> {
        Arc::new(derive_key_structure(&model.dimensions, segment, segment.key_generator().clone()).unwrap())
    }

    #[test]
    fn test_plan_fields() {
        let segment = SegmentProperties::builder()
            .dictionary("country", 8)
            .dictionary_group(&[("city", 4), ("zip", 12)])
            .plain("name")
            .measure("amount", MeasureDataType::Long)
            .build()
            .unwrap();
        let model = QueryModel::new(table())
            .with_dimension("zip")
            .with_dimension("name")
            .with_dimension("country")
            .with_measure("amount", MeasureDataType::Long)
            .with_measure("discount", MeasureDataType::Double)
            .with_raw_detail_query(true);

        let builder = BlockPlanBuilder::new(&model, key_structure(&model, &segment), Arc::default(), 10);
        let plan = builder.build(&info(), &handle(segment)).unwrap();

        assert_eq!(plan.block_id, "Part0/Segment_0/part-0.data");
        assert_eq!(plan.start_blocklet, 1);
        assert_eq!(plan.blocklet_count, 2);
        assert!(plan.raw_detail_query);
        assert!(!plan.fixed_key_update_required);
        assert_eq!(plan.dictionary_groups, vec![0, 1]);
        assert_eq!(plan.plain_groups, vec![2]);
        assert_eq!(plan.fixed_length_key_size, 3);
        assert_eq!(plan.dictionary_column_count(), 2);
        assert_eq!(plan.column_group_key_info[&1].selected_positions, vec![1]);
        assert_eq!(plan.aggregator.measure_exists, vec![true, false]);
        assert_eq!(plan.aggregator.measure_types.len(), 2);
        assert_eq!(plan.total_dimension_groups, 3);
        assert_eq!(plan.total_measure_groups, 1);
        assert_eq!(plan.mask_byte_ranges, vec![0, 1, 2]);
    }

    #[test]
    fn test_canonical_key_remap() {
        let old = SegmentProperties::builder()
            .dictionary("a", 4)
            .dictionary("b", 4)
            .build()
            .unwrap();
        let new = SegmentProperties::builder()
            .dictionary("a", 4)
            .dictionary("b", 4)
            .dictionary("c", 8)
            .build()
            .unwrap();
        let model = QueryModel::new(table()).with_dimension("a").with_dimension("b");
        let builder = BlockPlanBuilder::new(&model, key_structure(&model, &new), Arc::default(), 10);
        let plan = builder.build(&info(), &handle(old)).unwrap();

        assert!(plan.fixed_key_update_required);
        assert_eq!(plan.to_canonical_key(&[0x12]).unwrap(), vec![0x12, 0x00]);
        assert_eq!(plan.masked_canonical_key(&[0x12]).unwrap(), vec![0x12]);
    }

    #[test]
    fn test_complex_dimension_dictionaries() {
        let segment = SegmentProperties::builder()
            .complex(
                "tags",
                ComplexKind::Array,
                vec![ComplexChild::new("tags.val", "val", true)],
                vec![4],
            )
            .build()
            .unwrap();
        let model = QueryModel::new(table()).with_dimension("tags");
        let mut mapping = DictionaryMapping::new();
        mapping.insert(
            "tags.val".to_string(),
            Arc::new(ColumnDictionary::new("tags.val")) as Arc<dyn DictionaryHandle>,
        );

        let builder = BlockPlanBuilder::new(&model, key_structure(&model, &segment), Arc::new(mapping), 10);
        let plan = builder.build(&info(), &handle(segment)).unwrap();

        assert_eq!(plan.complex_parent_groups, vec![0]);
        let complex = &plan.complex_dimensions[&0];
        assert_eq!(complex.kind, ComplexKind::Array);
        assert!(complex.dictionaries.contains_key("tags.val"));
    }

    #[test]
    fn test_filter_error_is_block_scoped() {
        let segment = SegmentProperties::builder().dictionary("a", 8).build().unwrap();
        let model = QueryModel::new(table())
            .with_dimension("a")
            .with_filter(crate::planner::FilterResolverTree::plain(
                "a",
                crate::planner::FilterOperator::Equals,
                "x",
            ));
        let builder = BlockPlanBuilder::new(&model, key_structure(&model, &segment), Arc::default(), 10);
        let err = builder.build(&info(), &handle(segment)).unwrap_err();
        assert_eq!(err.block_id(), Some("Part0/Segment_0/part-0.data"));
    }

    #[test]
    fn test_group_decode_selected() {
        let segment = SegmentProperties::builder()
            .dictionary_group(&[("x", 4), ("y", 4)])
            .build()
            .unwrap();
        let info = ColumnGroupKeyInfo::build(&segment, 0, &[1]).unwrap();
        assert_eq!(info.decode_selected(&[0x5C]).unwrap(), vec![0xC]);
        assert_eq!(info.mask_byte_ranges, vec![0]);
    }
}
