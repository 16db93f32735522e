//! Per-block schema snapshot
//!
//! `SegmentProperties` records the dimension and measure columns a block was
//! written with, the composite key layout of its dictionary dimensions and
//! the mapping from logical column ordinal to physical column group.

use std::collections::{BTreeSet, HashSet};

use crate::keygen::{bytes_for_bits, KeyGenError, KeyGenResult, KeyGenerator};

use super::column::{
    ComplexChild, ComplexKind, DimensionColumn, DimensionKind, MeasureColumn, MeasureDataType,
    MeasureValue,
};
use super::errors::{SchemaError, SchemaResult};

/// Schema snapshot of one block
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentProperties {
    dimensions: Vec<DimensionColumn>,
    measures: Vec<MeasureColumn>,
    key_generator: KeyGenerator,
    dimension_ordinal_to_group: Vec<usize>,
    group_members: Vec<Vec<usize>>,
    /// Layout of the stored key for groups holding several dictionary columns
    group_key_generators: Vec<Option<KeyGenerator>>,
    /// Fixed row width of dictionary groups; `None` for variable-width groups
    group_value_sizes: Vec<Option<usize>>,
}

impl SegmentProperties {
    /// Starts a schema snapshot
    pub fn builder() -> SegmentPropertiesBuilder {
        SegmentPropertiesBuilder::default()
    }

    pub fn dimensions(&self) -> &[DimensionColumn] {
        &self.dimensions
    }

    pub fn measures(&self) -> &[MeasureColumn] {
        &self.measures
    }

    /// Composite key layout of this block's dictionary dimensions
    pub fn key_generator(&self) -> &KeyGenerator {
        &self.key_generator
    }

    pub fn dimension_by_id(&self, column_id: &str) -> Option<&DimensionColumn> {
        self.dimensions.iter().find(|d| d.column_id() == column_id)
    }

    pub fn measure_by_id(&self, column_id: &str) -> Option<&MeasureColumn> {
        self.measures.iter().find(|m| m.column_id() == column_id)
    }

    /// Physical column group of a dimension ordinal
    pub fn dimension_group(&self, ordinal: usize) -> usize {
        self.dimension_ordinal_to_group[ordinal]
    }

    pub fn dimension_group_count(&self) -> usize {
        self.group_members.len()
    }

    /// Highest dimension column group ordinal, if any
    pub fn last_dimension_group(&self) -> Option<usize> {
        self.group_members.len().checked_sub(1)
    }

    /// Dimension ordinals stored in a group, in key order
    pub fn group_members(&self, group: usize) -> &[usize] {
        &self.group_members[group]
    }

    /// True if the group stores more than one dictionary column
    pub fn is_column_group(&self, group: usize) -> bool {
        self.group_members[group].len() > 1
    }

    pub fn group_key_generator(&self, group: usize) -> Option<&KeyGenerator> {
        self.group_key_generators.get(group).and_then(Option::as_ref)
    }

    pub fn group_value_size(&self, group: usize) -> Option<usize> {
        self.group_value_sizes.get(group).copied().flatten()
    }

    /// Position of a dimension inside its column group
    pub fn position_in_group(&self, ordinal: usize) -> KeyGenResult<usize> {
        let out_of_range = |count| KeyGenError::DimensionOutOfRange {
            dimension: ordinal,
            count,
        };
        let group = *self
            .dimension_ordinal_to_group
            .get(ordinal)
            .ok_or_else(|| out_of_range(self.dimension_ordinal_to_group.len()))?;
        let members = &self.group_members[group];
        members
            .iter()
            .position(|&o| o == ordinal)
            .ok_or_else(|| out_of_range(members.len()))
    }

    /// Measures are stored one per group
    pub fn measure_group(&self, ordinal: usize) -> usize {
        ordinal
    }

    pub fn measure_group_count(&self) -> usize {
        self.measures.len()
    }

    /// Bytes needed to hold the dictionary groups of the given dimensions,
    /// counting each group once.
    pub fn fixed_length_key_size(&self, dimension_ordinals: &[usize]) -> usize {
        let groups: BTreeSet<usize> = dimension_ordinals
            .iter()
            .filter(|&&o| self.dimensions[o].is_dictionary())
            .map(|&o| self.dimension_group(o))
            .collect();
        groups
            .into_iter()
            .filter_map(|g| self.group_value_size(g))
            .sum()
    }
}

enum PendingDimension {
    Dictionary { column_id: String, bits: u8 },
    Plain { column_id: String },
    Complex {
        column_id: String,
        kind: ComplexKind,
        children: Vec<ComplexChild>,
        element_sizes: Vec<usize>,
    },
}

/// Builds a `SegmentProperties` one column group at a time.
///
/// Column groups are numbered in the order they are added; dictionary
/// dimensions take key ordinals in the same order.
#[derive(Default)]
pub struct SegmentPropertiesBuilder {
    groups: Vec<Vec<PendingDimension>>,
    measures: Vec<(String, MeasureDataType, Option<MeasureValue>)>,
}

impl SegmentPropertiesBuilder {
    /// Adds a dictionary dimension stored in its own column group
    pub fn dictionary(self, column_id: impl Into<String>, bits: u8) -> Self {
        self.dictionary_group(&[(column_id.into().as_str(), bits)])
    }

    /// Adds several dictionary dimensions stored together in one column group
    pub fn dictionary_group(mut self, columns: &[(&str, u8)]) -> Self {
        self.groups.push(
            columns
                .iter()
                .map(|(id, bits)| PendingDimension::Dictionary {
                    column_id: id.to_string(),
                    bits: *bits,
                })
                .collect(),
        );
        self
    }

    pub fn plain(mut self, column_id: impl Into<String>) -> Self {
        self.groups.push(vec![PendingDimension::Plain {
            column_id: column_id.into(),
        }]);
        self
    }

    pub fn complex(
        mut self,
        column_id: impl Into<String>,
        kind: ComplexKind,
        children: Vec<ComplexChild>,
        element_sizes: Vec<usize>,
    ) -> Self {
        self.groups.push(vec![PendingDimension::Complex {
            column_id: column_id.into(),
            kind,
            children,
            element_sizes,
        }]);
        self
    }

    pub fn measure(mut self, column_id: impl Into<String>, data_type: MeasureDataType) -> Self {
        self.measures.push((column_id.into(), data_type, None));
        self
    }

    pub fn measure_with_default(
        mut self,
        column_id: impl Into<String>,
        data_type: MeasureDataType,
        default_value: MeasureValue,
    ) -> Self {
        self.measures
            .push((column_id.into(), data_type, Some(default_value)));
        self
    }

    pub fn build(self) -> SchemaResult<SegmentProperties> {
        let mut seen = HashSet::new();
        let mut dimensions = Vec::new();
        let mut bit_lengths = Vec::new();
        let mut dimension_ordinal_to_group = Vec::new();
        let mut group_members = Vec::with_capacity(self.groups.len());
        let mut group_key_generators = Vec::with_capacity(self.groups.len());
        let mut group_value_sizes = Vec::with_capacity(self.groups.len());

        for (group, pending) in self.groups.into_iter().enumerate() {
            let mut members = Vec::with_capacity(pending.len());
            let mut member_bits = Vec::new();

            for dimension in pending {
                let ordinal = dimensions.len();
                let (column_id, kind) = match dimension {
                    PendingDimension::Dictionary { column_id, bits } => {
                        let key_ordinal = bit_lengths.len();
                        bit_lengths.push(bits);
                        member_bits.push(bits);
                        (column_id, DimensionKind::Dictionary { key_ordinal })
                    }
                    PendingDimension::Plain { column_id } => (column_id, DimensionKind::Plain),
                    PendingDimension::Complex {
                        column_id,
                        kind,
                        children,
                        element_sizes,
                    } => {
                        if element_sizes.is_empty() {
                            return Err(SchemaError::MissingElementSize(column_id));
                        }
                        (
                            column_id,
                            DimensionKind::Complex {
                                kind,
                                children,
                                element_sizes,
                            },
                        )
                    }
                };
                if !seen.insert(column_id.clone()) {
                    return Err(SchemaError::DuplicateColumn(column_id));
                }
                dimensions.push(DimensionColumn::new(column_id.clone(), column_id, ordinal, kind));
                dimension_ordinal_to_group.push(group);
                members.push(ordinal);
            }

            match member_bits.len() {
                0 => {
                    group_key_generators.push(None);
                    group_value_sizes.push(None);
                }
                1 => {
                    group_key_generators.push(None);
                    group_value_sizes.push(Some(bytes_for_bits(member_bits[0] as usize)));
                }
                _ => {
                    let generator = KeyGenerator::new(member_bits)?;
                    group_value_sizes.push(Some(generator.key_size_in_bytes()));
                    group_key_generators.push(Some(generator));
                }
            }
            group_members.push(members);
        }

        let mut measures = Vec::with_capacity(self.measures.len());
        for (ordinal, (column_id, data_type, default_value)) in self.measures.into_iter().enumerate() {
            if !seen.insert(column_id.clone()) {
                return Err(SchemaError::DuplicateColumn(column_id));
            }
            let mut measure = MeasureColumn::new(column_id.clone(), column_id, ordinal, data_type);
            if let Some(value) = default_value {
                measure = measure.with_default(value);
            }
            measures.push(measure);
        }

        Ok(SegmentProperties {
            dimensions,
            measures,
            key_generator: KeyGenerator::new(bit_lengths)?,
            dimension_ordinal_to_group,
            group_members,
            group_key_generators,
            group_value_sizes,
        })
    }
}
