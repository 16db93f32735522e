//! Canonical key structure of a query
//!
//! Blocks written under different schema versions pack their dictionary
//! codes with different layouts. One layout is chosen per query and every
//! block key is compared in it.

use crate::cache::BlockHandle;
use crate::keygen::{mask_key, masked_byte_ranges, KeyGenerator};
use crate::observability::{Event, Logger};
use crate::schema::SegmentProperties;

use super::errors::{PlannerError, PlannerResult};
use super::model::QueryDimension;

/// Query-wide key layout, shared by every block plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStructureInfo {
    key_generator: KeyGenerator,
    mask_byte_ranges: Vec<usize>,
    /// Advisory bound used to mask keys; `None` when it could not be built
    max_key: Option<Vec<u8>>,
}

impl KeyStructureInfo {
    pub fn new(key_generator: KeyGenerator, mask_byte_ranges: Vec<usize>, max_key: Option<Vec<u8>>) -> Self {
        Self {
            key_generator,
            mask_byte_ranges,
            max_key,
        }
    }

    pub fn key_generator(&self) -> &KeyGenerator {
        &self.key_generator
    }

    /// Sorted key byte positions holding the projected dictionary dimensions
    pub fn mask_byte_ranges(&self) -> &[usize] {
        &self.mask_byte_ranges
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.max_key.as_deref()
    }

    pub fn key_size(&self) -> usize {
        self.key_generator.key_size_in_bytes()
    }

    /// Projects a canonical key onto the masked bytes
    pub fn mask_key(&self, key: &[u8]) -> Vec<u8> {
        mask_key(key, &self.mask_byte_ranges, self.max_key())
    }
}

/// Canonical generator chosen for a set of blocks
#[derive(Debug, Clone)]
pub struct CanonicalLayout {
    pub key_generator: KeyGenerator,
    /// Block whose schema names the canonical key ordinals
    pub reference: usize,
    /// True if no single block covered the others and the layout was merged
    pub widened: bool,
}

/// Picks the widest block layout, later blocks winning ties. If that layout
/// cannot hold every block's keys the element-wise widest layout is used.
pub fn select_canonical_layout(blocks: &[BlockHandle]) -> PlannerResult<CanonicalLayout> {
    let mut reference = None;
    let mut widest_bits = 0;
    for (i, block) in blocks.iter().enumerate() {
        let bits = block.segment_properties().key_generator().total_bits();
        if reference.is_none() || bits >= widest_bits {
            reference = Some(i);
            widest_bits = bits;
        }
    }
    let reference =
        reference.ok_or_else(|| PlannerError::invalid_query("Query selects no blocks"))?;

    let candidate = blocks[reference].segment_properties().key_generator();
    if blocks
        .iter()
        .all(|b| candidate.covers(b.segment_properties().key_generator()))
    {
        return Ok(CanonicalLayout {
            key_generator: candidate.clone(),
            reference,
            widened: false,
        });
    }

    let merged = KeyGenerator::widest_of(blocks.iter().map(|b| b.segment_properties().key_generator()))
        .map_err(|e| PlannerError::key_structure(format!("Failed to merge block key layouts: {}", e)))?;
    Logger::warn(
        Event::KeyStructureWidened.as_str(),
        &[
            ("reference_block", blocks[reference].file_path()),
            ("bits", &merged.total_bits().to_string()),
        ],
    );
    Ok(CanonicalLayout {
        key_generator: merged,
        reference,
        widened: true,
    })
}

/// Derives the key structure for the projected dimensions.
///
/// Key ordinals come from `reference`. Dimensions outside the canonical
/// layout are left out of the mask; the max key then degrades to `None`.
pub fn derive_key_structure(
    dimensions: &[QueryDimension],
    reference: &SegmentProperties,
    key_generator: KeyGenerator,
) -> PlannerResult<KeyStructureInfo> {
    let key_ordinals: Vec<usize> = dimensions
        .iter()
        .filter_map(|d| reference.dimension_by_id(&d.column_id))
        .filter_map(|d| d.key_ordinal())
        .collect();
    let in_layout: Vec<usize> = key_ordinals
        .iter()
        .copied()
        .filter(|&o| o < key_generator.dimension_count())
        .collect();

    let mask = masked_byte_ranges(&key_generator, &in_layout)
        .map_err(|e| PlannerError::key_structure(format!("Failed to mask canonical key: {}", e)))?;
    let max_key = max_key_hint(&key_generator, &key_ordinals);

    Ok(KeyStructureInfo::new(key_generator, mask, max_key))
}

/// Max key over the given key ordinals. Failure is logged and yields `None`.
pub fn max_key_hint(key_generator: &KeyGenerator, key_ordinals: &[usize]) -> Option<Vec<u8>> {
    match key_generator.max_key_for(key_ordinals) {
        Ok(key) => Some(key),
        Err(err) => {
            Logger::warn(
                Event::MaxKeyDegraded.as_str(),
                &[("reason", &err.to_string())],
            );
            None
        }
    }
}
