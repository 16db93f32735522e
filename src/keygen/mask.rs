//! Masked byte helpers
//!
//! A query only needs the bytes of the composite key that hold its
//! dictionary dimensions. The mask byte ranges list those byte positions in
//! ascending order; the masked byte lookup maps every key byte to its slot in
//! the masked key, or `None` when the byte is dropped.

use std::collections::BTreeSet;

use super::errors::KeyGenResult;
use super::generator::KeyGenerator;

/// Sorted, de-duplicated key byte positions covering the given key ordinals.
pub fn masked_byte_ranges(generator: &KeyGenerator, key_ordinals: &[usize]) -> KeyGenResult<Vec<usize>> {
    let mut bytes = BTreeSet::new();
    for &ordinal in key_ordinals {
        let (start, end) = generator.key_byte_offsets(ordinal)?;
        bytes.extend(start..=end);
    }
    Ok(bytes.into_iter().collect())
}

/// For each byte of a `key_size`-byte key, its index in the masked key.
pub fn masked_byte_lookup(key_size: usize, mask_byte_ranges: &[usize]) -> Vec<Option<usize>> {
    let mut lookup = vec![None; key_size];
    for (slot, &byte) in mask_byte_ranges.iter().enumerate() {
        if let Some(entry) = lookup.get_mut(byte) {
            *entry = Some(slot);
        }
    }
    lookup
}

/// Gathers the masked bytes of `key`, clearing bits outside `max_key` when
/// one is given.
pub fn mask_key(key: &[u8], mask_byte_ranges: &[usize], max_key: Option<&[u8]>) -> Vec<u8> {
    mask_byte_ranges
        .iter()
        .filter_map(|&byte| {
            let value = *key.get(byte)?;
            Some(match max_key.and_then(|m| m.get(byte)) {
                Some(mask) => value & mask,
                None => value,
            })
        })
        .collect()
}
