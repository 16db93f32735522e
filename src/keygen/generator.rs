//! Bit-packed composite key generator
//!
//! Dictionary codes are concatenated most-significant dimension first into
//! one big-endian bit string. The string is right-aligned in the smallest
//! byte array that holds it, so any padding bits sit at the front of the
//! first byte.

use super::errors::{KeyGenError, KeyGenResult};

/// Number of bytes needed to hold `bits` bits
pub fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Fixed-width packing scheme for dictionary-encoded dimension codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyGenerator {
    bit_lengths: Vec<u8>,
    /// Bit position of each dimension inside the key, padding included
    bit_offsets: Vec<usize>,
    key_size: usize,
}

impl KeyGenerator {
    /// Creates a generator for the given per-dimension bit widths.
    pub fn new(bit_lengths: Vec<u8>) -> KeyGenResult<Self> {
        for (dimension, &bits) in bit_lengths.iter().enumerate() {
            if bits == 0 || bits > 64 {
                return Err(KeyGenError::InvalidBitLength { dimension, bits });
            }
        }

        let total_bits: usize = bit_lengths.iter().map(|&b| b as usize).sum();
        let key_size = bytes_for_bits(total_bits);
        let padding = key_size * 8 - total_bits;

        let mut bit_offsets = Vec::with_capacity(bit_lengths.len());
        let mut cursor = padding;
        for &bits in &bit_lengths {
            bit_offsets.push(cursor);
            cursor += bits as usize;
        }

        Ok(Self {
            bit_lengths,
            bit_offsets,
            key_size,
        })
    }

    /// Element-wise widest layout of all given generators.
    ///
    /// The result has as many dimensions as the longest input and each
    /// dimension takes the largest width seen for it, so it covers every input.
    pub fn widest_of<'a>(generators: impl IntoIterator<Item = &'a KeyGenerator>) -> KeyGenResult<Self> {
        let mut widths: Vec<u8> = Vec::new();
        for generator in generators {
            for (i, &bits) in generator.bit_lengths.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(bits);
                } else {
                    widths.push(bits);
                }
            }
        }
        Self::new(widths)
    }

    /// Per-dimension bit widths
    pub fn bit_lengths(&self) -> &[u8] {
        &self.bit_lengths
    }

    /// Number of packed dimensions
    pub fn dimension_count(&self) -> usize {
        self.bit_lengths.len()
    }

    /// Sum of all dimension widths
    pub fn total_bits(&self) -> usize {
        self.bit_lengths.iter().map(|&b| b as usize).sum()
    }

    /// Size of a composite key in bytes
    pub fn key_size_in_bytes(&self) -> usize {
        self.key_size
    }

    /// Largest code representable for a dimension
    pub fn max_value(&self, dimension: usize) -> KeyGenResult<u64> {
        let bits = self.bits_of(dimension)?;
        Ok(if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        })
    }

    /// Inclusive byte range occupied by a dimension inside the key.
    pub fn key_byte_offsets(&self, dimension: usize) -> KeyGenResult<(usize, usize)> {
        let bits = self.bits_of(dimension)? as usize;
        let start = self.bit_offsets[dimension];
        Ok((start / 8, (start + bits - 1) / 8))
    }

    /// Packs one code per dimension into a composite key.
    pub fn generate_key(&self, values: &[u64]) -> KeyGenResult<Vec<u8>> {
        if values.len() != self.bit_lengths.len() {
            return Err(KeyGenError::DimensionCountMismatch {
                expected: self.bit_lengths.len(),
                actual: values.len(),
            });
        }

        let mut key = vec![0u8; self.key_size];
        for (dimension, &value) in values.iter().enumerate() {
            if value > self.max_value(dimension)? {
                return Err(KeyGenError::ValueOverflow {
                    dimension,
                    value,
                    bits: self.bit_lengths[dimension],
                });
            }
            write_bits(
                &mut key,
                self.bit_offsets[dimension],
                self.bit_lengths[dimension] as usize,
                value,
            );
        }
        Ok(key)
    }

    /// Unpacks a composite key into one code per dimension.
    pub fn get_key_array(&self, key: &[u8]) -> KeyGenResult<Vec<u64>> {
        if key.len() != self.key_size {
            return Err(KeyGenError::KeySizeMismatch {
                expected: self.key_size,
                actual: key.len(),
            });
        }

        Ok(self
            .bit_lengths
            .iter()
            .zip(&self.bit_offsets)
            .map(|(&bits, &offset)| read_bits(key, offset, bits as usize))
            .collect())
    }

    /// Composite key with every listed dimension at its maximum code and all
    /// other dimensions at zero.
    pub fn max_key_for(&self, dimensions: &[usize]) -> KeyGenResult<Vec<u8>> {
        let mut values = vec![0u64; self.bit_lengths.len()];
        for &dimension in dimensions {
            // max_value rejects dimensions outside the layout
            values[dimension] = self.max_value(dimension)?;
        }
        self.generate_key(&values)
    }

    /// Composite key with every dimension at its maximum code.
    pub fn max_key(&self) -> KeyGenResult<Vec<u8>> {
        let all: Vec<usize> = (0..self.bit_lengths.len()).collect();
        self.max_key_for(&all)
    }

    /// All-zero composite key.
    pub fn min_key(&self) -> Vec<u8> {
        vec![0u8; self.key_size]
    }

    /// True if every key of `other` can be re-encoded under this layout
    /// without truncation.
    pub fn covers(&self, other: &KeyGenerator) -> bool {
        other.bit_lengths.len() <= self.bit_lengths.len()
            && other
                .bit_lengths
                .iter()
                .zip(&self.bit_lengths)
                .all(|(theirs, ours)| theirs <= ours)
    }

    /// Re-encodes a key written under `source` into this layout.
    ///
    /// Dimensions `source` does not have are filled with code 0.
    pub fn remap_from(&self, source: &KeyGenerator, key: &[u8]) -> KeyGenResult<Vec<u8>> {
        if !self.covers(source) {
            return Err(KeyGenError::NotCoverable {
                target: self.bit_lengths.clone(),
                source_bits: source.bit_lengths.clone(),
            });
        }
        let mut values = source.get_key_array(key)?;
        values.resize(self.bit_lengths.len(), 0);
        self.generate_key(&values)
    }

    fn bits_of(&self, dimension: usize) -> KeyGenResult<u8> {
        self.bit_lengths
            .get(dimension)
            .copied()
            .ok_or(KeyGenError::DimensionOutOfRange {
                dimension,
                count: self.bit_lengths.len(),
            })
    }
}

fn write_bits(key: &mut [u8], offset: usize, len: usize, value: u64) {
    for j in 0..len {
        if (value >> (len - 1 - j)) & 1 == 1 {
            let pos = offset + j;
            key[pos / 8] |= 1 << (7 - pos % 8);
        }
    }
}

fn read_bits(key: &[u8], offset: usize, len: usize) -> u64 {
    let mut value = 0u64;
    for j in 0..len {
        let pos = offset + j;
        let bit = (key[pos / 8] >> (7 - pos % 8)) & 1;
        value = (value << 1) | bit as u64;
    }
    value
}

/// Reads a big-endian unsigned value of up to eight bytes.
pub fn read_be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size_rounds_up() {
        let generator = KeyGenerator::new(vec![4, 4, 4]).unwrap();
        assert_eq!(generator.total_bits(), 12);
        assert_eq!(generator.key_size_in_bytes(), 2);
    }

    #[test]
    fn test_generate_and_decode() {
        let generator = KeyGenerator::new(vec![3, 9, 12]).unwrap();
        let key = generator.generate_key(&[5, 300, 4000]).unwrap();
        assert_eq!(key.len(), 3);
        assert_eq!(generator.get_key_array(&key).unwrap(), vec![5, 300, 4000]);
    }

    #[test]
    fn test_padding_sits_in_front() {
        let generator = KeyGenerator::new(vec![4, 4, 4]).unwrap();
        let key = generator.generate_key(&[0x1, 0x2, 0x3]).unwrap();
        assert_eq!(key, vec![0x01, 0x23]);
    }

    #[test]
    fn test_overflow_rejected() {
        let generator = KeyGenerator::new(vec![4]).unwrap();
        let err = generator.generate_key(&[16]).unwrap_err();
        assert!(matches!(err, KeyGenError::ValueOverflow { dimension: 0, .. }));
    }

    #[test]
    fn test_invalid_bit_length() {
        assert!(KeyGenerator::new(vec![4, 0]).is_err());
        assert!(KeyGenerator::new(vec![65]).is_err());
    }

    #[test]
    fn test_full_width_dimension() {
        let generator = KeyGenerator::new(vec![64, 2]).unwrap();
        let key = generator.generate_key(&[u64::MAX, 3]).unwrap();
        assert_eq!(generator.get_key_array(&key).unwrap(), vec![u64::MAX, 3]);
    }

    #[test]
    fn test_byte_offsets() {
        // 12 bits -> 4 bits padding; dims at bits 4..8, 8..12, 12..16
        let generator = KeyGenerator::new(vec![4, 4, 4]).unwrap();
        assert_eq!(generator.key_byte_offsets(0).unwrap(), (0, 0));
        assert_eq!(generator.key_byte_offsets(1).unwrap(), (1, 1));
        assert_eq!(generator.key_byte_offsets(2).unwrap(), (1, 1));

        let wide = KeyGenerator::new(vec![6, 6]).unwrap();
        assert_eq!(wide.key_byte_offsets(0).unwrap(), (0, 1));
        assert_eq!(wide.key_byte_offsets(1).unwrap(), (1, 1));
    }

    #[test]
    fn test_max_key_for_subset() {
        let generator = KeyGenerator::new(vec![4, 4, 4, 4]).unwrap();
        let key = generator.max_key_for(&[1, 3]).unwrap();
        assert_eq!(generator.get_key_array(&key).unwrap(), vec![0, 15, 0, 15]);
        assert!(generator.max_key_for(&[4]).is_err());
    }

    #[test]
    fn test_remap_older_key() {
        let older = KeyGenerator::new(vec![4, 4, 4]).unwrap();
        let newer = KeyGenerator::new(vec![4, 4, 4, 4]).unwrap();
        let key = older.generate_key(&[7, 8, 9]).unwrap();
        let remapped = newer.remap_from(&older, &key).unwrap();
        assert_eq!(newer.get_key_array(&remapped).unwrap(), vec![7, 8, 9, 0]);
        assert!(older.remap_from(&newer, &remapped).is_err());
    }

    #[test]
    fn test_widest_of() {
        let a = KeyGenerator::new(vec![8, 4]).unwrap();
        let b = KeyGenerator::new(vec![4, 4, 4]).unwrap();
        let widest = KeyGenerator::widest_of([&a, &b]).unwrap();
        assert_eq!(widest.bit_lengths(), &[8, 4, 4]);
        assert!(widest.covers(&a));
        assert!(widest.covers(&b));
    }

    #[test]
    fn test_read_be_u64() {
        assert_eq!(read_be_u64(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_be_u64(&[]), 0);
    }
}
