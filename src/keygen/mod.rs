//! Composite key generation
//!
//! Dictionary-encoded dimension codes are packed into one fixed-width
//! composite key per row. Blocks written under different schema versions
//! may use layouts of different widths; `KeyGenerator::remap_from` moves a
//! key between layouts when the target covers the source.

mod errors;
mod generator;
mod mask;

pub use errors::{KeyGenError, KeyGenResult};
pub use generator::{bytes_for_bits, read_be_u64, KeyGenerator};
pub use mask::{mask_key, masked_byte_lookup, masked_byte_ranges};
