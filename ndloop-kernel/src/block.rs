//! Tile size for the blocked generators.

use ndloop_traits::DType;

use crate::config::KernelConfig;

/// Bytes assumed for element types without a fixed width.
const GENERIC_ELEMENT_BYTES: usize = 8;

/// Tile edge, in elements, for a traversal touching views of `dtypes`.
///
/// One tile row of every participating view together should fit the
/// configured byte budget: `max(1, tile_bytes / Σ bytes(dtype))`.
pub fn block_size(dtypes: &[DType], config: &KernelConfig) -> usize {
    let bytes: usize = dtypes
        .iter()
        .map(|dt| dt.byte_size().unwrap_or(GENERIC_ELEMENT_BYTES))
        .sum();
    if bytes == 0 {
        return config.tile_bytes.max(1);
    }
    (config.tile_bytes / bytes).max(1)
}
