//! Runtime tuning of the traversal engine.

use std::sync::OnceLock;

use crate::{BLOCK_MEMORY_SIZE, CACHE_LINE_SIZE, MAX_UNROLLED_RANK};

const TILE_BYTES_VAR: &str = "NDLOOP_TILE_BYTES";
const MAX_UNROLLED_RANK_VAR: &str = "NDLOOP_MAX_UNROLLED_RANK";

/// Tuning knobs consulted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Byte budget of one tile edge across all participating views.
    pub tile_bytes: usize,
    /// Loop ranks above this use the arbitrary-rank generator.
    pub max_unrolled_rank: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            tile_bytes: CACHE_LINE_SIZE,
            max_unrolled_rank: MAX_UNROLLED_RANK,
        }
    }
}

impl KernelConfig {
    /// Set the tile budget, clamped to `1..=BLOCK_MEMORY_SIZE`.
    pub fn with_tile_bytes(mut self, tile_bytes: usize) -> Self {
        self.tile_bytes = tile_bytes.clamp(1, BLOCK_MEMORY_SIZE);
        self
    }

    /// Set the highest unrolled rank, clamped to `1..=MAX_UNROLLED_RANK`.
    pub fn with_max_unrolled_rank(mut self, rank: usize) -> Self {
        self.max_unrolled_rank = rank.clamp(1, MAX_UNROLLED_RANK);
        self
    }

    /// Defaults overridden by `NDLOOP_TILE_BYTES` and
    /// `NDLOOP_MAX_UNROLLED_RANK`. Unparseable values are ignored with a
    /// warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = read_var(TILE_BYTES_VAR) {
            config = config.with_tile_bytes(value);
        }
        if let Some(value) = read_var(MAX_UNROLLED_RANK_VAR) {
            config = config.with_max_unrolled_rank(value);
        }
        config
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> &'static KernelConfig {
        static GLOBAL: OnceLock<KernelConfig> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = Self::from_env();
            log::debug!("ndloop: using {:?}", config);
            config
        })
    }
}

fn read_var(var: &str) -> Option<usize> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        Ok(_) => {
            log::warn!("ndloop: {}='{}' must be positive; using default", var, raw);
            None
        }
        Err(err) => {
            log::warn!(
                "ndloop: failed to parse {}='{}' ({}); using default",
                var,
                raw,
                err
            );
            None
        }
    }
}
