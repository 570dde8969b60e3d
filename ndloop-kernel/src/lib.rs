//! Cache-aware traversal of strided N-dimensional views.
//!
//! The engine decides, for an arbitrary-rank view described purely by
//! dims/strides/offset/order, the cheapest correct way to visit every element
//! exactly once, and delegates the per-element work to a caller-supplied
//! primitive operating on rank-1 lanes.
//!
//! # Pipeline
//!
//! 1. [`dispatch`]: validate the participating views, split dimensions into
//!    loop and core dimensions, and pick a route ([`Route`]) from the
//!    observed geometry
//! 2. [`kernel`]: per-rank odometer generators (ranks 1..=10), blocked
//!    variants, and an arbitrary-rank fallback
//! 3. [`strategy`]: adapt each core sub-view to a rank-1 lane (identity,
//!    squeeze, contiguous remap, or scratch copy)
//! 4. [`primitives`]: element primitives over lanes
//!
//! # Operations
//!
//! - [`includes`], [`includes_along`]: membership search with early exit
//! - [`sum`], [`sum_along`], [`count_along`]: reductions over core dimensions
//! - [`map_into`], [`cumsum_along`], [`fill`]: elementwise and core-to-core maps
//! - [`for_each_index`], [`traverse`]: raw traversal
//!
//! # Example
//!
//! ```rust
//! use ndloop_kernel::{includes, StridedView};
//!
//! let data: Vec<f64> = (1..=12).map(|x| x as f64).collect();
//! // Elements 3, 4, 7, 8, 11, 12.
//! let view = StridedView::<f64>::new(&data, &[3, 1, 2], &[4, 4, 1], 2, Default::default()).unwrap();
//! assert!(includes(&view, 3.0).unwrap());
//! assert!(!includes(&view, -99.0).unwrap());
//! ```

pub mod block;
pub mod config;
pub mod dispatch;
pub mod geometry;
pub mod kernel;
pub mod ops;
pub mod order;
pub mod primitives;
pub mod strategy;

pub use config::KernelConfig;
pub use dispatch::{
    execute, map_subarrays_into, normalize_dims, plan_loops, reduce_subarrays_into, traverse,
    LoopPlan, Route,
};
pub use ops::{
    count_along, cumsum_along, fill, for_each_index, includes, includes_along, map_into, sum,
    sum_along,
};
pub use order::{loop_order, LoopOrder};
pub use strategy::{ElementOrder, Reshape};

pub use ndloop_view::{
    col_major_strides, row_major_strides, AsStridedView, DType, Element, ElementAccess,
    ElementAccessMut, NdLoopError, Order, PackedBits, Result, ScratchAlloc, StridedArray,
    StridedLane, StridedLaneMut, StridedView, StridedViewMut,
};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for the tile working set, in bytes (typical L1 data cache).
pub const BLOCK_MEMORY_SIZE: usize = 32 * 1024;

/// Cache line size in bytes; the default tile budget per dimension.
pub const CACHE_LINE_SIZE: usize = 64;

/// Highest loop rank with a monomorphized generator.
pub const MAX_UNROLLED_RANK: usize = 10;
