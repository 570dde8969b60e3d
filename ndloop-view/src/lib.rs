//! Dynamic-rank strided views for the ndloop traversal engine.
//!
//! A view is a windowed interpretation of a flat buffer: `(data, dims,
//! strides, offset, order)`. Views never own their data; the storage type is a
//! generic parameter implementing [`ElementAccess`], so plain slices and
//! accessor-based buffers such as [`PackedBits`] flow through the same code.
//!
//! # Core Types
//!
//! - [`StridedView`] / [`StridedViewMut`]: dynamic-rank views over existing data
//! - [`StridedArray`]: owned strided multidimensional array
//! - [`StridedLane`] / [`StridedLaneMut`]: rank-1 views handed to element
//!   primitives
//!
//! # Metadata Transformations
//!
//! These operate only on dims/strides/offset and never touch the data:
//! - `permute`: reorder dimensions
//! - `broadcast`: expand size-1 dimensions with stride 0
//! - `flip`: reverse one dimension (negative stride)
//! - `as_real_components`: reinterpret a complex view as interleaved reals

mod complex;
pub mod lane;
pub mod view;

pub use lane::{StridedLane, StridedLaneMut};
pub use ndloop_traits::{DType, Element, ElementAccess, ElementAccessMut, PackedBits, ScratchAlloc};
pub use view::{
    col_major_strides, row_major_strides, AsStridedView, Order, StridedArray, StridedView,
    StridedViewMut,
};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by view construction and traversal.
///
/// Every structural error is detected before any element is visited.
#[derive(Debug, thiserror::Error)]
pub enum NdLoopError {
    /// Array ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Array shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Dimension index outside `[-rank, rank - 1]`.
    #[error("dimension index {index} out of range for rank {rank}")]
    DimensionIndex { index: isize, rank: usize },

    /// The same dimension was selected twice after normalization.
    #[error("duplicate dimension {dim}")]
    DuplicateDimension { dim: usize },

    /// A scratch workspace could not be reserved.
    #[error("failed to allocate a workspace of {len} elements")]
    AllocationFailure { len: usize },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow or out-of-range access while computing an offset.
    #[error("offset overflow while computing buffer index")]
    OffsetOverflow,
}

/// Result type for ndloop operations.
pub type Result<T> = std::result::Result<T, NdLoopError>;
