//! Dynamic-rank strided view types.
//!
//! - [`StridedView`]: shared dynamic-rank view over borrowed storage
//! - [`StridedViewMut`]: exclusive dynamic-rank view over borrowed storage
//! - [`StridedArray`]: owned strided multidimensional array
//!
//! Storage is any `S: ElementAccess`; it defaults to a plain slice `[T]`.
//! Every access goes through the storage's bounds-checked `get`/`set`, so a
//! view built with [`StridedView::new_unchecked`] that reaches outside its
//! buffer panics instead of reading foreign memory.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use ndloop_traits::{DType, Element, ElementAccess, ElementAccessMut};

use crate::{NdLoopError, Result};

/// Logical element order of a view.
///
/// The order does not affect addressing (strides do that); it defines which
/// index varies fastest when the elements of a view are enumerated in
/// "logical" order, e.g. when a sub-view is copied into a scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Last index varies fastest (C default).
    #[default]
    RowMajor,
    /// First index varies fastest (Fortran/Julia default).
    ColumnMajor,
}

impl Order {
    /// Strides of a densely packed array of `dims` in this order.
    pub fn strides(self, dims: &[usize]) -> Vec<isize> {
        match self {
            Order::RowMajor => row_major_strides(dims),
            Order::ColumnMajor => col_major_strides(dims),
        }
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
pub(crate) fn validate_bounds(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: isize,
) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(NdLoopError::StrideLengthMismatch);
    }
    // Empty array - no access needed
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(NdLoopError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(NdLoopError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(NdLoopError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 {
        return Err(NdLoopError::OffsetOverflow);
    }
    if max_offset as usize >= len {
        return Err(NdLoopError::OffsetOverflow);
    }
    Ok(())
}

/// Buffer index of `indices`, with per-dimension bounds assertions.
#[inline]
fn buffer_index(dims: &[usize], strides: &[isize], offset: isize, indices: &[usize]) -> usize {
    assert_eq!(indices.len(), dims.len(), "wrong number of indices");
    let mut idx = offset;
    for (i, &index) in indices.iter().enumerate() {
        assert!(
            index < dims[i],
            "index {} out of bounds for dim {}",
            index,
            dims[i]
        );
        idx += index as isize * strides[i];
    }
    // A negative index wraps to a huge usize and fails the storage bounds check.
    idx as usize
}

fn check_permutation(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(NdLoopError::RankMismatch(perm.len(), rank));
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank {
            return Err(NdLoopError::DimensionIndex {
                index: p as isize,
                rank,
            });
        }
        if seen[p] {
            return Err(NdLoopError::DuplicateDimension { dim: p });
        }
        seen[p] = true;
    }
    Ok(())
}

fn broadcast_strides(
    dims: &[usize],
    strides: &[isize],
    target_dims: &[usize],
) -> Result<Vec<isize>> {
    if dims.len() != target_dims.len() {
        return Err(NdLoopError::RankMismatch(dims.len(), target_dims.len()));
    }
    let mut new_strides = Vec::with_capacity(dims.len());
    for i in 0..dims.len() {
        if dims[i] == target_dims[i] {
            new_strides.push(strides[i]);
        } else if dims[i] == 1 {
            new_strides.push(0);
        } else {
            return Err(NdLoopError::ShapeMismatch(
                dims.to_vec(),
                target_dims.to_vec(),
            ));
        }
    }
    Ok(new_strides)
}

/// Strides and offset after reversing `axis`.
fn flipped(
    dims: &[usize],
    strides: &[isize],
    offset: isize,
    axis: usize,
) -> Result<(Vec<isize>, isize)> {
    let rank = dims.len();
    if axis >= rank {
        return Err(NdLoopError::DimensionIndex {
            index: axis as isize,
            rank,
        });
    }
    let mut new_strides = strides.to_vec();
    let mut new_offset = offset;
    if dims[axis] > 0 {
        new_offset += (dims[axis] as isize - 1) * strides[axis];
    }
    new_strides[axis] = -strides[axis];
    Ok((new_strides, new_offset))
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1] as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1] as isize;
    }
    strides
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank shared strided view.
///
/// # Type Parameters
/// - `'a`: Lifetime of the underlying storage
/// - `T`: Element type
/// - `S`: Storage, `[T]` by default; any [`ElementAccess`] with `Elem = T`
pub struct StridedView<'a, T, S: ?Sized = [T]> {
    data: &'a S,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    order: Order,
    _elem: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> Clone for StridedView<'_, T, S> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        }
    }
}

impl<T, S: ?Sized> fmt::Debug for StridedView<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl<'a, T, S> StridedView<'a, T, S>
where
    T: Copy,
    S: ElementAccess<Elem = T> + ?Sized,
{
    /// Create a new view, verifying every reachable index lies in the buffer.
    pub fn new(
        data: &'a S,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: Order,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self::new_unchecked(data, dims, strides, offset, order))
    }

    /// Create a view without verifying its geometry.
    ///
    /// Accessing an element outside the buffer panics.
    pub fn new_unchecked(
        data: &'a S,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: Order,
    ) -> Self {
        assert_eq!(dims.len(), strides.len(), "stride and dims length mismatch");
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
            _elem: PhantomData,
        }
    }

    /// Dense row-major view over the first `numel(dims)` elements of `data`.
    pub fn row_major(data: &'a S, dims: &[usize]) -> Result<Self> {
        Self::new(data, dims, &row_major_strides(dims), 0, Order::RowMajor)
    }

    /// Dense column-major view over the first `numel(dims)` elements of `data`.
    pub fn col_major(data: &'a S, dims: &[usize]) -> Result<Self> {
        Self::new(data, dims, &col_major_strides(dims), 0, Order::ColumnMajor)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements (1 for a rank-0 view).
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &'a S {
        self.data
    }

    /// Get an element by multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> T {
        self.data
            .get(buffer_index(&self.dims, &self.strides, self.offset, indices))
    }

    /// Replace the logical order without touching the geometry.
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Permute dimensions.
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a, T, S>> {
        check_permutation(perm, self.dims.len())?;
        let new_dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let new_strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(StridedView {
            data: self.data,
            dims: Arc::from(new_dims),
            strides: Arc::from(new_strides),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        })
    }

    /// Broadcast this view to a target shape.
    ///
    /// Size-1 dimensions are expanded (stride set to 0) to match target.
    pub fn broadcast(&self, target_dims: &[usize]) -> Result<StridedView<'a, T, S>> {
        let new_strides = broadcast_strides(&self.dims, &self.strides, target_dims)?;
        Ok(StridedView {
            data: self.data,
            dims: Arc::from(target_dims),
            strides: Arc::from(new_strides),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        })
    }

    /// Reverse the direction of `axis`.
    pub fn flip(&self, axis: usize) -> Result<StridedView<'a, T, S>> {
        let (strides, offset) = flipped(&self.dims, &self.strides, self.offset, axis)?;
        Ok(StridedView {
            data: self.data,
            dims: self.dims.clone(),
            strides: Arc::from(strides),
            offset,
            order: self.order,
            _elem: PhantomData,
        })
    }
}

impl<T: Element, S: ElementAccess<Elem = T> + ?Sized> StridedView<'_, T, S> {
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Dynamic-rank exclusive strided view.
pub struct StridedViewMut<'a, T, S: ?Sized = [T]> {
    data: &'a mut S,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    order: Order,
    _elem: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> fmt::Debug for StridedViewMut<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl<'a, T, S> StridedViewMut<'a, T, S>
where
    T: Copy,
    S: ElementAccessMut<Elem = T> + ?Sized,
{
    /// Create a new mutable view, verifying every reachable index.
    pub fn new(
        data: &'a mut S,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: Order,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self::new_unchecked(data, dims, strides, offset, order))
    }

    /// Create without verifying the geometry; out-of-range access panics.
    pub fn new_unchecked(
        data: &'a mut S,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: Order,
    ) -> Self {
        assert_eq!(dims.len(), strides.len(), "stride and dims length mismatch");
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
            _elem: PhantomData,
        }
    }

    pub fn row_major(data: &'a mut S, dims: &[usize]) -> Result<Self> {
        Self::new(data, dims, &row_major_strides(dims), 0, Order::RowMajor)
    }

    pub fn col_major(data: &'a mut S, dims: &[usize]) -> Result<Self> {
        Self::new(data, dims, &col_major_strides(dims), 0, Order::ColumnMajor)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &S {
        &*self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut S {
        &mut *self.data
    }

    /// Give up the view and keep the storage borrow.
    #[inline]
    pub fn into_data(self) -> &'a mut S {
        self.data
    }

    pub fn get(&self, indices: &[usize]) -> T {
        self.data
            .get(buffer_index(&self.dims, &self.strides, self.offset, indices))
    }

    pub fn set(&mut self, indices: &[usize], value: T) {
        let idx = buffer_index(&self.dims, &self.strides, self.offset, indices);
        self.data.set(idx, value);
    }

    /// Reborrow as a shorter-lived mutable view.
    pub fn reborrow(&mut self) -> StridedViewMut<'_, T, S> {
        StridedViewMut {
            data: &mut *self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        }
    }

    /// Reborrow as a shared view.
    pub fn as_view(&self) -> StridedView<'_, T, S> {
        StridedView {
            data: &*self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        }
    }

    /// Permute dimensions, consuming the mutable view.
    ///
    /// Takes `self` by value to prevent aliasing of mutable views.
    pub fn permute(self, perm: &[usize]) -> Result<StridedViewMut<'a, T, S>> {
        check_permutation(perm, self.dims.len())?;
        let new_dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let new_strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(StridedViewMut {
            data: self.data,
            dims: Arc::from(new_dims),
            strides: Arc::from(new_strides),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        })
    }

    /// Reverse the direction of `axis`, consuming the mutable view.
    pub fn flip(self, axis: usize) -> Result<StridedViewMut<'a, T, S>> {
        let (strides, offset) = flipped(&self.dims, &self.strides, self.offset, axis)?;
        Ok(StridedViewMut {
            data: self.data,
            dims: self.dims,
            strides: Arc::from(strides),
            offset,
            order: self.order,
            _elem: PhantomData,
        })
    }
}

impl<T: Element, S: ElementAccessMut<Elem = T> + ?Sized> StridedViewMut<'_, T, S> {
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }
}

// ============================================================================
// StridedArray
// ============================================================================

/// Owned strided multidimensional array.
///
/// Supports both row-major (C default) and column-major layouts.
pub struct StridedArray<T> {
    data: Vec<T>,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    order: Order,
}

impl<T> fmt::Debug for StridedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedArray")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl<T: Clone> Clone for StridedArray<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
        }
    }
}

impl<T: Clone + Default> StridedArray<T> {
    /// Create a column-major array filled with `Default` values.
    pub fn col_major(dims: &[usize]) -> Self {
        Self::filled(dims, Order::ColumnMajor)
    }

    /// Create a row-major array filled with `Default` values.
    pub fn row_major(dims: &[usize]) -> Self {
        Self::filled(dims, Order::RowMajor)
    }

    fn filled(dims: &[usize], order: Order) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![T::default(); total],
            dims: Arc::from(dims),
            strides: Arc::from(order.strides(dims)),
            offset: 0,
            order,
        }
    }
}

impl<T> StridedArray<T> {
    /// Create a column-major array with values produced by a function.
    ///
    /// The function is called with indices in column-major iteration order.
    pub fn from_fn_col_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in 0..rank {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(col_major_strides(dims)),
            offset: 0,
            order: Order::ColumnMajor,
        }
    }

    /// Create a row-major array with values produced by a function.
    ///
    /// The function is called with indices in row-major iteration order.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(row_major_strides(dims)),
            offset: 0,
            order: Order::RowMajor,
        }
    }

    /// Create from raw parts.
    pub fn from_parts(
        data: Vec<T>,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: Order,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    fn index_of(&self, indices: &[usize]) -> usize {
        buffer_index(&self.dims, &self.strides, self.offset, indices)
    }
}

impl<T: Copy> StridedArray<T> {
    /// Create an immutable view over this array.
    pub fn view(&self) -> StridedView<'_, T> {
        StridedView {
            data: &self.data[..],
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        }
    }

    /// Create a mutable view over this array.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            data: &mut self.data[..],
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
            _elem: PhantomData,
        }
    }

    /// Get an element by multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.index_of(indices)]
    }

    /// Set an element by multi-dimensional index.
    pub fn set(&mut self, indices: &[usize], value: T) {
        let idx = self.index_of(indices);
        self.data[idx] = value;
    }
}

impl<T> Index<&[usize]> for StridedArray<T> {
    type Output = T;

    fn index(&self, indices: &[usize]) -> &T {
        &self.data[self.index_of(indices)]
    }
}

impl<T> IndexMut<&[usize]> for StridedArray<T> {
    fn index_mut(&mut self, indices: &[usize]) -> &mut T {
        let idx = self.index_of(indices);
        &mut self.data[idx]
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Anything that can be seen as a [`StridedView`].
///
/// Slices and vectors become dense rank-1 views; arrays and views keep their
/// geometry.
pub trait AsStridedView {
    type Elem: Copy;
    type Storage: ElementAccess<Elem = Self::Elem> + ?Sized;

    fn as_strided_view(&self) -> StridedView<'_, Self::Elem, Self::Storage>;
}

impl<T: Copy> AsStridedView for [T] {
    type Elem = T;
    type Storage = [T];

    fn as_strided_view(&self) -> StridedView<'_, T> {
        StridedView::new_unchecked(self, &[self.len()], &[1], 0, Order::RowMajor)
    }
}

impl<T: Copy> AsStridedView for Vec<T> {
    type Elem = T;
    type Storage = [T];

    fn as_strided_view(&self) -> StridedView<'_, T> {
        self.as_slice().as_strided_view()
    }
}

impl<T: Copy> AsStridedView for StridedArray<T> {
    type Elem = T;
    type Storage = [T];

    fn as_strided_view(&self) -> StridedView<'_, T> {
        self.view()
    }
}

impl<T, S> AsStridedView for StridedView<'_, T, S>
where
    T: Copy,
    S: ElementAccess<Elem = T> + ?Sized,
{
    type Elem = T;
    type Storage = S;

    fn as_strided_view(&self) -> StridedView<'_, T, S> {
        self.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
