//! Rank-1 views handed to element primitives.
//!
//! Every element primitive in the traversal engine sees its operands as
//! lanes: `len` elements starting at buffer index `offset`, `stride` apart.
//! Lanes are rebuilt on every generator step, so they are plain
//! `{data, len, stride, offset}` records with no validation on
//! construction; indexing goes through the storage's bounds-checked access.

use std::fmt;
use std::marker::PhantomData;

use ndloop_traits::{ElementAccess, ElementAccessMut};

/// Shared rank-1 strided view.
pub struct StridedLane<'a, T, S: ?Sized = [T]> {
    data: &'a S,
    len: usize,
    stride: isize,
    offset: isize,
    _elem: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> Clone for StridedLane<'_, T, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, S: ?Sized> Copy for StridedLane<'_, T, S> {}

impl<T, S: ?Sized> fmt::Debug for StridedLane<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedLane")
            .field("len", &self.len)
            .field("stride", &self.stride)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T, S> StridedLane<'a, T, S>
where
    T: Copy,
    S: ElementAccess<Elem = T> + ?Sized,
{
    #[inline]
    pub fn new(data: &'a S, len: usize, stride: isize, offset: isize) -> Self {
        Self {
            data,
            len,
            stride,
            offset,
            _elem: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.stride
    }

    /// Buffer index of the first element.
    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn data(&self) -> &'a S {
        self.data
    }

    /// Buffer index of element `i`.
    #[inline(always)]
    pub fn index_of(&self, i: usize) -> isize {
        self.offset + i as isize * self.stride
    }

    /// Element `i` of the lane.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    #[inline(always)]
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len, "lane index {} out of bounds for length {}", i, self.len);
        self.data.get(self.index_of(i) as usize)
    }

    /// The same geometry at another base offset.
    #[inline(always)]
    pub fn at_offset(self, offset: isize) -> Self {
        Self { offset, ..self }
    }

    /// The lane as a plain slice when it is unit-stride over indexed storage.
    #[inline]
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if self.stride != 1 && self.len > 1 {
            return None;
        }
        let slice = self.data.as_slice()?;
        let start = self.offset as usize;
        slice.get(start..start + self.len)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a
    where
        T: 'a,
    {
        let lane = *self;
        (0..lane.len).map(move |i| lane.get(i))
    }
}

/// Exclusive rank-1 strided view.
pub struct StridedLaneMut<'a, T, S: ?Sized = [T]> {
    data: &'a mut S,
    len: usize,
    stride: isize,
    offset: isize,
    _elem: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> fmt::Debug for StridedLaneMut<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedLaneMut")
            .field("len", &self.len)
            .field("stride", &self.stride)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T, S> StridedLaneMut<'a, T, S>
where
    T: Copy,
    S: ElementAccessMut<Elem = T> + ?Sized,
{
    #[inline]
    pub fn new(data: &'a mut S, len: usize, stride: isize, offset: isize) -> Self {
        Self {
            data,
            len,
            stride,
            offset,
            _elem: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn stride(&self) -> isize {
        self.stride
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline(always)]
    pub fn index_of(&self, i: usize) -> isize {
        self.offset + i as isize * self.stride
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len, "lane index {} out of bounds for length {}", i, self.len);
        self.data.get(self.index_of(i) as usize)
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, value: T) {
        assert!(i < self.len, "lane index {} out of bounds for length {}", i, self.len);
        let idx = self.index_of(i) as usize;
        self.data.set(idx, value);
    }

    /// Reborrow as a shared lane.
    #[inline]
    pub fn as_lane(&self) -> StridedLane<'_, T, S> {
        StridedLane::new(&*self.data, self.len, self.stride, self.offset)
    }

    /// The lane as a plain mutable slice when it is unit-stride over indexed storage.
    #[inline]
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        if self.stride != 1 && self.len > 1 {
            return None;
        }
        let start = self.offset as usize;
        let len = self.len;
        self.data.as_mut_slice()?.get_mut(start..start + len)
    }
}
