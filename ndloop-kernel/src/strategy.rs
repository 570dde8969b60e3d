//! Adapting core sub-views to the rank-1 lane convention.
//!
//! A traversal hands each element primitive the core sub-view of every view
//! at the current loop position. The geometry of that sub-view is the same
//! on every step, only its base offset moves, so the way to present it as a
//! single [`StridedLane`] is decided once per call:
//!
//! | sub-view                         | strategy                              |
//! |----------------------------------|---------------------------------------|
//! | rank 0                           | 1-element lane, stride 0              |
//! | rank 1                           | identity                              |
//! | one non-singleton dimension      | squeeze to that dimension             |
//! | contiguous                       | remap to stride ±1 over `numel`       |
//! | anything else                    | copy through a scratch buffer         |
//!
//! The scratch buffer is allocated once in [`Reshape::plan`] and dropped with
//! the [`Reshape`], i.e. when the traversal returns.

use std::borrow::BorrowMut;
use std::convert::Infallible;
use std::ops::ControlFlow;

use ndloop_traits::{ElementAccessMut, ScratchAlloc};
use ndloop_view::{NdLoopError, Order, Result, StridedLane, StridedLaneMut};

use crate::geometry::{
    compress_dims, is_contiguous, is_memory_ordered, iteration_order, min_max_buffer_index, numel,
};
use crate::kernel::kernel_generic;
use crate::order::loop_order;

/// Element order a primitive requires within its lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementOrder {
    /// Any enumeration of the sub-view will do (reductions, searches).
    Any,
    /// Lane element `i` must be logical element `i` of the sub-view, in the
    /// view's [`Order`]. Needed when lanes of different views are paired
    /// element by element.
    Logical,
}

/// How one core sub-view is presented as a lane.
pub enum Reshape<S: ScratchAlloc + ?Sized> {
    /// Rank-1 sub-view, used as is.
    Identity { len: usize, stride: isize },
    /// Lane of `len` elements, `stride` apart, starting `shift` slots from
    /// the sub-view's base offset.
    Remap {
        len: usize,
        stride: isize,
        shift: isize,
    },
    /// Copy through an owned workspace. `dims`/`strides` are the copy
    /// geometry with position 0 innermost.
    Scratch {
        buf: S::Owned,
        dims: Vec<usize>,
        strides: Vec<isize>,
    },
}

impl<S: ScratchAlloc + ?Sized> std::fmt::Debug for Reshape<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reshape::Identity { len, stride } => f
                .debug_struct("Identity")
                .field("len", len)
                .field("stride", stride)
                .finish(),
            Reshape::Remap { len, stride, shift } => f
                .debug_struct("Remap")
                .field("len", len)
                .field("stride", stride)
                .field("shift", shift)
                .finish(),
            Reshape::Scratch { dims, strides, .. } => f
                .debug_struct("Scratch")
                .field("dims", dims)
                .field("strides", strides)
                .finish(),
        }
    }
}

impl<S: ScratchAlloc + ?Sized> Reshape<S> {
    /// Choose the strategy for a sub-view of `dims`/`strides`.
    ///
    /// `fill` initializes a scratch buffer when one is needed.
    pub fn plan(
        dims: &[usize],
        strides: &[isize],
        order: Order,
        element_order: ElementOrder,
        fill: S::Elem,
    ) -> Result<Self> {
        match dims.len() {
            0 => {
                return Ok(Reshape::Remap {
                    len: 1,
                    stride: 0,
                    shift: 0,
                })
            }
            1 => {
                return Ok(Reshape::Identity {
                    len: dims[0],
                    stride: strides[0],
                })
            }
            _ => {}
        }

        let squeezed = compress_dims(dims, &[strides]);
        match squeezed.dims.len() {
            0 => {
                return Ok(Reshape::Remap {
                    len: 1,
                    stride: 0,
                    shift: 0,
                })
            }
            1 => {
                return Ok(Reshape::Remap {
                    len: squeezed.dims[0],
                    stride: squeezed.strides[0][0],
                    shift: 0,
                })
            }
            _ => {}
        }

        let reinterpretable = is_contiguous(dims, strides, 0, 1)
            && (element_order == ElementOrder::Any || is_memory_ordered(dims, strides, order));
        if reinterpretable {
            let (min, max) = min_max_buffer_index(dims, strides, 0);
            let (stride, shift) = if iteration_order(strides) > 0 {
                (1, min)
            } else {
                (-1, max)
            };
            let reshape = Reshape::Remap {
                len: numel(dims),
                stride,
                shift,
            };
            log::debug!("ndloop: sub-view {:?}/{:?} -> {:?}", dims, strides, reshape);
            return Ok(reshape);
        }

        // Copy geometry, position 0 innermost.
        let (copy_dims, copy_strides) = match element_order {
            ElementOrder::Any => {
                let lo = loop_order(dims, &[strides]);
                let strides = lo.strides.into_iter().next().unwrap_or_default();
                (lo.dims, strides)
            }
            ElementOrder::Logical => match order {
                Order::RowMajor => (
                    dims.iter().rev().copied().collect(),
                    strides.iter().rev().copied().collect(),
                ),
                Order::ColumnMajor => (dims.to_vec(), strides.to_vec()),
            },
        };
        let len = numel(dims);
        log::trace!("ndloop: allocating scratch of {} elements", len);
        let buf = S::try_alloc(len, fill).map_err(|_| NdLoopError::AllocationFailure { len })?;
        log::debug!(
            "ndloop: sub-view {:?}/{:?} -> scratch ({:?})",
            dims,
            strides,
            element_order
        );
        Ok(Reshape::Scratch {
            buf,
            dims: copy_dims,
            strides: copy_strides,
        })
    }

    /// Number of elements in the lane.
    pub fn len(&self) -> usize {
        match self {
            Reshape::Identity { len, .. } | Reshape::Remap { len, .. } => *len,
            Reshape::Scratch { dims, .. } => numel(dims),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, Reshape::Scratch { .. })
    }

    /// Lane over the sub-view at `base`, copying into scratch if needed.
    pub fn lane<'s>(&'s mut self, data: &'s S, base: isize) -> StridedLane<'s, S::Elem, S> {
        match self {
            Reshape::Identity { len, stride } => StridedLane::new(data, *len, *stride, base),
            Reshape::Remap { len, stride, shift } => {
                StridedLane::new(data, *len, *stride, base + *shift)
            }
            Reshape::Scratch { buf, dims, strides } => {
                let buf: &'s mut S = <S::Owned as BorrowMut<S>>::borrow_mut(buf);
                gather(data, dims, strides, base, buf);
                let len = buf.len();
                StridedLane::new(&*buf, len, 1, 0)
            }
        }
    }

    /// Run `f` on a mutable lane over the sub-view at `base`.
    ///
    /// For the scratch strategy the live sub-view is copied in before `f`
    /// runs and copied back afterwards.
    pub fn with_lane_mut<R>(
        &mut self,
        data: &mut S,
        base: isize,
        f: impl FnOnce(StridedLaneMut<'_, S::Elem, S>) -> R,
    ) -> R {
        match self {
            Reshape::Identity { len, stride } => f(StridedLaneMut::new(data, *len, *stride, base)),
            Reshape::Remap { len, stride, shift } => {
                f(StridedLaneMut::new(data, *len, *stride, base + *shift))
            }
            Reshape::Scratch { buf, dims, strides } => {
                let scratch: &mut S = <S::Owned as BorrowMut<S>>::borrow_mut(buf);
                gather(&*data, dims, strides, base, scratch);
                let len = scratch.len();
                let out = f(StridedLaneMut::new(&mut *scratch, len, 1, 0));
                scatter(&*scratch, dims, strides, base, data);
                out
            }
        }
    }
}

/// Copy the sub-view at `base` into `buf`, position 0 fastest.
fn gather<S>(data: &S, dims: &[usize], strides: &[isize], base: isize, buf: &mut S)
where
    S: ElementAccessMut + ?Sized,
{
    let mut i = 0usize;
    let _ = kernel_generic::<Infallible, _>(
        dims,
        &[strides.to_vec()],
        &[base],
        &mut |p: &[isize]| {
            buf.set(i, data.get(p[0] as usize));
            i += 1;
            Ok(ControlFlow::Continue(()))
        },
    );
}

/// Copy `buf` back into the sub-view at `base`.
fn scatter<S>(buf: &S, dims: &[usize], strides: &[isize], base: isize, data: &mut S)
where
    S: ElementAccessMut + ?Sized,
{
    let mut i = 0usize;
    let _ = kernel_generic::<Infallible, _>(
        dims,
        &[strides.to_vec()],
        &[base],
        &mut |p: &[isize]| {
            data.set(p[0] as usize, buf.get(i));
            i += 1;
            Ok(ControlFlow::Continue(()))
        },
    );
}
