//! Element primitives over rank-1 lanes.
//!
//! Each primitive takes a lane from the dispatcher and uses the plain-slice
//! path when the lane is unit-stride over slice storage. Both paths visit
//! elements in lane order, so floating-point results do not depend on which
//! one runs.

use std::ops::Add;

use num_traits::Zero;

use ndloop_traits::{ElementAccess, ElementAccessMut};
use ndloop_view::{StridedLane, StridedLaneMut};

/// Whether `value` occurs in the lane.
pub fn includes<T, S>(lane: StridedLane<'_, T, S>, value: T) -> bool
where
    T: Copy + PartialEq,
    S: ElementAccess<Elem = T> + ?Sized,
{
    if let Some(slice) = lane.as_slice() {
        return slice.contains(&value);
    }
    lane.iter().any(|x| x == value)
}

/// Number of lane elements satisfying `pred`.
pub fn count_if<T, S>(lane: StridedLane<'_, T, S>, mut pred: impl FnMut(T) -> bool) -> usize
where
    T: Copy,
    S: ElementAccess<Elem = T> + ?Sized,
{
    if let Some(slice) = lane.as_slice() {
        return slice.iter().filter(|&&x| pred(x)).count();
    }
    lane.iter().filter(|&x| pred(x)).count()
}

/// Sum of the lane, accumulated left to right from zero.
pub fn sum<T, S>(lane: StridedLane<'_, T, S>) -> T
where
    T: Copy + Zero + Add<Output = T>,
    S: ElementAccess<Elem = T> + ?Sized,
{
    if let Some(slice) = lane.as_slice() {
        return slice.iter().fold(T::zero(), |acc, &x| acc + x);
    }
    lane.iter().fold(T::zero(), |acc, x| acc + x)
}

/// Running sum of `input` written to `output`.
///
/// # Panics
/// Panics if the lanes differ in length.
pub fn cumsum_into<T, S, SO>(input: StridedLane<'_, T, S>, mut output: StridedLaneMut<'_, T, SO>)
where
    T: Copy + Zero + Add<Output = T>,
    S: ElementAccess<Elem = T> + ?Sized,
    SO: ElementAccessMut<Elem = T> + ?Sized,
{
    assert_eq!(input.len(), output.len(), "lane length mismatch");
    let mut acc = T::zero();
    for i in 0..input.len() {
        acc = acc + input.get(i);
        output.set(i, acc);
    }
}

/// Set every lane element to `value`.
pub fn fill<T, S>(mut output: StridedLaneMut<'_, T, S>, value: T)
where
    T: Copy,
    S: ElementAccessMut<Elem = T> + ?Sized,
{
    if let Some(slice) = output.as_mut_slice() {
        slice.fill(value);
        return;
    }
    for i in 0..output.len() {
        output.set(i, value);
    }
}

/// Apply `f` elementwise from `input` to `output`.
///
/// # Panics
/// Panics if the lanes differ in length.
pub fn map_into<T, U, S, SO>(
    input: StridedLane<'_, T, S>,
    mut output: StridedLaneMut<'_, U, SO>,
    mut f: impl FnMut(T) -> U,
) where
    T: Copy,
    U: Copy,
    S: ElementAccess<Elem = T> + ?Sized,
    SO: ElementAccessMut<Elem = U> + ?Sized,
{
    assert_eq!(input.len(), output.len(), "lane length mismatch");
    for i in 0..input.len() {
        output.set(i, f(input.get(i)));
    }
}
