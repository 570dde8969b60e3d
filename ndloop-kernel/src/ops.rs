//! High-level operations built on the dispatcher and the lane primitives.

use std::convert::Infallible;
use std::ops::{Add, ControlFlow};

use num_traits::Zero;

use ndloop_traits::{Element, ElementAccess, ElementAccessMut, ScratchAlloc};
use ndloop_view::{AsStridedView, NdLoopError, Result, StridedView, StridedViewMut};

use crate::config::KernelConfig;
use crate::dispatch::{execute, map_subarrays_into, plan_loops, reduce_subarrays_into, traverse};
use crate::primitives;

fn no_ancillary<'a, T>() -> &'a [StridedView<'a, T>] {
    &[]
}

/// Write `value` to every element of `output`.
///
/// Reductions over an input without elements never reach their primitive,
/// so each output slot gets the reduction's identity here instead.
fn fill_identity<O, SO>(output: &mut StridedViewMut<'_, O, SO>, value: O)
where
    O: Element,
    SO: ElementAccessMut<Elem = O> + ?Sized,
{
    let plan = plan_loops(
        output.dims(),
        &[output.strides()],
        &[output.offset()],
        &[O::DTYPE],
        None,
        KernelConfig::global(),
    );
    let data = output.data_mut();
    let _ = execute::<Infallible, _>(&plan, &mut |p: &[isize]| {
        data.set(p[0] as usize, value);
        Ok(ControlFlow::Continue(()))
    });
}

/// Whether `value` occurs anywhere in `input`.
///
/// `input` is a view, an owned array, or a plain slice or vector (taken as a
/// dense rank-1 view). Stops at the first lane containing a match.
pub fn includes<V>(input: &V, value: V::Elem) -> Result<bool>
where
    V: AsStridedView + ?Sized,
    V::Elem: Element + PartialEq,
{
    let view = input.as_strided_view();
    let flow = traverse::<_, _, NdLoopError, _>(&view, |lane| {
        Ok(if primitives::includes(lane, value) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    })?;
    Ok(flow.is_break())
}

/// For each core sub-array of `input`, whether it contains the matching
/// element of `search`.
///
/// `search` and `output` have the loop shape of `input`; a rank-0 `search`
/// is compared against every sub-array.
pub fn includes_along<T, S, SS, SO>(
    input: &StridedView<'_, T, S>,
    search: &StridedView<'_, T, SS>,
    output: &mut StridedViewMut<'_, bool, SO>,
    core_dims: &[isize],
) -> Result<()>
where
    T: Element + Default + PartialEq,
    S: ScratchAlloc<Elem = T> + ?Sized,
    SS: ElementAccess<Elem = T> + ?Sized,
    SO: ElementAccessMut<Elem = bool> + ?Sized,
{
    reduce_subarrays_into(
        input,
        output,
        std::slice::from_ref(search),
        core_dims,
        |lane, search| Ok(primitives::includes(lane, search[0].get(0))),
    )?;
    if input.is_empty() {
        fill_identity(output, false);
    }
    Ok(())
}

/// Sum over `core_dims`, one result per remaining index.
pub fn sum_along<T, S, SO>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, T, SO>,
    core_dims: &[isize],
) -> Result<()>
where
    T: Element + Default + Zero + Add<Output = T>,
    S: ScratchAlloc<Elem = T> + ?Sized,
    SO: ElementAccessMut<Elem = T> + ?Sized,
{
    reduce_subarrays_into(input, output, no_ancillary::<T>(), core_dims, |lane, _| {
        Ok(primitives::sum(lane))
    })?;
    if input.is_empty() {
        fill_identity(output, T::zero());
    }
    Ok(())
}

/// Number of elements satisfying `pred` over `core_dims`.
pub fn count_along<T, S, SO>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, usize, SO>,
    core_dims: &[isize],
    mut pred: impl FnMut(T) -> bool,
) -> Result<()>
where
    T: Element + Default,
    S: ScratchAlloc<Elem = T> + ?Sized,
    SO: ElementAccessMut<Elem = usize> + ?Sized,
{
    reduce_subarrays_into(input, output, no_ancillary::<T>(), core_dims, |lane, _| {
        Ok(primitives::count_if(lane, &mut pred))
    })?;
    if input.is_empty() {
        fill_identity(output, 0);
    }
    Ok(())
}

/// Sum of all elements; zero for an empty view.
///
/// Accepts the same inputs as [`includes`].
pub fn sum<V>(input: &V) -> Result<V::Elem>
where
    V: AsStridedView + ?Sized,
    V::Elem: Element + Default + Zero + Add<Output = V::Elem>,
    V::Storage: ScratchAlloc<Elem = V::Elem>,
{
    let view = input.as_strided_view();
    let mut acc = [<V::Elem as Zero>::zero()];
    let core: Vec<isize> = (0..view.ndim() as isize).collect();
    {
        let mut out = StridedViewMut::<V::Elem>::new(&mut acc, &[], &[], 0, view.order())?;
        sum_along(&view, &mut out, &core)?;
    }
    Ok(acc[0])
}

/// Elementwise `output[i] = f(input[i])`.
pub fn map_into<T, S, U, SU>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, U, SU>,
    mut f: impl FnMut(T) -> U,
) -> Result<()>
where
    T: Element + Default,
    S: ScratchAlloc<Elem = T> + ?Sized,
    U: Element + Default,
    SU: ScratchAlloc<Elem = U> + ?Sized,
{
    map_subarrays_into(input, output, no_ancillary::<T>(), &[], |lane, out, _| {
        primitives::map_into(lane, out, &mut f);
        Ok(())
    })
}

/// Running sum along `dim`.
pub fn cumsum_along<T, S, SO>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, T, SO>,
    dim: isize,
) -> Result<()>
where
    T: Element + Default + Zero + Add<Output = T>,
    S: ScratchAlloc<Elem = T> + ?Sized,
    SO: ScratchAlloc<Elem = T> + ?Sized,
{
    map_subarrays_into(input, output, no_ancillary::<T>(), &[dim], |lane, out, _| {
        primitives::cumsum_into(lane, out);
        Ok(())
    })
}

/// Set every element of `output` to `value`.
pub fn fill<T, S>(output: &mut StridedViewMut<'_, T, S>, value: T) -> Result<()>
where
    T: Element + Default,
    S: ScratchAlloc<Elem = T> + ?Sized,
{
    let scalar = [value];
    let zeros = vec![0isize; output.ndim()];
    let source = StridedView::<T>::new(&scalar, output.dims(), &zeros, 0, output.order())?;
    map_subarrays_into(&source, output, no_ancillary::<T>(), &[], |_, out, _| {
        primitives::fill(out, value);
        Ok(())
    })
}

/// Call `f` with the storage index of every element of `view`.
///
/// Each index is visited exactly once, in loop order rather than logical
/// order.
pub fn for_each_index<T, S>(view: &StridedView<'_, T, S>, mut f: impl FnMut(usize))
where
    T: Element,
    S: ElementAccess<Elem = T> + ?Sized,
{
    let plan = plan_loops(
        view.dims(),
        &[view.strides()],
        &[view.offset()],
        &[T::DTYPE],
        None,
        KernelConfig::global(),
    );
    let _ = execute::<Infallible, _>(&plan, &mut |p: &[isize]| {
        f(p[0] as usize);
        Ok(ControlFlow::Continue(()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndloop_traits::PackedBits;
    use ndloop_view::{Order, StridedArray};
    use num_complex::Complex64;

    fn one_to_twelve() -> Vec<f64> {
        (1..=12).map(|x| x as f64).collect()
    }

    #[test]
    fn test_includes_offset_view() {
        let data = one_to_twelve();
        let view =
            StridedView::<f64>::new(&data, &[3, 1, 2], &[4, 4, 1], 2, Order::RowMajor).unwrap();
        assert!(includes(&view, 3.0).unwrap());
        assert!(includes(&view, 12.0).unwrap());
        assert!(!includes(&view, 1.0).unwrap());
        assert!(!includes(&view, -99.0).unwrap());
    }

    #[test]
    fn test_includes_empty_and_scalar() {
        let data = [5i32];
        let empty = StridedView::<i32>::new(&data, &[3, 0], &[1, 1], 0, Order::RowMajor).unwrap();
        assert!(!includes(&empty, 5).unwrap());
        let scalar = StridedView::<i32>::new(&data, &[], &[], 0, Order::RowMajor).unwrap();
        assert!(includes(&scalar, 5).unwrap());
    }

    #[test]
    fn test_whole_view_ops_accept_plain_buffers() {
        let data = vec![1i64, 2, 3, 4, 5, 6];
        assert!(includes(&data, 4).unwrap());
        assert!(!includes(&data[..3], 4).unwrap());
        assert_eq!(sum(&data).unwrap(), 21);
        assert_eq!(sum(&data[2..]).unwrap(), 18);
        let empty: [i64; 0] = [];
        assert_eq!(sum(&empty[..]).unwrap(), 0);

        let arr = StridedArray::<f64>::from_fn_col_major(&[2, 3], |idx| (idx[0] + idx[1]) as f64);
        assert_relative_eq!(sum(&arr).unwrap(), 9.0);
        assert!(includes(&arr, 3.0).unwrap());
        assert!(!includes(&arr, 4.0).unwrap());

        let bits = PackedBits::from_bools(&[false, false, true]);
        let view = StridedView::<bool, PackedBits>::row_major(&bits, &[3]).unwrap();
        assert!(includes(&view, true).unwrap());
    }

    #[test]
    fn test_includes_along_packed_output() {
        // 2x3 row-major, search each row for its own value.
        let data = [1i32, 2, 3, 4, 5, 6];
        let view = StridedView::<i32>::row_major(&data, &[2, 3]).unwrap();
        let needles = [2i32, 7];
        let search = StridedView::<i32>::row_major(&needles, &[2]).unwrap();
        let mut bits = PackedBits::new(2);
        {
            let mut out = StridedViewMut::<bool, PackedBits>::row_major(&mut bits, &[2]).unwrap();
            includes_along(&view, &search, &mut out, &[1]).unwrap();
        }
        assert_eq!(bits.to_vec(), vec![true, false]);
    }

    #[test]
    fn test_includes_along_scalar_search() {
        let data = [1i32, 2, 3, 4, 5, 6];
        let view = StridedView::<i32>::row_major(&data, &[2, 3]).unwrap();
        let needle = [4i32];
        let search = StridedView::<i32>::new(&needle, &[], &[], 0, Order::RowMajor).unwrap();
        let mut out = [false; 3];
        let mut out_view = StridedViewMut::<bool>::row_major(&mut out, &[3]).unwrap();
        includes_along(&view, &search, &mut out_view, &[0]).unwrap();
        assert_eq!(out, [true, false, false]);
    }

    #[test]
    fn test_sum_along_matches_manual() {
        let arr = StridedArray::<f64>::from_fn_col_major(&[3, 4, 2], |idx| {
            (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64
        });
        let view = arr.view();
        let mut out = StridedArray::<f64>::row_major(&[3, 2]);
        {
            let mut out_view = out.view_mut();
            sum_along(&view, &mut out_view, &[1]).unwrap();
        }
        for i in 0..3 {
            for k in 0..2 {
                let expected: f64 = (0..4).map(|j| arr.get(&[i, j, k])).sum();
                assert_relative_eq!(out.get(&[i, k]), expected);
            }
        }
    }

    #[test]
    fn test_sum_along_scratch_core() {
        // Core dims [2, 0] of a column-major array are not contiguous.
        let arr = StridedArray::<i64>::from_fn_col_major(&[2, 3, 2], |idx| {
            (idx[0] + 2 * idx[1] + 6 * idx[2]) as i64
        });
        let mut out = [0i64; 3];
        let mut out_view = StridedViewMut::<i64>::row_major(&mut out, &[3]).unwrap();
        sum_along(&arr.view(), &mut out_view, &[2, 0]).unwrap();
        // Column j: (2j) + (2j+1) + (2j+6) + (2j+7)
        assert_eq!(out, [14, 22, 30]);
    }

    #[test]
    fn test_count_along() {
        let data: Vec<i32> = (0..12).collect();
        let view = StridedView::<i32>::row_major(&data, &[3, 4]).unwrap();
        let mut out = [0usize; 4];
        let mut out_view = StridedViewMut::<usize>::row_major(&mut out, &[4]).unwrap();
        count_along(&view, &mut out_view, &[0], |x| x % 2 == 0).unwrap();
        assert_eq!(out, [3, 0, 3, 0]);
    }

    #[test]
    fn test_sum_whole_views() {
        let data = one_to_twelve();
        let view = StridedView::<f64>::row_major(&data, &[3, 4]).unwrap();
        assert_relative_eq!(sum(&view).unwrap(), 78.0);
        let flipped = view.flip(1).unwrap();
        assert_relative_eq!(sum(&flipped).unwrap(), 78.0);
        let sub =
            StridedView::<f64>::new(&data, &[3, 1, 2], &[4, 4, 1], 2, Order::RowMajor).unwrap();
        assert_relative_eq!(sum(&sub).unwrap(), 45.0);
        let empty = StridedView::<f64>::new(&data, &[0], &[1], 0, Order::RowMajor).unwrap();
        assert_eq!(sum(&empty).unwrap(), 0.0);
    }

    #[test]
    fn test_reductions_over_empty_core_write_identity() {
        let data = [1.0f64];
        let empty = StridedView::<f64>::new(&data, &[2, 0], &[1, 1], 0, Order::RowMajor).unwrap();

        let mut sums = [5.0f64; 2];
        {
            let mut out = StridedViewMut::<f64>::row_major(&mut sums, &[2]).unwrap();
            sum_along(&empty, &mut out, &[1]).unwrap();
        }
        assert_eq!(sums, [0.0, 0.0]);

        let mut counts = [9usize; 2];
        {
            let mut out = StridedViewMut::<usize>::row_major(&mut counts, &[2]).unwrap();
            count_along(&empty, &mut out, &[1], |_| true).unwrap();
        }
        assert_eq!(counts, [0, 0]);

        let needle = [1.0f64];
        let search = StridedView::<f64>::new(&needle, &[], &[], 0, Order::RowMajor).unwrap();
        let mut found = [true; 2];
        {
            let mut out = StridedViewMut::<bool>::row_major(&mut found, &[2]).unwrap();
            includes_along(&empty, &search, &mut out, &[1]).unwrap();
        }
        assert_eq!(found, [false, false]);

        let mut bits = PackedBits::from_bools(&[true, true]);
        {
            let mut out = StridedViewMut::<bool, PackedBits>::row_major(&mut bits, &[2]).unwrap();
            includes_along(&empty, &search, &mut out, &[1]).unwrap();
        }
        assert_eq!(bits.to_vec(), vec![false, false]);
    }

    #[test]
    fn test_empty_reduction_still_validates_output() {
        let data = [1.0f64];
        let empty = StridedView::<f64>::new(&data, &[2, 0], &[1, 1], 0, Order::RowMajor).unwrap();
        let mut sums = [5.0f64; 3];
        let mut out = StridedViewMut::<f64>::row_major(&mut sums, &[3]).unwrap();
        let err = sum_along(&empty, &mut out, &[1]);
        assert!(matches!(err, Err(NdLoopError::ShapeMismatch(_, _))));
        assert_eq!(sums, [5.0; 3]);
    }

    #[test]
    fn test_sum_complex() {
        let data: Vec<Complex64> = (0..4).map(|i| Complex64::new(i as f64, 1.0)).collect();
        let view = StridedView::<Complex64>::row_major(&data, &[2, 2]).unwrap();
        let total = sum(&view).unwrap();
        assert_relative_eq!(total.re, 6.0);
        assert_relative_eq!(total.im, 4.0);
    }

    #[test]
    fn test_map_into_transposed_output() {
        let data: Vec<i32> = (0..6).collect();
        let view = StridedView::<i32>::row_major(&data, &[2, 3]).unwrap();
        let mut out = StridedArray::<f64>::col_major(&[2, 3]);
        {
            let mut out_view = out.view_mut();
            map_into(&view, &mut out_view, |x| x as f64 * 0.5).unwrap();
        }
        for i in 0..2 {
            for j in 0..3 {
                assert_relative_eq!(out.get(&[i, j]), (3 * i + j) as f64 * 0.5);
            }
        }
    }

    #[test]
    fn test_map_into_shape_mismatch() {
        let data = [0i32; 6];
        let view = StridedView::<i32>::row_major(&data, &[2, 3]).unwrap();
        let mut out = [0i32; 6];
        let mut out_view = StridedViewMut::<i32>::row_major(&mut out, &[6]).unwrap();
        let err = map_into(&view, &mut out_view, |x| x);
        assert!(matches!(err, Err(NdLoopError::ShapeMismatch(_, _))));
        assert_eq!(out, [0; 6]);
    }

    #[test]
    fn test_cumsum_along_both_axes() {
        let data: Vec<i32> = (1..=6).collect();
        let view = StridedView::<i32>::row_major(&data, &[2, 3]).unwrap();

        let mut rows = [0i32; 6];
        let mut rows_view = StridedViewMut::<i32>::row_major(&mut rows, &[2, 3]).unwrap();
        cumsum_along(&view, &mut rows_view, -1).unwrap();
        assert_eq!(rows, [1, 3, 6, 4, 9, 15]);

        let mut cols = [0i32; 6];
        let mut cols_view = StridedViewMut::<i32>::col_major(&mut cols, &[2, 3]).unwrap();
        cumsum_along(&view, &mut cols_view, 0).unwrap();
        // Column-major storage of [[1, 2, 3], [5, 7, 9]].
        assert_eq!(cols, [1, 5, 2, 7, 3, 9]);
    }

    #[test]
    fn test_cumsum_along_bad_dim() {
        let data = [0i32; 4];
        let view = StridedView::<i32>::row_major(&data, &[2, 2]).unwrap();
        let mut out = [0i32; 4];
        let mut out_view = StridedViewMut::<i32>::row_major(&mut out, &[2, 2]).unwrap();
        let err = cumsum_along(&view, &mut out_view, 2);
        assert!(matches!(
            err,
            Err(NdLoopError::DimensionIndex { index: 2, rank: 2 })
        ));
    }

    #[test]
    fn test_fill_strided() {
        let mut data = vec![0u16; 12];
        {
            let mut view =
                StridedViewMut::<u16>::new(&mut data, &[2, 3], &[-6, 2], 6, Order::RowMajor)
                    .unwrap();
            fill(&mut view, 9).unwrap();
        }
        assert_eq!(data, vec![9, 0, 9, 0, 9, 0, 9, 0, 9, 0, 9, 0]);
    }

    #[test]
    fn test_fill_packed_bits() {
        let mut bits = PackedBits::new(6);
        {
            let mut view = StridedViewMut::<bool, PackedBits>::new(
                &mut bits,
                &[3],
                &[2],
                1,
                Order::RowMajor,
            )
            .unwrap();
            fill(&mut view, true).unwrap();
        }
        assert_eq!(bits.to_vec(), vec![false, true, false, true, false, true]);
    }

    #[test]
    fn test_for_each_index_mixed_signs() {
        let data = vec![0u8; 16];
        let view = StridedView::<u8>::new(
            &data,
            &[2, 1, 2, 1, 2],
            &[8, -8, -4, 4, 2],
            4,
            Order::RowMajor,
        )
        .unwrap();
        let mut seen = Vec::new();
        for_each_index(&view, |i| seen.push(i));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }
}
