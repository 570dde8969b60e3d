//! Pure geometry of strided views.
//!
//! All functions take raw `(dims, strides, offset)` so they can be applied to
//! whole views, to loop dimensions, or to core sub-views alike.

use ndloop_view::Order;

/// Number of elements: product of extents, 1 for rank 0, 0 if any extent is 0.
#[inline]
pub fn numel(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Sign of the traversal direction in memory.
///
/// `1` if all strides are non-negative, `-1` if all are non-positive (and at
/// least one negative), `0` for mixed signs. Empty and all-zero stride lists
/// are `1`.
pub fn iteration_order(strides: &[isize]) -> i8 {
    let positive = strides.iter().any(|&s| s > 0);
    let negative = strides.iter().any(|&s| s < 0);
    match (positive, negative) {
        (true, true) => 0,
        (false, true) => -1,
        _ => 1,
    }
}

/// Smallest and largest buffer index reachable by the view.
///
/// For an empty view both are `offset`.
pub fn min_max_buffer_index(dims: &[usize], strides: &[isize], offset: isize) -> (isize, isize) {
    if dims.iter().any(|&d| d == 0) {
        return (offset, offset);
    }
    let mut min = offset;
    let mut max = offset;
    for (&d, &s) in dims.iter().zip(strides) {
        let end = (d as isize - 1) * s;
        if end >= 0 {
            max += end;
        } else {
            min += end;
        }
    }
    (min, max)
}

/// Whether the view's addresses form one unbroken range of `numel` elements.
///
/// `components` is the number of buffer slots per element: 2 for a complex
/// array addressed as interleaved reals, otherwise 1. Strides and offset are
/// then in units of slots. Empty views are not contiguous.
pub fn is_contiguous(dims: &[usize], strides: &[isize], offset: isize, components: usize) -> bool {
    let n = numel(dims);
    if n == 0 || iteration_order(strides) == 0 {
        return false;
    }
    let (min, max) = min_max_buffer_index(dims, strides, offset);
    let span = (max - min) as usize + components;
    if span != n * components {
        return false;
    }
    // The span test alone accepts aliasing layouts such as dims [2, 2, 3]
    // with strides [3, 2, 3]; require a dense nesting as well.
    let mut live: Vec<(usize, usize)> = dims
        .iter()
        .zip(strides)
        .filter(|&(&d, _)| d > 1)
        .map(|(&d, &s)| (s.unsigned_abs(), d))
        .collect();
    live.sort_unstable();
    let mut expected = components;
    for (stride, extent) in live {
        if stride != expected {
            return false;
        }
        expected *= extent;
    }
    true
}

/// Whether memory order coincides with the logical `order` of the view.
///
/// True when the strides are exactly the dense strides of `order` (all
/// scaled by the same sign), ignoring extent-1 dimensions. Enumerating such
/// a view in logical order walks memory with a constant step of `+1` or `-1`.
pub fn is_memory_ordered(dims: &[usize], strides: &[isize], order: Order) -> bool {
    let live: Vec<isize> = dims
        .iter()
        .zip(strides)
        .filter(|&(&d, _)| d > 1)
        .map(|(_, &s)| s)
        .collect();
    let sign = match iteration_order(&live) {
        0 => return false,
        s => s as isize,
    };
    let mut expected = 1isize;
    let mut check = |d: usize, s: isize| -> bool {
        if d <= 1 {
            return true;
        }
        let ok = s == sign * expected;
        expected *= d as isize;
        ok
    };
    match order {
        Order::RowMajor => dims
            .iter()
            .zip(strides)
            .rev()
            .all(|(&d, &s)| check(d, s)),
        Order::ColumnMajor => dims.iter().zip(strides).all(|(&d, &s)| check(d, s)),
    }
}

/// Dimensions that survive singleton removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub dims: Vec<usize>,
    pub strides: Vec<Vec<isize>>,
    /// Original index of each kept dimension.
    pub kept: Vec<usize>,
}

/// Drop extent-1 dimensions across all views.
///
/// Such dimensions contribute nothing to any address, so removing them never
/// changes the visited set.
pub fn compress_dims(dims: &[usize], strides_list: &[&[isize]]) -> Compressed {
    let kept: Vec<usize> = (0..dims.len()).filter(|&i| dims[i] != 1).collect();
    Compressed {
        dims: kept.iter().map(|&i| dims[i]).collect(),
        strides: strides_list
            .iter()
            .map(|s| kept.iter().map(|&i| s[i]).collect())
            .collect(),
        kept,
    }
}
