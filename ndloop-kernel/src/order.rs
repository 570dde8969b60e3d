//! Loop-interchange ordering.
//!
//! Dimensions are ordered by the stride magnitude of a designated primary
//! view so that outer loops walk large strides and inner loops walk small
//! ones. Position 0 of the result is the innermost loop, matching the
//! generators in [`crate::kernel`].

/// A dimension permutation plus the permuted geometry of every view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOrder {
    /// `permutation[p]` is the original dimension iterated at position `p`
    /// (position 0 innermost).
    pub permutation: Vec<usize>,
    pub dims: Vec<usize>,
    /// Permuted strides, one list per view, in the order they were passed.
    pub strides: Vec<Vec<isize>>,
}

/// Order dimensions for cache locality of `strides_list[0]`.
///
/// Dimensions are stable-sorted by descending `|stride|` of the primary
/// view (ties keep their original order) and the result is reversed, so the
/// outermost loop has the largest stride and the innermost the smallest.
/// The remaining stride lists are permuted alongside.
pub fn loop_order(dims: &[usize], strides_list: &[&[isize]]) -> LoopOrder {
    let rank = dims.len();
    let mut permutation: Vec<usize> = (0..rank).collect();
    if let Some(primary) = strides_list.first() {
        permutation.sort_by(|&a, &b| primary[b].unsigned_abs().cmp(&primary[a].unsigned_abs()));
        permutation.reverse();
    }
    LoopOrder {
        dims: permutation.iter().map(|&d| dims[d]).collect(),
        strides: strides_list
            .iter()
            .map(|strides| permutation.iter().map(|&d| strides[d]).collect())
            .collect(),
        permutation,
    }
}
