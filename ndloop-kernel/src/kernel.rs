//! Per-rank iteration generators.
//!
//! A generator walks the loop dimensions of one traversal and, at every loop
//! position, calls the step callback with the current buffer offset of each
//! participating view. All generators share one convention:
//!
//! - `dims[p]` / `strides[v][p]`: loop geometry, position 0 innermost
//! - `offsets[v]`: base offset of view `v`
//! - the callback returns `Result<ControlFlow<()>, E>`; `Break` stops the
//!   traversal right after the current step (also in the middle of a tile)
//!   and is returned to the caller, errors propagate unchanged
//!
//! [`kernel_odometer`] and [`kernel_blocked`] are monomorphized over the
//! loop rank so their index state lives in fixed-size arrays;
//! [`kernel_generic`] handles any rank with heap-allocated state.

use std::ops::ControlFlow;

use smallvec::SmallVec;

/// Per-view offsets; four views cover input, output and two ancillaries.
pub(crate) type Offsets = SmallVec<[isize; 4]>;

/// Fixed-rank odometer.
///
/// For every view the generator precomputes the innermost increment
/// `stride[0]` and, per outer level `d`, the carry increment
/// `stride[d] - dims[d-1] * stride[d-1]`, so each step is one addition per
/// view. A stride of 0 (broadcast, or a rank-0 view) reuses the same loop.
pub fn kernel_odometer<const R: usize, E, F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &[isize],
    f: &mut F,
) -> Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> Result<ControlFlow<()>, E> + ?Sized,
{
    debug_assert_eq!(dims.len(), R);
    debug_assert_eq!(strides.len(), offsets.len());
    if dims.iter().any(|&d| d == 0) {
        return Ok(ControlFlow::Continue(()));
    }

    let mut extent = [0usize; R];
    extent.copy_from_slice(dims);

    let mut incs: SmallVec<[[isize; R]; 4]> = SmallVec::with_capacity(strides.len());
    for s in strides {
        let mut inc = [0isize; R];
        inc[0] = s[0];
        for d in 1..R {
            inc[d] = s[d] - extent[d - 1] as isize * s[d - 1];
        }
        incs.push(inc);
    }

    let mut ptr = Offsets::from_slice(offsets);
    let mut idx = [0usize; R];
    loop {
        if f(&ptr[..])?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        // Carry-style increment.
        let mut level = 0usize;
        loop {
            for (p, inc) in ptr.iter_mut().zip(incs.iter()) {
                *p += inc[level];
            }
            idx[level] += 1;
            if idx[level] < extent[level] {
                break;
            }
            idx[level] = 0;
            level += 1;
            if level == R {
                return Ok(ControlFlow::Continue(()));
            }
        }
    }
}

/// Fixed-rank tiled odometer.
///
/// Each dimension is walked in tiles of `block` positions (the last tile
/// truncated). The tile base offsets move incrementally: advancing a tile at
/// level `d` adds `block * stride[d]`, wrapping subtracts the last tile
/// start. Inside every tile the plain odometer runs.
pub fn kernel_blocked<const R: usize, E, F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &[isize],
    block: usize,
    f: &mut F,
) -> Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> Result<ControlFlow<()>, E> + ?Sized,
{
    debug_assert_eq!(dims.len(), R);
    if dims.iter().any(|&d| d == 0) {
        return Ok(ControlFlow::Continue(()));
    }
    let block = block.max(1);

    let mut start = [0usize; R];
    let mut tile = [0usize; R];
    let mut base = Offsets::from_slice(offsets);
    loop {
        for d in 0..R {
            tile[d] = block.min(dims[d] - start[d]);
        }
        if kernel_odometer::<R, E, F>(&tile, strides, &base, f)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let mut level = 0usize;
        loop {
            let prev = start[level];
            start[level] += block;
            if start[level] < dims[level] {
                for (b, s) in base.iter_mut().zip(strides) {
                    *b += block as isize * s[level];
                }
                break;
            }
            start[level] = 0;
            for (b, s) in base.iter_mut().zip(strides) {
                *b -= prev as isize * s[level];
            }
            level += 1;
            if level == R {
                return Ok(ControlFlow::Continue(()));
            }
        }
    }
}

/// Arbitrary-rank walker.
///
/// Keeps an explicit index vector and recomputes every offset as
/// `offset + Σ index[p] * stride[p]` on each step. Slower than the odometer
/// but free of any rank limit. Rank 0 visits the base offsets once.
pub fn kernel_generic<E, F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &[isize],
    f: &mut F,
) -> Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> Result<ControlFlow<()>, E> + ?Sized,
{
    if dims.iter().any(|&d| d == 0) {
        return Ok(ControlFlow::Continue(()));
    }
    let rank = dims.len();
    let mut idx = vec![0usize; rank];
    let mut ptr = Offsets::from_slice(offsets);
    loop {
        for (v, p) in ptr.iter_mut().enumerate() {
            *p = offsets[v]
                + idx
                    .iter()
                    .zip(&strides[v])
                    .map(|(&i, &s)| i as isize * s)
                    .sum::<isize>();
        }
        if f(&ptr[..])?.is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let mut level = 0usize;
        loop {
            if level == rank {
                return Ok(ControlFlow::Continue(()));
            }
            idx[level] += 1;
            if idx[level] < dims[level] {
                break;
            }
            idx[level] = 0;
            level += 1;
        }
    }
}

macro_rules! match_rank {
    (@call $kernel:ident, $r:literal, ($($arg:expr),*)) => {
        $kernel::<$r, E, F>($($arg),*)
    };
    ($rank:expr, $fallback:expr, $kernel:ident $args:tt, [$($r:literal),*]) => {
        match $rank {
            $($r => match_rank!(@call $kernel, $r, $args),)*
            _ => $fallback,
        }
    };
}

/// Run the odometer of rank `dims.len()`, or the generic walker beyond
/// rank 10.
pub fn run_odometer<E, F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &[isize],
    f: &mut F,
) -> Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> Result<ControlFlow<()>, E> + ?Sized,
{
    match_rank!(
        dims.len(),
        kernel_generic(dims, strides, offsets, f),
        kernel_odometer(dims, strides, offsets, f),
        [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
    )
}

/// Run the blocked generator of rank `dims.len()`.
///
/// Rank 1 has nothing to tile and ranks beyond 10 have no blocked variant;
/// both fall back to [`run_odometer`].
pub fn run_blocked<E, F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &[isize],
    block: usize,
    f: &mut F,
) -> Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> Result<ControlFlow<()>, E> + ?Sized,
{
    match_rank!(
        dims.len(),
        run_odometer(dims, strides, offsets, f),
        kernel_blocked(dims, strides, offsets, block, f),
        [2, 3, 4, 5, 6, 7, 8, 9, 10]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn collect<G>(mut run: G) -> Vec<Vec<isize>>
    where
        G: FnMut(&mut dyn FnMut(&[isize]) -> Result<ControlFlow<()>, Infallible>),
    {
        let mut seen = Vec::new();
        run(&mut |ptr: &[isize]| {
            seen.push(ptr.to_vec());
            Ok(ControlFlow::Continue(()))
        });
        seen
    }

    fn expected_offsets(dims: &[usize], strides: &[isize], offset: isize) -> Vec<isize> {
        // Position 0 fastest.
        let total: usize = dims.iter().product();
        let mut out = Vec::with_capacity(total);
        let mut idx = vec![0usize; dims.len()];
        for _ in 0..total {
            out.push(
                offset
                    + idx
                        .iter()
                        .zip(strides)
                        .map(|(&i, &s)| i as isize * s)
                        .sum::<isize>(),
            );
            for d in 0..dims.len() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        out
    }

    #[test]
    fn test_odometer_visits_in_order() {
        let dims = [2usize, 3, 2];
        let strides = vec![vec![1isize, 2, 6], vec![0isize, 0, 0]];
        let seen = collect(|f| {
            assert!(kernel_odometer::<3, _, _>(&dims, &strides, &[5, 9], f).unwrap().is_continue());
        });
        let first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
        assert_eq!(first, expected_offsets(&dims, &strides[0], 5));
        // Stride-0 view stays put.
        assert!(seen.iter().all(|p| p[1] == 9));
    }

    #[test]
    fn test_odometer_negative_strides() {
        let dims = [3usize, 2];
        let strides = vec![vec![-1isize, -3]];
        let seen = collect(|f| {
            assert!(kernel_odometer::<2, _, _>(&dims, &strides, &[5], f).unwrap().is_continue());
        });
        let first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
        assert_eq!(first, vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_blocked_visits_every_offset_once() {
        let dims = [5usize, 3, 4];
        let strides = vec![vec![1isize, 5, 15], vec![12isize, 4, -1]];
        for block in 1..=6 {
            let seen = collect(|f| {
                assert!(
                    kernel_blocked::<3, _, _>(&dims, &strides, &[0, 3], block, f)
                        .unwrap()
                        .is_continue()
                );
            });
            let mut first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
            first.sort_unstable();
            assert_eq!(first, (0..60).collect::<Vec<_>>(), "block {}", block);
            // Views stay in lockstep: the second offset is a function of the first.
            for p in &seen {
                let i0 = p[0] % 5;
                let i1 = (p[0] / 5) % 3;
                let i2 = p[0] / 15;
                assert_eq!(p[1], 3 + 12 * i0 + 4 * i1 - i2);
            }
        }
    }

    #[test]
    fn test_generic_matches_odometer() {
        let dims = [2usize, 2, 3, 2];
        let strides = vec![vec![12isize, -6, 2, 1]];
        let a = collect(|f| {
            assert!(kernel_odometer::<4, _, _>(&dims, &strides, &[6], f).unwrap().is_continue());
        });
        let b = collect(|f| {
            assert!(kernel_generic(&dims, &strides, &[6], f).unwrap().is_continue());
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_generic_rank_zero_visits_once() {
        let seen = collect(|f| {
            assert!(kernel_generic(&[], &[vec![]], &[7], f).unwrap().is_continue());
        });
        assert_eq!(seen, vec![vec![7]]);
    }

    #[test]
    fn test_empty_dims_never_call() {
        let strides = vec![vec![1isize, 3]];
        let seen = collect(|f| {
            assert!(kernel_odometer::<2, _, _>(&[3, 0], &strides, &[0], f).unwrap().is_continue());
            assert!(
                kernel_blocked::<2, _, _>(&[0, 3], &strides, &[0], 2, f)
                    .unwrap()
                    .is_continue()
            );
            assert!(kernel_generic(&[3, 0], &strides, &[0], f).unwrap().is_continue());
        });
        assert!(seen.is_empty());
    }

    #[test]
    fn test_break_stops_mid_tile() {
        let dims = [4usize, 4];
        let strides = vec![vec![1isize, 4]];
        let mut calls = 0usize;
        let flow = kernel_blocked::<2, Infallible, _>(&dims, &strides, &[0], 2, &mut |_p: &[isize]| {
            calls += 1;
            Ok(if calls == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
        assert!(flow.is_break());
        // The first tile has four positions; the walk stopped inside it.
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_errors_propagate() {
        let dims = [3usize];
        let strides = vec![vec![1isize]];
        let mut calls = 0usize;
        let result = kernel_odometer::<1, &str, _>(&dims, &strides, &[0], &mut |p: &[isize]| {
            calls += 1;
            if p[0] == 1 {
                Err("boom")
            } else {
                Ok(ControlFlow::Continue(()))
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_run_dispatch_every_unrolled_rank() {
        for rank in 1..=10usize {
            let dims = vec![2usize; rank];
            let strides = vec![(0..rank).map(|d| 1isize << d).collect::<Vec<_>>()];
            let expected: Vec<isize> = (0..1isize << rank).collect();
            for block in [1usize, 3] {
                let seen = collect(|f| {
                    assert!(run_blocked(&dims, &strides, &[0], block, f)
                        .unwrap()
                        .is_continue());
                });
                let mut first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
                first.sort_unstable();
                assert_eq!(first, expected, "blocked rank {}", rank);
            }
            let seen = collect(|f| {
                assert!(run_odometer(&dims, &strides, &[0], f).unwrap().is_continue());
            });
            let first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
            assert_eq!(first, expected, "odometer rank {}", rank);
        }
    }

    #[test]
    fn test_run_dispatch_covers_high_rank() {
        let dims = vec![2usize; 12];
        let strides = vec![(0..12).map(|d| 1isize << d).collect::<Vec<_>>()];
        let seen = collect(|f| {
            assert!(run_odometer(&dims, &strides, &[0], f).unwrap().is_continue());
        });
        let mut first: Vec<isize> = seen.iter().map(|p| p[0]).collect();
        first.sort_unstable();
        assert_eq!(first, (0..4096).collect::<Vec<_>>());

        let seen = collect(|f| {
            assert!(
                run_blocked(&dims[..5], &[strides[0][..5].to_vec()], &[0], 1, f)
                    .unwrap()
                    .is_continue()
            );
        });
        assert_eq!(seen.len(), 32);
    }
}
