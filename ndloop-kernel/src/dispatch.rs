//! Dimension-reduction dispatcher.
//!
//! The entry points here take the participating views (primary input,
//! primary output, ancillary views), split the input's dimensions into loop
//! dimensions and core dimensions, and pick a generator from the observed
//! geometry:
//!
//! 1. any zero extent: nothing to do
//! 2. no loop dimensions: one call
//! 3. one loop dimension, or one left after dropping extent-1 dimensions:
//!    rank-1 odometer
//! 4. input and output walk memory in the same uniform direction:
//!    odometer over the loop-interchanged dimensions
//! 5. otherwise: blocked odometer
//! 6. more loop dimensions than the unrolled generators cover: index walker
//!
//! Steps 4 to 6 look at the loop dimensions left after extent-1 dimensions
//! are dropped, so an extent-1 dimension never affects the route.
//!
//! All structural validation happens before the first element is touched.

use std::ops::ControlFlow;

use smallvec::SmallVec;

use ndloop_traits::{DType, Element, ElementAccess, ElementAccessMut, ScratchAlloc};
use ndloop_view::{NdLoopError, Result, StridedLane, StridedLaneMut, StridedView, StridedViewMut};

use crate::block::block_size;
use crate::config::KernelConfig;
use crate::geometry::{compress_dims, is_contiguous, iteration_order, min_max_buffer_index, numel};
use crate::kernel::{kernel_generic, run_blocked, run_odometer, Offsets};
use crate::order::loop_order;
use crate::strategy::{ElementOrder, Reshape};

/// Generator selected for a traversal.
///
/// Ranks carried by the variants are counted after extent-1 loop dimensions
/// are dropped, and the direction checks that separate `CacheOrdered` from
/// `Blocked` see only the remaining strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Some extent is zero; the primitive is never invoked.
    Empty,
    /// No loop dimensions, or only extent-1 ones; the primitive is invoked once.
    Rank0,
    /// Single loop dimension, or one left after dropping extent-1 dimensions.
    Rank1,
    /// Odometer over loop-interchanged dimensions of the given compressed rank.
    CacheOrdered(usize),
    /// Tiled odometer of the given compressed rank.
    Blocked(usize),
    /// Index walker; the compressed rank exceeds the unrolled generators.
    Generic(usize),
}

/// Loop geometry and generator choice for one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopPlan {
    route: Route,
    dims: Vec<usize>,
    strides: Vec<Vec<isize>>,
    offsets: Offsets,
    permutation: Vec<usize>,
    block: usize,
}

impl LoopPlan {
    pub fn route(&self) -> Route {
        self.route
    }

    /// Loop extents, position 0 innermost.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Loop strides of every view, permuted like [`LoopPlan::dims`].
    pub fn strides(&self) -> &[Vec<isize>] {
        &self.strides
    }

    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Original loop dimension iterated at each position.
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Tile edge for [`Route::Blocked`], 1 otherwise.
    pub fn block(&self) -> usize {
        self.block
    }

    fn new(route: Route, dims: Vec<usize>, strides: Vec<Vec<isize>>, offsets: &[isize]) -> Self {
        Self {
            route,
            permutation: (0..dims.len()).collect(),
            dims,
            strides,
            offsets: offsets.iter().copied().collect(),
            block: 1,
        }
    }
}

/// Plan the loops over `dims` for views with `strides_list` and `offsets`.
///
/// `strides_list[0]` is the primary input and decides the loop order;
/// `output` names the entry of the primary output, if any. `dtypes` are the
/// element types of all participating views and size the tiles.
pub fn plan_loops(
    dims: &[usize],
    strides_list: &[&[isize]],
    offsets: &[isize],
    dtypes: &[DType],
    output: Option<usize>,
    config: &KernelConfig,
) -> LoopPlan {
    debug_assert_eq!(strides_list.len(), offsets.len());
    let all_strides = || -> Vec<Vec<isize>> { strides_list.iter().map(|s| s.to_vec()).collect() };

    if dims.iter().any(|&d| d == 0) {
        log::debug!("ndloop: dims {:?} -> empty", dims);
        return LoopPlan::new(Route::Empty, dims.to_vec(), all_strides(), offsets);
    }
    match dims.len() {
        0 => return LoopPlan::new(Route::Rank0, Vec::new(), all_strides(), offsets),
        1 => {
            log::debug!("ndloop: dims {:?} -> rank 1", dims);
            return LoopPlan::new(Route::Rank1, dims.to_vec(), all_strides(), offsets);
        }
        _ => {}
    }

    let compressed = compress_dims(dims, strides_list);
    match compressed.dims.len() {
        0 => {
            log::debug!("ndloop: dims {:?} -> rank 0 after singleton collapse", dims);
            return LoopPlan::new(Route::Rank0, Vec::new(), compressed.strides, offsets);
        }
        1 => {
            log::debug!("ndloop: dims {:?} -> rank 1 after singleton collapse", dims);
            let mut plan =
                LoopPlan::new(Route::Rank1, compressed.dims, compressed.strides, offsets);
            plan.permutation = compressed.kept;
            return plan;
        }
        _ => {}
    }

    let refs: SmallVec<[&[isize]; 4]> = compressed.strides.iter().map(|s| s.as_slice()).collect();
    let lo = loop_order(&compressed.dims, &refs);
    let permutation: Vec<usize> = lo.permutation.iter().map(|&p| compressed.kept[p]).collect();
    let rank = lo.dims.len();

    let route = if rank > config.max_unrolled_rank {
        Route::Generic(rank)
    } else {
        let input_order = iteration_order(&lo.strides[0]);
        let output_order = output
            .map(|o| lo.strides[o].as_slice())
            .filter(|s| s.iter().any(|&x| x != 0))
            .map(iteration_order);
        let same_direction =
            input_order != 0 && output_order.map_or(true, |o| o == input_order);
        if same_direction {
            Route::CacheOrdered(rank)
        } else {
            Route::Blocked(rank)
        }
    };
    let block = match route {
        Route::Blocked(_) => block_size(dtypes, config),
        _ => 1,
    };
    log::debug!(
        "ndloop: dims {:?} -> {:?} over {:?} (permutation {:?}, block {})",
        dims,
        route,
        lo.dims,
        permutation,
        block
    );

    LoopPlan {
        route,
        dims: lo.dims,
        strides: lo.strides,
        offsets: offsets.iter().copied().collect(),
        permutation,
        block,
    }
}

/// Run `f` once per loop position of `plan` with the offsets of all views.
pub fn execute<E, F>(plan: &LoopPlan, f: &mut F) -> std::result::Result<ControlFlow<()>, E>
where
    F: FnMut(&[isize]) -> std::result::Result<ControlFlow<()>, E> + ?Sized,
{
    match plan.route {
        Route::Empty => Ok(ControlFlow::Continue(())),
        Route::Rank0 => f(plan.offsets.as_slice()),
        Route::Rank1 | Route::CacheOrdered(_) => {
            run_odometer(&plan.dims, &plan.strides, &plan.offsets, f)
        }
        Route::Blocked(_) => run_blocked(&plan.dims, &plan.strides, &plan.offsets, plan.block, f),
        Route::Generic(_) => kernel_generic(&plan.dims, &plan.strides, &plan.offsets, f),
    }
}

/// Normalize core dimension indices against `rank`.
///
/// Negative indices count from the end. The result keeps the caller's
/// order.
pub fn normalize_dims(core: &[isize], rank: usize) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(core.len());
    for &index in core {
        let r = rank as isize;
        if index < -r || index >= r {
            return Err(NdLoopError::DimensionIndex { index, rank });
        }
        let dim = (if index < 0 { index + r } else { index }) as usize;
        if out.contains(&dim) {
            return Err(NdLoopError::DuplicateDimension { dim });
        }
        out.push(dim);
    }
    Ok(out)
}

/// A view's geometry split into loop and core dimensions.
struct Split {
    loop_dims: Vec<usize>,
    loop_strides: Vec<isize>,
    core_dims: Vec<usize>,
    core_strides: Vec<isize>,
}

fn split_dims(dims: &[usize], strides: &[isize], core: &[usize]) -> Split {
    let (loop_dims, loop_strides): (Vec<usize>, Vec<isize>) = (0..dims.len())
        .filter(|d| !core.contains(d))
        .map(|d| (dims[d], strides[d]))
        .unzip();
    Split {
        loop_dims,
        loop_strides,
        core_dims: core.iter().map(|&d| dims[d]).collect(),
        core_strides: core.iter().map(|&d| strides[d]).collect(),
    }
}

/// Loop strides of an ancillary view; rank 0 broadcasts.
fn ancillary_strides(dims: &[usize], strides: &[isize], loop_dims: &[usize]) -> Result<Vec<isize>> {
    if dims.is_empty() {
        return Ok(vec![0; loop_dims.len()]);
    }
    if dims.len() != loop_dims.len() {
        return Err(NdLoopError::RankMismatch(dims.len(), loop_dims.len()));
    }
    if dims != loop_dims {
        return Err(NdLoopError::ShapeMismatch(dims.to_vec(), loop_dims.to_vec()));
    }
    Ok(strides.to_vec())
}

/// Geometry of every participating view, validated and ready to plan.
struct Participants {
    dims: Vec<usize>,
    strides: Vec<Vec<isize>>,
    offsets: Offsets,
    dtypes: SmallVec<[DType; 4]>,
}

impl Participants {
    fn plan(&self) -> LoopPlan {
        let refs: SmallVec<[&[isize]; 4]> = self.strides.iter().map(|s| s.as_slice()).collect();
        plan_loops(
            &self.dims,
            &refs,
            &self.offsets,
            &self.dtypes,
            Some(1),
            KernelConfig::global(),
        )
    }
}

fn ancillary_participants<A, SA>(
    ancillary: &[StridedView<'_, A, SA>],
    loop_dims: &[usize],
    into: &mut Participants,
) -> Result<()>
where
    A: Element,
    SA: ElementAccess<Elem = A> + ?Sized,
{
    for a in ancillary {
        into.strides.push(ancillary_strides(a.dims(), a.strides(), loop_dims)?);
        into.offsets.push(a.offset());
        into.dtypes.push(A::DTYPE);
    }
    Ok(())
}

/// Reduce every core sub-array of `input` to one element of `output`.
///
/// `output` has exactly the loop dimensions of `input` (those not named in
/// `core_dims`, in their original order). Each ancillary view has the same
/// shape as `output` or rank 0, and is handed to `f` as 1-element lanes.
/// The input lane may enumerate the sub-array in any order.
pub fn reduce_subarrays_into<T, S, O, SO, A, SA, E, F>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, O, SO>,
    ancillary: &[StridedView<'_, A, SA>],
    core_dims: &[isize],
    mut f: F,
) -> std::result::Result<(), E>
where
    T: Element + Default,
    S: ScratchAlloc<Elem = T> + ?Sized,
    O: Element,
    SO: ElementAccessMut<Elem = O> + ?Sized,
    A: Element,
    SA: ElementAccess<Elem = A> + ?Sized,
    E: From<NdLoopError>,
    F: FnMut(StridedLane<'_, T, S>, &[StridedLane<'_, A, SA>]) -> std::result::Result<O, E>,
{
    let core = normalize_dims(core_dims, input.ndim())?;
    let split = split_dims(input.dims(), input.strides(), &core);
    if output.ndim() != split.loop_dims.len() {
        return Err(NdLoopError::RankMismatch(output.ndim(), split.loop_dims.len()).into());
    }
    if output.dims() != split.loop_dims.as_slice() {
        return Err(
            NdLoopError::ShapeMismatch(output.dims().to_vec(), split.loop_dims.clone()).into(),
        );
    }
    let mut participants = Participants {
        strides: vec![split.loop_strides.clone(), output.strides().to_vec()],
        offsets: [input.offset(), output.offset()].into_iter().collect(),
        dtypes: [T::DTYPE, O::DTYPE].into_iter().collect(),
        dims: split.loop_dims.clone(),
    };
    ancillary_participants(ancillary, &split.loop_dims, &mut participants)?;

    if input.is_empty() {
        return Ok(());
    }

    let mut reshape = Reshape::<S>::plan(
        &split.core_dims,
        &split.core_strides,
        input.order(),
        ElementOrder::Any,
        T::default(),
    )?;
    let plan = participants.plan();

    let in_data = input.data();
    let out_data = output.data_mut();
    let mut anc_lanes: SmallVec<[StridedLane<'_, A, SA>; 4]> = ancillary
        .iter()
        .map(|a| StridedLane::new(a.data(), 1, 0, a.offset()))
        .collect();

    execute::<E, _>(&plan, &mut |p: &[isize]| {
        for (lane, &offset) in anc_lanes.iter_mut().zip(&p[2..]) {
            *lane = lane.at_offset(offset);
        }
        let value = f(reshape.lane(in_data, p[0]), &anc_lanes[..])?;
        out_data.set(p[1] as usize, value);
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}

/// Map every core sub-array of `input` onto the matching sub-array of
/// `output`.
///
/// `input` and `output` have the same shape; ancillary views follow the
/// loop dimensions as in [`reduce_subarrays_into`]. Lane element `i` is
/// logical element `i` of the sub-array in the input's order, for both the
/// input and the output lane.
pub fn map_subarrays_into<T, S, U, SU, A, SA, E, F>(
    input: &StridedView<'_, T, S>,
    output: &mut StridedViewMut<'_, U, SU>,
    ancillary: &[StridedView<'_, A, SA>],
    core_dims: &[isize],
    mut f: F,
) -> std::result::Result<(), E>
where
    T: Element + Default,
    S: ScratchAlloc<Elem = T> + ?Sized,
    U: Element + Default,
    SU: ScratchAlloc<Elem = U> + ?Sized,
    A: Element,
    SA: ElementAccess<Elem = A> + ?Sized,
    E: From<NdLoopError>,
    F: FnMut(
        StridedLane<'_, T, S>,
        StridedLaneMut<'_, U, SU>,
        &[StridedLane<'_, A, SA>],
    ) -> std::result::Result<(), E>,
{
    if input.dims() != output.dims() {
        return Err(
            NdLoopError::ShapeMismatch(input.dims().to_vec(), output.dims().to_vec()).into(),
        );
    }
    let core = normalize_dims(core_dims, input.ndim())?;
    let split_in = split_dims(input.dims(), input.strides(), &core);
    let split_out = split_dims(output.dims(), output.strides(), &core);
    let mut participants = Participants {
        strides: vec![split_in.loop_strides.clone(), split_out.loop_strides.clone()],
        offsets: [input.offset(), output.offset()].into_iter().collect(),
        dtypes: [T::DTYPE, U::DTYPE].into_iter().collect(),
        dims: split_in.loop_dims.clone(),
    };
    ancillary_participants(ancillary, &split_in.loop_dims, &mut participants)?;

    if input.is_empty() {
        return Ok(());
    }

    let order = input.order();
    let mut in_reshape = Reshape::<S>::plan(
        &split_in.core_dims,
        &split_in.core_strides,
        order,
        ElementOrder::Logical,
        T::default(),
    )?;
    let mut out_reshape = Reshape::<SU>::plan(
        &split_out.core_dims,
        &split_out.core_strides,
        order,
        ElementOrder::Logical,
        U::default(),
    )?;
    let plan = participants.plan();

    let in_data = input.data();
    let out_data = output.data_mut();
    let mut anc_lanes: SmallVec<[StridedLane<'_, A, SA>; 4]> = ancillary
        .iter()
        .map(|a| StridedLane::new(a.data(), 1, 0, a.offset()))
        .collect();

    execute::<E, _>(&plan, &mut |p: &[isize]| {
        for (lane, &offset) in anc_lanes.iter_mut().zip(&p[2..]) {
            *lane = lane.at_offset(offset);
        }
        let lane = in_reshape.lane(in_data, p[0]);
        out_reshape.with_lane_mut(&mut *out_data, p[1], |out| f(lane, out, &anc_lanes[..]))?;
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}

/// Visit every element of `view` as a sequence of lanes.
///
/// Lanes cover the view exactly once in an unspecified order. Returning
/// `Break` from `f` stops the traversal; the break is passed back.
pub fn traverse<'a, T, S, E, F>(
    view: &StridedView<'a, T, S>,
    mut f: F,
) -> std::result::Result<ControlFlow<()>, E>
where
    T: Element,
    S: ElementAccess<Elem = T> + ?Sized,
    F: FnMut(StridedLane<'a, T, S>) -> std::result::Result<ControlFlow<()>, E>,
{
    let data = view.data();
    let (dims, strides, offset) = (view.dims(), view.strides(), view.offset());
    if view.is_empty() {
        return Ok(ControlFlow::Continue(()));
    }
    if dims.is_empty() {
        return f(StridedLane::new(data, 1, 0, offset));
    }
    if is_contiguous(dims, strides, offset, 1) {
        let (min, max) = min_max_buffer_index(dims, strides, offset);
        let lane = if iteration_order(strides) > 0 {
            StridedLane::new(data, numel(dims), 1, min)
        } else {
            StridedLane::new(data, numel(dims), -1, max)
        };
        log::debug!("ndloop: contiguous view {:?}/{:?} -> one lane", dims, strides);
        return f(lane);
    }

    let compressed = compress_dims(dims, &[strides]);
    let lo = loop_order(&compressed.dims, &[compressed.strides[0].as_slice()]);
    let (lane_len, lane_stride) = match (lo.dims.first(), lo.strides[0].first()) {
        (Some(&d), Some(&s)) => (d, s),
        _ => (1, 0),
    };
    let lane = StridedLane::new(data, lane_len, lane_stride, offset);
    let outer_dims = lo.dims.get(1..).unwrap_or_default();
    let outer_strides = lo.strides[0].get(1..).unwrap_or_default();
    let plan = plan_loops(
        outer_dims,
        &[outer_strides],
        &[offset],
        &[T::DTYPE],
        None,
        KernelConfig::global(),
    );
    execute(&plan, &mut |p: &[isize]| f(lane.at_offset(p[0])))
}
