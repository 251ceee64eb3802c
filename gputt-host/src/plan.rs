//! Plan construction for the host transpose engine.
//!
//! fuse axes -> find the stride-1 axis on each side -> pick a leaf
//! strategy -> order the remaining axes -> build the LoopNode chain.

use std::fmt;

use gputt_traits::{
    checked_volume, col_major_strides, is_permutation, output_dims, EngineStatus, PlanRequest,
};

use crate::fuse::fuse_dims_bilateral;
use crate::SUPPORTED_ELEM_SIZES;

/// Tile side for 8-byte elements.
const BLOCK_F64: usize = 16;
/// Tile side for 4-byte elements.
const BLOCK_F32: usize = 32;

/// One level of the outer loop nest.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopNode {
    /// Loop runs `0..end`.
    pub end: usize,
    pub src_stride: isize,
    pub dst_stride: isize,
    /// Next (inner) level. `None` means the leaf kernel runs next.
    pub next: Option<Box<LoopNode>>,
}

/// What the leaf of the loop nest does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Walk one line along `inner` with both strides.
    Line { inner: usize },
    /// Blocked 2D transpose over the input stride-1 axis `dim_a` and the
    /// output stride-1 axis `dim_b`.
    Tiled {
        dim_a: usize,
        dim_b: usize,
        block: usize,
    },
}

/// Named implementation candidates, used by measured planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Input and output share the stride-1 axis; plain strided copy.
    Contiguous,
    /// Lines along the input stride-1 axis (sequential reads).
    ReadOrdered,
    /// Lines along the output stride-1 axis (sequential writes).
    WriteOrdered,
    /// 2D tiles over both stride-1 axes.
    Tiled,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Contiguous => "contiguous",
            Variant::ReadOrdered => "read-ordered",
            Variant::WriteOrdered => "write-ordered",
            Variant::Tiled => "tiled",
        };
        f.write_str(name)
    }
}

/// Complete host plan.
#[derive(Debug, Clone)]
pub struct HostPlan {
    pub variant: Variant,
    pub strategy: Strategy,
    pub elem_size: usize,
    /// Fused extents (input axis order).
    pub fused_dims: Vec<usize>,
    pub src_strides: Vec<isize>,
    pub dst_strides: Vec<isize>,
    /// Outermost loop level, `None` when the leaf covers everything.
    pub root: Option<LoopNode>,
}

impl HostPlan {
    /// Total number of elements moved.
    pub fn volume(&self) -> usize {
        self.fused_dims.iter().product()
    }
}

/// Check a request the way the engine's C API would.
fn validate_request(request: &PlanRequest<'_>) -> Result<(), EngineStatus> {
    let rank = request.rank();
    if rank == 0
        || !is_permutation(request.permutation, rank)
        || request.dims.contains(&0)
        || !matches!(checked_volume(request.dims), Some(v) if v <= isize::MAX as usize)
        || !SUPPORTED_ELEM_SIZES.contains(&request.elem_size)
    {
        return Err(EngineStatus::INVALID_PARAMETER);
    }
    Ok(())
}

/// Input and output strides of every input axis, after fusion.
fn fused_layout(request: &PlanRequest<'_>) -> (Vec<usize>, Vec<isize>, Vec<isize>) {
    let src_strides = col_major_strides(request.dims);
    let out_strides = col_major_strides(&output_dims(request.dims, request.permutation));
    let mut dst_strides = vec![0isize; request.rank()];
    for (i, &axis) in request.permutation.iter().enumerate() {
        dst_strides[axis] = out_strides[i];
    }
    fuse_dims_bilateral(request.dims, &src_strides, &dst_strides)
}

/// Axis with the smallest absolute stride among non-trivial axes.
fn find_stride1_dim(dims: &[usize], strides: &[isize]) -> usize {
    dims.iter()
        .zip(strides.iter())
        .enumerate()
        .filter(|(_, (&d, _))| d > 1)
        .min_by_key(|(_, (_, &s))| s.unsigned_abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn block_for_elem_size(elem_size: usize) -> usize {
    match elem_size {
        4 => BLOCK_F32,
        _ => BLOCK_F64,
    }
}

/// Axes other than `skip`, sorted by `cost` descending (largest outermost).
fn loop_order(dims: &[usize], skip: &[usize], cost: impl Fn(usize) -> usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dims.len())
        .filter(|d| !skip.contains(d) && dims[*d] > 1)
        .collect();
    order.sort_by(|&a, &b| cost(b).cmp(&cost(a)));
    order
}

/// Build the LoopNode chain, outermost first.
fn build_loop_nodes(
    dims: &[usize],
    src_strides: &[isize],
    dst_strides: &[isize],
    order: &[usize],
) -> Option<LoopNode> {
    let mut current: Option<LoopNode> = None;
    for &d in order.iter().rev() {
        current = Some(LoopNode {
            end: dims[d],
            src_stride: src_strides[d],
            dst_stride: dst_strides[d],
            next: current.map(Box::new),
        });
    }
    current
}

/// Variants that make sense for this request, heuristic choice first.
pub fn candidate_variants(request: &PlanRequest<'_>) -> Result<Vec<Variant>, EngineStatus> {
    validate_request(request)?;
    let (dims, src, dst) = fused_layout(request);
    if find_stride1_dim(&dims, &src) == find_stride1_dim(&dims, &dst) {
        Ok(vec![Variant::Contiguous])
    } else {
        Ok(vec![Variant::Tiled, Variant::ReadOrdered, Variant::WriteOrdered])
    }
}

/// Build the heuristic plan for a request.
pub fn build_host_plan(request: &PlanRequest<'_>) -> Result<HostPlan, EngineStatus> {
    let variants = candidate_variants(request)?;
    build_variant(request, variants[0])
}

/// Build a specific variant.
///
/// Fails with `INVALID_PARAMETER` if the variant does not apply (for
/// example `Tiled` when both sides share the stride-1 axis).
pub fn build_variant(request: &PlanRequest<'_>, variant: Variant) -> Result<HostPlan, EngineStatus> {
    validate_request(request)?;
    let (fused_dims, src_strides, dst_strides) = fused_layout(request);
    let dim_a = find_stride1_dim(&fused_dims, &src_strides);
    let dim_b = find_stride1_dim(&fused_dims, &dst_strides);

    let src_cost = |d: usize| src_strides[d].unsigned_abs();
    let dst_cost = |d: usize| dst_strides[d].unsigned_abs();

    let (strategy, order) = match variant {
        Variant::Contiguous => {
            if dim_a != dim_b {
                return Err(EngineStatus::INVALID_PARAMETER);
            }
            let order = loop_order(&fused_dims, &[dim_a], dst_cost);
            (Strategy::Line { inner: dim_a }, order)
        }
        Variant::ReadOrdered => {
            let order = loop_order(&fused_dims, &[dim_a], src_cost);
            (Strategy::Line { inner: dim_a }, order)
        }
        Variant::WriteOrdered => {
            let order = loop_order(&fused_dims, &[dim_b], dst_cost);
            (Strategy::Line { inner: dim_b }, order)
        }
        Variant::Tiled => {
            if dim_a == dim_b {
                return Err(EngineStatus::INVALID_PARAMETER);
            }
            let order = loop_order(&fused_dims, &[dim_a, dim_b], |d| src_cost(d) + dst_cost(d));
            let block = block_for_elem_size(request.elem_size);
            (Strategy::Tiled { dim_a, dim_b, block }, order)
        }
    };

    let root = build_loop_nodes(&fused_dims, &src_strides, &dst_strides, &order);
    Ok(HostPlan {
        variant,
        strategy,
        elem_size: request.elem_size,
        fused_dims,
        src_strides,
        dst_strides,
        root,
    })
}
