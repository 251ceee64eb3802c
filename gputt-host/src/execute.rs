//! Execution: recursive loop nest dispatching to the leaf kernel.

use num_traits::Float;

use crate::element::AffineKernel;
use crate::plan::{HostPlan, LoopNode, Strategy};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Execute `dst = kernel(transpose(src), dst)` for a host plan.
///
/// With the `parallel` feature, large tensors are split across the rayon
/// pool along the outermost loop.
///
/// # Safety
/// - `src` must be valid for reads at every offset the plan's strides reach
/// - `dst` must be valid for reads and writes at every offset the plan reaches
/// - `src` and `dst` must not overlap
pub unsafe fn execute_plan<T: Float + Send + Sync>(
    src: *const T,
    dst: *mut T,
    plan: &HostPlan,
    kernel: AffineKernel<T>,
) {
    if try_execute_par(src, dst, plan, kernel) {
        return;
    }

    match &plan.root {
        Some(root) => run_node(src, dst, plan, root, kernel),
        None => run_leaf(src, dst, plan, kernel),
    }
}

/// Split the outermost loop across the rayon pool. Returns `false` when
/// the tensor is too small or there is no outer loop to split.
#[cfg(feature = "parallel")]
unsafe fn try_execute_par<T: Float + Send + Sync>(
    src: *const T,
    dst: *mut T,
    plan: &HostPlan,
    kernel: AffineKernel<T>,
) -> bool {
    if plan.volume() < crate::MIN_PARALLEL_LEN {
        return false;
    }
    let root = match plan.root.as_ref() {
        Some(r) if r.end > 1 => r,
        _ => return false,
    };

    // Raw pointers are not Send; carry addresses instead.
    let src_addr = src as usize;
    let dst_addr = dst as usize;
    let (src_step, dst_step) = (root.src_stride, root.dst_stride);

    (0..root.end).into_par_iter().for_each(|i| unsafe {
        let s = (src_addr as *const T).offset(i as isize * src_step);
        let d = (dst_addr as *mut T).offset(i as isize * dst_step);
        match &root.next {
            Some(next) => run_node(s, d, plan, next, kernel),
            None => run_leaf(s, d, plan, kernel),
        }
    });
    true
}

#[cfg(not(feature = "parallel"))]
unsafe fn try_execute_par<T: Float>(
    _src: *const T,
    _dst: *mut T,
    _plan: &HostPlan,
    _kernel: AffineKernel<T>,
) -> bool {
    false
}

unsafe fn run_node<T: Float>(
    src: *const T,
    dst: *mut T,
    plan: &HostPlan,
    node: &LoopNode,
    kernel: AffineKernel<T>,
) {
    let mut s = src;
    let mut d = dst;
    for _ in 0..node.end {
        match &node.next {
            Some(next) => run_node(s, d, plan, next, kernel),
            None => run_leaf(s, d, plan, kernel),
        }
        s = s.offset(node.src_stride);
        d = d.offset(node.dst_stride);
    }
}

#[inline]
unsafe fn run_leaf<T: Float>(src: *const T, dst: *mut T, plan: &HostPlan, kernel: AffineKernel<T>) {
    match plan.strategy {
        Strategy::Line { inner } => line(
            src,
            dst,
            plan.fused_dims[inner],
            plan.src_strides[inner],
            plan.dst_strides[inner],
            kernel,
        ),
        Strategy::Tiled {
            dim_a,
            dim_b,
            block,
        } => tiled(
            src,
            dst,
            [plan.fused_dims[dim_a], plan.fused_dims[dim_b]],
            [plan.src_strides[dim_a], plan.src_strides[dim_b]],
            [plan.dst_strides[dim_a], plan.dst_strides[dim_b]],
            block,
            kernel,
        ),
    }
}

#[inline]
unsafe fn line<T: Float>(
    src: *const T,
    dst: *mut T,
    count: usize,
    src_stride: isize,
    dst_stride: isize,
    kernel: AffineKernel<T>,
) {
    if src_stride == 1 && dst_stride == 1 && matches!(kernel, AffineKernel::Copy) {
        std::ptr::copy_nonoverlapping(src, dst, count);
        return;
    }
    let mut s = src;
    let mut d = dst;
    for _ in 0..count {
        kernel.store(*s, d);
        s = s.offset(src_stride);
        d = d.offset(dst_stride);
    }
}

/// Blocked 2D transpose over axes (a, b).
///
/// `sizes`, `src`, `dst` strides are given as `[a, b]`. Each
/// `block x block` tile is finished before moving on, so both the reads
/// (stride-1 along a) and the writes (stride-1 along b) stay in cache.
#[inline]
unsafe fn tiled<T: Float>(
    src: *const T,
    dst: *mut T,
    sizes: [usize; 2],
    src_strides: [isize; 2],
    dst_strides: [isize; 2],
    block: usize,
    kernel: AffineKernel<T>,
) {
    let [size_a, size_b] = sizes;
    let [sa, sb] = src_strides;
    let [da, db] = dst_strides;

    let mut ib = 0usize;
    while ib < size_b {
        let bb = block.min(size_b - ib);
        let mut ia = 0usize;
        while ia < size_a {
            let ba = block.min(size_a - ia);
            for i in ia..ia + ba {
                let s_row = src.offset(i as isize * sa);
                let d_row = dst.offset(i as isize * da);
                for j in ib..ib + bb {
                    kernel.store(*s_row.offset(j as isize * sb), d_row.offset(j as isize * db));
                }
            }
            ia += block;
        }
        ib += block;
    }
}
