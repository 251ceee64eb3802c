//! Dimension fusion for transpose planning.
//!
//! A transpose touches every element once, so the loop nest only needs as
//! many levels as there are "breaks" in contiguity. Axes that are
//! contiguous in both input and output collapse into one.

/// Fuse consecutive axes that are contiguous in BOTH input and output.
///
/// Axis `i` merges into the previous fused axis when
/// `src[i] == src[prev] * dims[prev]` and `dst[i] == dst[prev] * dims[prev]`.
/// Size-1 axes are dropped first; a tensor with no axis larger than one
/// becomes a single axis of extent 1.
///
/// Returns `(fused_dims, fused_src_strides, fused_dst_strides)`.
pub fn fuse_dims_bilateral(
    dims: &[usize],
    src_strides: &[isize],
    dst_strides: &[isize],
) -> (Vec<usize>, Vec<isize>, Vec<isize>) {
    let kept: Vec<usize> = (0..dims.len()).filter(|&i| dims[i] > 1).collect();
    if kept.is_empty() {
        return (vec![1], vec![1], vec![1]);
    }

    let mut fused_dims = Vec::with_capacity(kept.len());
    let mut fused_src = Vec::with_capacity(kept.len());
    let mut fused_dst = Vec::with_capacity(kept.len());

    for &i in &kept {
        if let Some(last) = fused_dims.len().checked_sub(1) {
            let d_prev = fused_dims[last] as isize;
            let src_contiguous = src_strides[i] == fused_src[last] * d_prev;
            let dst_contiguous = dst_strides[i] == fused_dst[last] * d_prev;
            if src_contiguous && dst_contiguous {
                fused_dims[last] *= dims[i];
                continue;
            }
        }
        fused_dims.push(dims[i]);
        fused_src.push(src_strides[i]);
        fused_dst.push(dst_strides[i]);
    }

    (fused_dims, fused_src, fused_dst)
}
