//! Shape helpers shared by the plan layer and engines.
//!
//! All layouts are column-major (axis 0 varies fastest).

/// Compute column-major strides (axis 0 varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1] as isize;
    }
    strides
}

/// `true` if `perm` is a bijection on `0..rank`.
pub fn is_permutation(perm: &[usize], rank: usize) -> bool {
    if perm.len() != rank {
        return false;
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return false;
        }
        seen[p] = true;
    }
    true
}

/// Extents of the transposed tensor: output axis `i` has `dims[perm[i]]`.
pub fn output_dims(dims: &[usize], perm: &[usize]) -> Vec<usize> {
    perm.iter().map(|&p| dims[p]).collect()
}

/// Number of elements of a tensor with the given extents.
///
/// Callers must have checked the shape with [`checked_volume`] first.
pub fn volume(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Number of elements, or `None` if the product overflows `usize`.
pub fn checked_volume(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}
