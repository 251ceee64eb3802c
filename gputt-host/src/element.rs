//! Affine element kernel: `out = alpha * x + beta * out`.

use num_traits::Float;

/// Optional scalars as they arrive from the caller.
///
/// `alpha: None` means 1. `beta: None` (or zero) means the output is
/// overwritten without being read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scale {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
}

impl Scale {
    pub fn new(alpha: Option<f64>, beta: Option<f64>) -> Self {
        Self { alpha, beta }
    }

    /// Whether the previous output contents contribute to the result.
    pub fn reads_output(&self) -> bool {
        matches!(self.beta, Some(b) if b != 0.0)
    }

    /// The same scaling without accumulation.
    pub fn without_beta(self) -> Self {
        Self {
            alpha: self.alpha,
            beta: None,
        }
    }
}

/// Per-element store operation resolved for a concrete element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AffineKernel<T> {
    /// `out = x`, bit for bit.
    Copy,
    /// `out = alpha * x`
    Scale(T),
    /// `out = alpha * x + beta * out`
    Axpby(T, T),
}

impl<T: Float> AffineKernel<T> {
    /// Resolve `scale` for element type `T`.
    ///
    /// Returns `None` if a scalar cannot be represented in `T`.
    pub fn new(scale: Scale) -> Option<Self> {
        let alpha = match scale.alpha {
            Some(a) => Some(T::from(a)?),
            None => None,
        };
        if scale.reads_output() {
            let beta = T::from(scale.beta?)?;
            return Some(AffineKernel::Axpby(alpha.unwrap_or_else(T::one), beta));
        }
        Some(match alpha {
            None => AffineKernel::Copy,
            Some(a) => AffineKernel::Scale(a),
        })
    }

    /// Store `x` into `*dst`.
    ///
    /// # Safety
    /// `dst` must be valid for reads and writes.
    #[inline(always)]
    pub unsafe fn store(self, x: T, dst: *mut T) {
        match self {
            AffineKernel::Copy => *dst = x,
            AffineKernel::Scale(a) => *dst = a * x,
            AffineKernel::Axpby(a, b) => *dst = a * x + b * *dst,
        }
    }
}
