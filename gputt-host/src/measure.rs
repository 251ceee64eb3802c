//! Measured plan selection: time every candidate and keep the fastest.

use std::time::{Duration, Instant};

use gputt_traits::{EngineStatus, PlanRequest};
use num_traits::Float;

use crate::element::{AffineKernel, Scale};
use crate::execute::execute_plan;
use crate::plan::{build_variant, candidate_variants, HostPlan};

/// Timed runs per candidate (median is kept).
pub const MEASURE_REPS: usize = 5;

/// Median of the samples (mean of the middle two for even counts). Sorts in place.
pub fn median(samples: &mut [Duration]) -> Duration {
    samples.sort();
    let n = samples.len();
    if n % 2 == 1 {
        samples[n / 2]
    } else {
        (samples[n / 2 - 1] + samples[n / 2]) / 2
    }
}

unsafe fn time_plan<T: Float + Send + Sync>(
    src: *const T,
    dst: *mut T,
    plan: &HostPlan,
    kernel: AffineKernel<T>,
) -> Duration {
    // Warm-up run, untimed.
    execute_plan(src, dst, plan, kernel);
    let mut samples = Vec::with_capacity(MEASURE_REPS);
    for _ in 0..MEASURE_REPS {
        let t0 = Instant::now();
        execute_plan(src, dst, plan, kernel);
        samples.push(t0.elapsed());
    }
    median(&mut samples)
}

unsafe fn measure_typed<T: Float + Send + Sync>(
    request: &PlanRequest<'_>,
    src: *const T,
    dst: *mut T,
    scale: Scale,
) -> Result<HostPlan, EngineStatus> {
    // Repeated runs must be idempotent, so accumulation is left out.
    let kernel = AffineKernel::<T>::new(scale.without_beta()).ok_or(EngineStatus::INVALID_PARAMETER)?;

    let mut best: Option<(Duration, HostPlan)> = None;
    for variant in candidate_variants(request)? {
        let plan = build_variant(request, variant)?;
        let elapsed = time_plan(src, dst, &plan, kernel);
        tracing::trace!(%variant, ?elapsed, "measured candidate");
        if best.as_ref().map_or(true, |(t, _)| elapsed < *t) {
            best = Some((elapsed, plan));
        }
    }
    let (elapsed, plan) = best.ok_or(EngineStatus::INTERNAL_ERROR)?;
    tracing::debug!(variant = %plan.variant, ?elapsed, dims = ?request.dims, "selected measured plan");
    Ok(plan)
}

/// Time every candidate variant on the given buffers and return the fastest.
///
/// Leaves `alpha * transpose(src)` in `dst`.
///
/// # Safety
/// `src` and `dst` must each address `volume(dims) * elem_size` valid,
/// non-overlapping bytes, aligned for the element type.
pub unsafe fn measure_best(
    request: &PlanRequest<'_>,
    src: *const u8,
    dst: *mut u8,
    scale: Scale,
) -> Result<HostPlan, EngineStatus> {
    if src.is_null() || dst.is_null() {
        return Err(EngineStatus::INVALID_PARAMETER);
    }
    match request.elem_size {
        4 => measure_typed::<f32>(request, src as *const f32, dst as *mut f32, scale),
        8 => measure_typed::<f64>(request, src as *const f64, dst as *mut f64, scale),
        _ => Err(EngineStatus::INVALID_PARAMETER),
    }
}
