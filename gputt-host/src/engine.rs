//! [`HostEngine`]: the [`TransposeEngine`] implementation over host memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use gputt_traits::{DevicePtr, EngineStatus, PlanHandle, PlanRequest, TransposeEngine};

use crate::element::{AffineKernel, Scale};
use crate::execute::execute_plan;
use crate::measure::measure_best;
use crate::plan::{build_host_plan, HostPlan};

/// Reference transpose engine operating on host memory.
///
/// Plans live in a handle table; handles are never reused within one
/// engine. Work is executed synchronously regardless of the stream.
///
/// Like cuTT, the engine only knows element sizes, not types. Without
/// `alpha`/`beta` any 4- or 8-byte element is moved bit for bit; with
/// scaling the data is treated as `f32`/`f64`, so integer buffers must
/// not be scaled.
#[derive(Debug)]
pub struct HostEngine {
    plans: Mutex<HashMap<u64, Arc<HostPlan>>>,
    next_handle: AtomicU64,
}

impl HostEngine {
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of plans created and not yet destroyed.
    pub fn live_plans(&self) -> usize {
        self.table().len()
    }

    /// The plan behind a handle, if it is still alive.
    pub fn host_plan(&self, handle: PlanHandle) -> Option<Arc<HostPlan>> {
        self.table().get(&handle.0).cloned()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn table(&self) -> MutexGuard<'_, HashMap<u64, Arc<HostPlan>>> {
        match self.plans.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register(&self, plan: HostPlan) -> PlanHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.table().insert(id, Arc::new(plan));
        PlanHandle(id)
    }
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransposeEngine for HostEngine {
    fn initialize(&self) -> EngineStatus {
        tracing::debug!("host transpose engine initialized");
        EngineStatus::SUCCESS
    }

    fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanHandle, EngineStatus> {
        let plan = build_host_plan(request)?;
        Ok(self.register(plan))
    }

    unsafe fn plan_measure(
        &self,
        request: &PlanRequest<'_>,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<PlanHandle, EngineStatus> {
        let plan = measure_best(
            request,
            input.as_ptr::<u8>(),
            output.as_mut_ptr::<u8>(),
            Scale::new(alpha, beta),
        )?;
        Ok(self.register(plan))
    }

    unsafe fn execute(
        &self,
        handle: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> EngineStatus {
        let Some(plan) = self.host_plan(handle) else {
            return EngineStatus::INVALID_PLAN;
        };
        if input.is_null() || output.is_null() {
            return EngineStatus::INVALID_PARAMETER;
        }
        let scale = Scale::new(alpha, beta);
        match plan.elem_size {
            4 => match AffineKernel::<f32>::new(scale) {
                Some(k) => execute_plan(input.as_ptr(), output.as_mut_ptr(), &plan, k),
                None => return EngineStatus::INVALID_PARAMETER,
            },
            8 => match AffineKernel::<f64>::new(scale) {
                Some(k) => execute_plan(input.as_ptr(), output.as_mut_ptr(), &plan, k),
                None => return EngineStatus::INVALID_PARAMETER,
            },
            _ => return EngineStatus::INTERNAL_ERROR,
        }
        EngineStatus::SUCCESS
    }

    fn destroy(&self, handle: PlanHandle) -> EngineStatus {
        match self.table().remove(&handle.0) {
            Some(_) => EngineStatus::SUCCESS,
            None => EngineStatus::INVALID_PLAN,
        }
    }
}
