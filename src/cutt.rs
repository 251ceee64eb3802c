//! cuTT bindings.
//!
//! [`CuttEngine`] forwards every [`TransposeEngine`] primitive to the cuTT
//! C library. Enabled by the `cutt` feature; `build.rs` links `libcutt`
//! and `libcudart`.

use std::ffi::{c_int, c_uint, c_void};
use std::ptr;

use gputt_traits::{DevicePtr, EngineStatus, PlanHandle, PlanRequest, TransposeEngine};

#[allow(non_camel_case_types)]
mod ffi {
    use std::ffi::{c_int, c_uint, c_void};

    pub type cuttHandle = c_uint;
    pub type cuttResult = c_int;
    pub type cudaStream_t = *mut c_void;

    extern "C" {
        pub fn cuttInitialize() -> cuttResult;

        pub fn cuttPlan(
            handle: *mut cuttHandle,
            rank: c_int,
            dim: *const c_int,
            permutation: *const c_int,
            sizeof_type: usize,
            stream: cudaStream_t,
        ) -> cuttResult;

        pub fn cuttPlanMeasure(
            handle: *mut cuttHandle,
            rank: c_int,
            dim: *const c_int,
            permutation: *const c_int,
            sizeof_type: usize,
            stream: cudaStream_t,
            idata: *const c_void,
            odata: *mut c_void,
            alpha: *const c_void,
            beta: *const c_void,
        ) -> cuttResult;

        pub fn cuttExecute(
            handle: cuttHandle,
            idata: *const c_void,
            odata: *mut c_void,
            alpha: *const c_void,
            beta: *const c_void,
        ) -> cuttResult;

        pub fn cuttDestroy(handle: cuttHandle) -> cuttResult;
    }
}

/// Convert extents or axes to the `int` arrays cuTT expects.
fn to_c_ints(values: &[usize]) -> Result<Vec<c_int>, EngineStatus> {
    values
        .iter()
        .map(|&v| c_int::try_from(v).map_err(|_| EngineStatus::INVALID_PARAMETER))
        .collect()
}

fn scalar_ptr(value: &Option<f64>) -> *const c_void {
    match value {
        Some(v) => v as *const f64 as *const c_void,
        None => ptr::null(),
    }
}

fn handle_from(raw: ffi::cuttHandle) -> PlanHandle {
    PlanHandle(u64::from(raw))
}

fn raw_handle(handle: PlanHandle) -> Result<ffi::cuttHandle, EngineStatus> {
    c_uint::try_from(handle.0).map_err(|_| EngineStatus::INVALID_PLAN)
}

/// The cuTT library as a transpose engine. Uses the process-wide init guard.
#[derive(Debug, Default, Clone, Copy)]
pub struct CuttEngine;

impl CuttEngine {
    pub fn new() -> Self {
        CuttEngine
    }
}

impl TransposeEngine for CuttEngine {
    fn initialize(&self) -> EngineStatus {
        EngineStatus(unsafe { ffi::cuttInitialize() })
    }

    fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanHandle, EngineStatus> {
        let dims = to_c_ints(request.dims)?;
        let perm = to_c_ints(request.permutation)?;
        let rank = c_int::try_from(request.rank()).map_err(|_| EngineStatus::INVALID_PARAMETER)?;
        let mut raw: ffi::cuttHandle = 0;
        let status = EngineStatus(unsafe {
            ffi::cuttPlan(
                &mut raw,
                rank,
                dims.as_ptr(),
                perm.as_ptr(),
                request.elem_size,
                request.stream.0 as ffi::cudaStream_t,
            )
        });
        status.into_result().map(|()| handle_from(raw))
    }

    unsafe fn plan_measure(
        &self,
        request: &PlanRequest<'_>,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<PlanHandle, EngineStatus> {
        let dims = to_c_ints(request.dims)?;
        let perm = to_c_ints(request.permutation)?;
        let rank = c_int::try_from(request.rank()).map_err(|_| EngineStatus::INVALID_PARAMETER)?;
        let mut raw: ffi::cuttHandle = 0;
        let status = EngineStatus(ffi::cuttPlanMeasure(
            &mut raw,
            rank,
            dims.as_ptr(),
            perm.as_ptr(),
            request.elem_size,
            request.stream.0 as ffi::cudaStream_t,
            input.as_ptr(),
            output.as_mut_ptr(),
            scalar_ptr(&alpha),
            scalar_ptr(&beta),
        ));
        status.into_result().map(|()| handle_from(raw))
    }

    unsafe fn execute(
        &self,
        handle: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> EngineStatus {
        let raw = match raw_handle(handle) {
            Ok(raw) => raw,
            Err(status) => return status,
        };
        EngineStatus(ffi::cuttExecute(
            raw,
            input.as_ptr(),
            output.as_mut_ptr(),
            scalar_ptr(&alpha),
            scalar_ptr(&beta),
        ))
    }

    fn destroy(&self, handle: PlanHandle) -> EngineStatus {
        match raw_handle(handle) {
            Ok(raw) => EngineStatus(unsafe { ffi::cuttDestroy(raw) }),
            Err(status) => status,
        }
    }
}
