//! Test engine: the host engine plus call counters and injectable failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gputt::{DevicePtr, EngineStatus, InitGuard, PlanHandle, PlanRequest, TransposeEngine};
use gputt_host::HostEngine;

#[derive(Debug, Default)]
pub struct CountingEngine {
    inner: HostEngine,
    guard: InitGuard,
    init_calls: AtomicUsize,
    plan_calls: AtomicUsize,
    measure_calls: AtomicUsize,
    execute_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
    fail_init: Option<EngineStatus>,
    fail_plan: Option<EngineStatus>,
    fail_measure: Option<EngineStatus>,
    fail_execute: Option<EngineStatus>,
    fail_destroy: Option<EngineStatus>,
    slow_init: bool,
}

#[allow(dead_code)]
impl CountingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init(mut self, status: EngineStatus) -> Self {
        self.fail_init = Some(status);
        self
    }

    pub fn failing_plan(mut self, status: EngineStatus) -> Self {
        self.fail_plan = Some(status);
        self
    }

    pub fn failing_measure(mut self, status: EngineStatus) -> Self {
        self.fail_measure = Some(status);
        self
    }

    pub fn failing_execute(mut self, status: EngineStatus) -> Self {
        self.fail_execute = Some(status);
        self
    }

    pub fn failing_destroy(mut self, status: EngineStatus) -> Self {
        self.fail_destroy = Some(status);
        self
    }

    /// Make initialization slow enough that concurrent callers overlap.
    pub fn slow_init(mut self) -> Self {
        self.slow_init = true;
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub fn measure_calls(&self) -> usize {
        self.measure_calls.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn live_plans(&self) -> usize {
        self.inner.live_plans()
    }
}

impl TransposeEngine for CountingEngine {
    fn initialize(&self) -> EngineStatus {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_init {
            std::thread::sleep(Duration::from_millis(20));
        }
        self.fail_init.unwrap_or(EngineStatus::SUCCESS)
    }

    fn init_guard(&self) -> &InitGuard {
        &self.guard
    }

    fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanHandle, EngineStatus> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_plan {
            Some(status) => Err(status),
            None => self.inner.plan(request),
        }
    }

    unsafe fn plan_measure(
        &self,
        request: &PlanRequest<'_>,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<PlanHandle, EngineStatus> {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_measure {
            Some(status) => Err(status),
            None => self.inner.plan_measure(request, input, output, alpha, beta),
        }
    }

    unsafe fn execute(
        &self,
        handle: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> EngineStatus {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_execute {
            Some(status) => status,
            None => self.inner.execute(handle, input, output, alpha, beta),
        }
    }

    fn destroy(&self, handle: PlanHandle) -> EngineStatus {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.inner.destroy(handle);
        self.fail_destroy.unwrap_or(status)
    }
}
