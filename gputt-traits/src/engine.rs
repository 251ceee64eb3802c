//! Transpose engine interface.
//!
//! An engine owns the actual memory movement. The plan layer talks to it
//! only through [`TransposeEngine`], which mirrors the five primitives of
//! a cuTT-style library: one-time initialization, heuristic planning,
//! measured planning, execution and destruction.

use std::fmt;
use std::sync::OnceLock;

use crate::buffer::DevicePtr;
use crate::stream::StreamHandle;

/// Status code returned by engine primitives.
///
/// A newtype over the raw code so that codes outside the known set can
/// still be carried and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineStatus(pub i32);

impl EngineStatus {
    pub const SUCCESS: EngineStatus = EngineStatus(0);
    pub const INVALID_PLAN: EngineStatus = EngineStatus(1);
    pub const INVALID_PARAMETER: EngineStatus = EngineStatus(2);
    pub const INVALID_DEVICE: EngineStatus = EngineStatus(3);
    pub const INTERNAL_ERROR: EngineStatus = EngineStatus(4);
    pub const UNDEFINED_ERROR: EngineStatus = EngineStatus(5);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Fixed human-readable message for this status. Total over all codes.
    pub fn message(self) -> &'static str {
        match self {
            Self::SUCCESS => "Success",
            Self::INVALID_PLAN => "Invalid plan handle",
            Self::INVALID_PARAMETER => "Invalid input parameter",
            Self::INVALID_DEVICE => {
                "Execution tried on device different than where plan was created"
            }
            Self::INTERNAL_ERROR => "Internal error",
            Self::UNDEFINED_ERROR => "Undefined error",
            _ => "Unknown error",
        }
    }

    /// `Ok(())` on success, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), EngineStatus> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Opaque handle to an engine-side plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanHandle(pub u64);

/// Arguments shared by both planning primitives.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// Tensor extents, axis 0 fastest.
    pub dims: &'a [usize],
    /// Output axis `i` is input axis `permutation[i]`.
    pub permutation: &'a [usize],
    /// Size of one element in bytes.
    pub elem_size: usize,
    pub stream: StreamHandle,
}

impl PlanRequest<'_> {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Run-once guard around engine initialization.
///
/// The first caller of [`InitGuard::get_or_init`] runs the closure; every
/// other caller, concurrent or later, blocks until it finishes and then
/// sees the same status. There is no teardown.
#[derive(Debug)]
pub struct InitGuard {
    status: OnceLock<EngineStatus>,
}

impl InitGuard {
    pub const fn new() -> Self {
        Self {
            status: OnceLock::new(),
        }
    }

    /// The process-wide guard.
    pub fn process() -> &'static InitGuard {
        static PROCESS: InitGuard = InitGuard::new();
        &PROCESS
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> EngineStatus) -> EngineStatus {
        *self.status.get_or_init(init)
    }

    /// Stored status, or `None` if initialization has not run yet.
    pub fn status(&self) -> Option<EngineStatus> {
        self.status.get().copied()
    }
}

impl Default for InitGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// The transpose engine primitives consumed by the plan layer.
///
/// Plans call [`initialize`](Self::initialize) through
/// [`init_guard`](Self::init_guard), so engines do not need their own
/// run-once logic. The default guard is process-wide; an engine that keeps
/// per-instance state (such as a test double) may return its own.
pub trait TransposeEngine: Send + Sync {
    /// One-time setup. Called at most once per guard.
    fn initialize(&self) -> EngineStatus;

    fn init_guard(&self) -> &InitGuard {
        InitGuard::process()
    }

    /// Create a plan chosen by heuristics, without touching any data.
    fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanHandle, EngineStatus>;

    /// Create a plan by timing candidate implementations on real buffers.
    ///
    /// `alpha`/`beta` of `None` stand for a null scalar pointer.
    ///
    /// # Safety
    ///
    /// `input` and `output` must be valid for `volume(dims) * elem_size`
    /// bytes and must not overlap. The output contents are overwritten.
    unsafe fn plan_measure(
        &self,
        request: &PlanRequest<'_>,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<PlanHandle, EngineStatus>;

    /// Enqueue `output = alpha * transpose(input) + beta * output`.
    ///
    /// # Safety
    ///
    /// Same buffer requirements as [`plan_measure`](Self::plan_measure),
    /// for the dims and element size the plan was created with.
    unsafe fn execute(
        &self,
        handle: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> EngineStatus;

    /// Release a plan created by this engine.
    fn destroy(&self, handle: PlanHandle) -> EngineStatus;
}
