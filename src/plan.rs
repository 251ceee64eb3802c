//! Transpose plans: construction, lazy binding and execution.
//!
//! A [`Plan`] starts either
//! - **deferred** ([`Plan::new`]): only shape, permutation and stream are
//!   known. The element size, and with it the engine plan, is bound on the
//!   first [`Plan::execute`] using the engine's heuristic planner.
//! - **bound** ([`Plan::new_measured`]): sample buffers give the element
//!   size up front and the engine times its candidates on them.
//!
//! A plan binds at most once. After that its element size and engine
//! handle never change, and a failed binding is never retried: the plan
//! stays bound to the failure and every execute reports it.

use std::fmt;
use std::sync::Arc;

use gputt_traits::{
    checked_volume, is_permutation, output_dims, DeviceBuffer, DevicePtr, DeviceStream,
    EngineStatus, PlanHandle, PlanRequest, StreamHandle, TransposeEngine,
};

use crate::error::{BufferRole, EngineStage, Result, TransposeError};
use crate::init::ensure_engine_initialized;

/// Binding state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    /// Element size unknown, engine not asked yet.
    Deferred,
    /// The single planning attempt has happened.
    Bound {
        elem_size: usize,
        binding: std::result::Result<PlanHandle, EngineStatus>,
    },
}

/// A transpose of a fixed shape and permutation on one stream.
///
/// Layout is column-major (axis 0 fastest). Output axis `i` is input
/// axis `permutation[i]`, so the output extents are
/// `dims[permutation[i]]`.
///
/// `execute` takes `&mut self`: one plan must not be used from several
/// threads at once. Share an engine, not a plan.
pub struct Plan<E: TransposeEngine + ?Sized = dyn TransposeEngine> {
    engine: Arc<E>,
    dims: Vec<usize>,
    permutation: Vec<usize>,
    stream: StreamHandle,
    volume: usize,
    state: PlanState,
}

/// Check the shape and return its element count.
fn validate_shape(rank: usize, dims: &[usize], permutation: &[usize]) -> Result<usize> {
    if dims.len() != rank || permutation.len() != rank {
        return Err(TransposeError::RankMismatch {
            rank,
            dims: dims.len(),
            permutation: permutation.len(),
        });
    }
    if rank == 0 {
        return Err(TransposeError::EmptyShape);
    }
    if let Some(axis) = dims.iter().position(|&d| d == 0) {
        return Err(TransposeError::ZeroExtent { axis });
    }
    if !is_permutation(permutation, rank) {
        return Err(TransposeError::InvalidPermutation {
            permutation: permutation.to_vec(),
            rank,
        });
    }
    checked_volume(dims).ok_or_else(|| TransposeError::ShapeTooLarge {
        dims: dims.to_vec(),
    })
}

fn resolve_stream(stream: Option<&dyn DeviceStream>) -> Result<StreamHandle> {
    match stream {
        None => Ok(StreamHandle::DEFAULT),
        Some(s) => s.native_handle().ok_or_else(|| TransposeError::NotAStream {
            value: format!("{s:?}"),
        }),
    }
}

/// Check both buffers and return their device pointers.
///
/// Everything here is local; nothing reaches the engine on failure.
fn validate_buffers(
    expected_len: usize,
    input: &dyn DeviceBuffer,
    output: &mut dyn DeviceBuffer,
) -> Result<(DevicePtr, DevicePtr)> {
    let in_ptr = input
        .device_ptr()
        .ok_or_else(|| TransposeError::NotADeviceBuffer {
            role: BufferRole::Input,
            value: format!("{input:?}"),
        })?;
    let out_ptr = output
        .device_ptr_mut()
        .ok_or_else(|| TransposeError::NotADeviceBuffer {
            role: BufferRole::Output,
            value: format!("{output:?}"),
        })?;
    if input.dtype() != output.dtype() {
        return Err(TransposeError::DTypeMismatch {
            input: input.dtype(),
            output: output.dtype(),
        });
    }
    for (role, len) in [(BufferRole::Input, input.len()), (BufferRole::Output, output.len())] {
        if len != expected_len {
            return Err(TransposeError::BufferLengthMismatch {
                role,
                expected: expected_len,
                got: len,
            });
        }
    }
    Ok((in_ptr, out_ptr))
}

impl<E: TransposeEngine + ?Sized> Plan<E> {
    /// Create a deferred plan. The engine is initialized but not asked to plan.
    pub fn new(
        engine: Arc<E>,
        rank: usize,
        dims: &[usize],
        permutation: &[usize],
        stream: Option<&dyn DeviceStream>,
    ) -> Result<Self> {
        ensure_engine_initialized(&*engine)?;
        let stream = resolve_stream(stream)?;
        let volume = validate_shape(rank, dims, permutation)?;

        Ok(Self {
            engine,
            dims: dims.to_vec(),
            permutation: permutation.to_vec(),
            stream,
            volume,
            state: PlanState::Deferred,
        })
    }

    /// Create a plan by letting the engine measure its candidates on
    /// `input`/`output`.
    ///
    /// The element size is taken from `input`. The engine runs real
    /// transposes while measuring, so `output` is overwritten.
    ///
    /// A failed measurement still yields a plan, bound to the failure:
    /// [`Plan::planning_status`] reports the status and every
    /// [`Plan::execute`] fails with [`TransposeError::PlanNotBound`]
    /// without reaching the engine. There is no fallback to heuristic
    /// planning.
    #[allow(clippy::too_many_arguments)]
    pub fn new_measured(
        engine: Arc<E>,
        rank: usize,
        dims: &[usize],
        permutation: &[usize],
        stream: Option<&dyn DeviceStream>,
        input: &dyn DeviceBuffer,
        output: &mut dyn DeviceBuffer,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<Self> {
        ensure_engine_initialized(&*engine)?;
        let stream = resolve_stream(stream)?;
        let volume = validate_shape(rank, dims, permutation)?;
        let (in_ptr, out_ptr) = validate_buffers(volume, input, output)?;

        let elem_size = input.item_size();
        let request = PlanRequest {
            dims,
            permutation,
            elem_size,
            stream,
        };
        // SAFETY: both buffers are recognized device buffers holding
        // exactly volume(dims) elements of the same type.
        let binding = unsafe { engine.plan_measure(&request, in_ptr, out_ptr, alpha, beta) };
        match binding {
            Ok(handle) => {
                tracing::debug!(?dims, ?permutation, elem_size, ?handle, "measured plan bound");
            }
            Err(status) => {
                tracing::warn!(?dims, ?permutation, elem_size, %status, "measured planning failed");
            }
        }

        Ok(Self {
            engine,
            dims: dims.to_vec(),
            permutation: permutation.to_vec(),
            stream,
            volume,
            state: PlanState::Bound { elem_size, binding },
        })
    }

    /// Run `output = alpha * transpose(input) + beta * output`.
    ///
    /// `alpha`/`beta` of `None` mean no scaling and no accumulation. A
    /// deferred plan binds here, once, to the input's element size; later
    /// calls with a different element size are rejected.
    pub fn execute(
        &mut self,
        input: &dyn DeviceBuffer,
        output: &mut dyn DeviceBuffer,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<()> {
        let (in_ptr, out_ptr) = validate_buffers(self.volume(), input, output)?;
        let handle = self.bind(input.item_size())?;

        tracing::trace!(?handle, ?alpha, ?beta, stream = %self.stream, "execute transpose");
        // SAFETY: buffers validated above against this plan's volume and
        // element size.
        let status = unsafe { self.engine.execute(handle, in_ptr, out_ptr, alpha, beta) };
        status.into_result().map_err(|status| TransposeError::Engine {
            stage: EngineStage::Execute,
            status,
        })
    }

    /// Bind on first use and return the usable engine handle.
    fn bind(&mut self, elem_size: usize) -> Result<PlanHandle> {
        let (bound, binding) = match self.state {
            PlanState::Bound { elem_size, binding } => (elem_size, binding),
            PlanState::Deferred => {
                let binding = self.engine.plan(&self.request(elem_size));
                match binding {
                    Ok(handle) => {
                        tracing::debug!(dims = ?self.dims, perm = ?self.permutation, elem_size, ?handle, "plan bound");
                    }
                    Err(status) => {
                        tracing::debug!(dims = ?self.dims, perm = ?self.permutation, elem_size, %status, "planning failed");
                    }
                }
                self.state = PlanState::Bound { elem_size, binding };
                (elem_size, binding)
            }
        };
        if bound != elem_size {
            return Err(TransposeError::ElementSizeMismatch {
                bound,
                got: elem_size,
            });
        }
        binding.map_err(|status| TransposeError::PlanNotBound { status })
    }

    fn request(&self, elem_size: usize) -> PlanRequest<'_> {
        PlanRequest {
            dims: &self.dims,
            permutation: &self.permutation,
            elem_size,
            stream: self.stream,
        }
    }

    /// Release the engine plan. Equivalent to dropping the plan.
    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let PlanState::Bound {
            elem_size,
            binding: Ok(handle),
        } = self.state
        {
            let status = self.engine.destroy(handle);
            if !status.is_success() {
                tracing::warn!(?handle, %status, "failed to release transpose plan");
            }
            self.state = PlanState::Bound {
                elem_size,
                binding: Err(EngineStatus::INVALID_PLAN),
            };
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Extents of the transposed tensor.
    pub fn output_dims(&self) -> Vec<usize> {
        output_dims(&self.dims, &self.permutation)
    }

    /// Number of elements in the input (and output) tensor.
    pub fn volume(&self) -> usize {
        self.volume
    }

    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Bound element size, `None` while deferred.
    pub fn element_size(&self) -> Option<usize> {
        match self.state {
            PlanState::Deferred => None,
            PlanState::Bound { elem_size, .. } => Some(elem_size),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, PlanState::Bound { .. })
    }

    /// Outcome of the planning attempt, `None` while deferred.
    pub fn planning_status(&self) -> Option<EngineStatus> {
        match self.state {
            PlanState::Deferred => None,
            PlanState::Bound { binding: Ok(_), .. } => Some(EngineStatus::SUCCESS),
            PlanState::Bound {
                binding: Err(status),
                ..
            } => Some(status),
        }
    }
}

impl<E: TransposeEngine + ?Sized> Drop for Plan<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: TransposeEngine + ?Sized> fmt::Debug for Plan<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("dims", &self.dims)
            .field("permutation", &self.permutation)
            .field("stream", &self.stream)
            .field("state", &self.state)
            .finish()
    }
}
