//! Host-side plan layer for GPU tensor transpose engines.
//!
//! A [`Plan`] binds a tensor shape, an axis permutation and a stream to an
//! engine-selected transpose implementation and executes
//! `output = alpha * transpose(input) + beta * output` between two device
//! buffers. The engine itself is anything implementing
//! [`TransposeEngine`]:
//!
//! - [`cutt::CuttEngine`] (feature `cutt`): the cuTT CUDA library
//! - `gputt_host::HostEngine`: a host-memory reference engine
//!
//! # Example
//!
//! ```ignore
//! let engine = Arc::new(HostEngine::new());
//! let mut plan = Plan::new(engine, 2, &[3, 4], &[1, 0], None)?;
//! plan.execute(&input, &mut output, None, None)?;
//! ```
//!
//! # Dependency graph
//!
//! ```text
//! gputt-traits -> gputt-host
//!             \-> gputt
//! ```

#[cfg(feature = "cutt")]
pub mod cutt;
mod error;
mod init;
mod plan;

pub use error::{BufferRole, EngineStage, ErrorKind, Result, TransposeError};
pub use init::ensure_engine_initialized;
pub use plan::Plan;

// Re-export the capability traits so callers need a single dependency.
pub use gputt_traits::{
    DType, DeviceBuffer, DevicePtr, DeviceStream, EngineStatus, InitGuard, PlanHandle,
    PlanRequest, StreamHandle, TransposeEngine,
};
