//! Host-memory reference transpose engine.
//!
//! [`HostEngine`] implements [`gputt_traits::TransposeEngine`] over plain
//! host memory, so plans can be built, measured and executed without a
//! GPU. "Device pointers" handed to this engine are host addresses.
//!
//! Planning follows the usual cache-efficient transpose recipe:
//! 1. Bilateral dimension fusion (merge axes contiguous in both input and output)
//! 2. Identify the stride-1 axis on each side
//! 3. Pick a leaf strategy: a contiguous line when both sides share the
//!    stride-1 axis, otherwise a 2D tile over the two stride-1 axes
//! 4. Build the outer loop nest ordered by stride cost
//!
//! Measured planning times every candidate strategy on the caller's
//! buffers and keeps the fastest.

pub mod buffer;
pub mod element;
pub mod engine;
pub mod execute;
pub mod fuse;
pub mod measure;
pub mod plan;

pub use buffer::{HostArray, HostElement, HostStream};
pub use element::{AffineKernel, Scale};
pub use engine::HostEngine;
pub use execute::execute_plan;
pub use fuse::fuse_dims_bilateral;
pub use measure::{measure_best, median, MEASURE_REPS};
pub use plan::{build_host_plan, build_variant, HostPlan, LoopNode, Strategy, Variant};

/// Element sizes the engine accepts (single and double precision).
pub const SUPPORTED_ELEM_SIZES: [usize; 2] = [4, 8];

/// Minimum number of elements before execution is split across threads.
pub const MIN_PARALLEL_LEN: usize = 1 << 15;
