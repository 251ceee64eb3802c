//! Shared traits for the gputt ecosystem.
//!
//! This crate provides the capability interfaces that sit between the
//! plan layer (`gputt`) and concrete transpose engines (`gputt-host`, the
//! cuTT bindings, or anything else):
//!
//! - [`DeviceBuffer`]: pointer, element size, dtype and length of a buffer
//! - [`DeviceStream`]: native stream handle
//! - [`TransposeEngine`]: the five engine primitives
//! - [`EngineStatus`]: engine status codes and their fixed messages
//!
//! Buffer and stream types from other crates implement these traits
//! directly, without orphan rule problems.

pub mod buffer;
pub mod engine;
pub mod shape;
pub mod stream;

pub use buffer::{DType, DeviceBuffer, DevicePtr};
pub use engine::{EngineStatus, InitGuard, PlanHandle, PlanRequest, TransposeEngine};
pub use shape::{checked_volume, col_major_strides, is_permutation, output_dims, volume};
pub use stream::{DeviceStream, StreamHandle};
