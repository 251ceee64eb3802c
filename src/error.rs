use std::fmt;

use gputt_traits::{DType, EngineStatus};

/// Which buffer argument an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    Input,
    Output,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::Input => f.write_str("Input"),
            BufferRole::Output => f.write_str("Output"),
        }
    }
}

/// The engine primitive that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStage {
    Initialize,
    Execute,
}

/// Coarse error category, for callers that only need to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument detected locally; the engine was not contacted.
    InvalidArgument,
    /// The transpose engine reported a non-success status.
    Engine,
}

/// Errors raised by plan construction and execution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransposeError {
    #[error("{role} array must be a device buffer, got: {value}")]
    NotADeviceBuffer { role: BufferRole, value: String },

    #[error("Stream argument must be a device stream, got: {value}")]
    NotAStream { value: String },

    #[error("Input and output array must have the same type, got: {input} and {output}")]
    DTypeMismatch { input: DType, output: DType },

    #[error("rank {rank} does not match dims length {dims} / permutation length {permutation}")]
    RankMismatch {
        rank: usize,
        dims: usize,
        permutation: usize,
    },

    #[error("rank must be positive")]
    EmptyShape,

    #[error("axis {axis} has zero extent")]
    ZeroExtent { axis: usize },

    #[error("{permutation:?} is not a permutation of 0..{rank}")]
    InvalidPermutation { permutation: Vec<usize>, rank: usize },

    #[error("element count of dims {dims:?} overflows usize")]
    ShapeTooLarge { dims: Vec<usize> },

    #[error("{role} array has {got} elements, plan expects {expected}")]
    BufferLengthMismatch {
        role: BufferRole,
        expected: usize,
        got: usize,
    },

    #[error("plan is bound to {bound}-byte elements, got {got}-byte elements")]
    ElementSizeMismatch { bound: usize, got: usize },

    /// An engine primitive failed. The message is the status text.
    #[error("{status}")]
    Engine {
        stage: EngineStage,
        status: EngineStatus,
    },

    /// The plan's one planning attempt (heuristic or measured) failed;
    /// it cannot execute.
    #[error("{status}")]
    PlanNotBound { status: EngineStatus },
}

impl TransposeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransposeError::Engine { .. } | TransposeError::PlanNotBound { .. } => {
                ErrorKind::Engine
            }
            _ => ErrorKind::InvalidArgument,
        }
    }

    /// The engine status behind an engine error.
    pub fn engine_status(&self) -> Option<EngineStatus> {
        match self {
            TransposeError::Engine { status, .. } | TransposeError::PlanNotBound { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Convenience alias for `Result<T, TransposeError>`.
pub type Result<T> = std::result::Result<T, TransposeError>;
