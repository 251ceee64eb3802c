//! One-time engine initialization.
//!
//! The guard lives in the engine ([`TransposeEngine::init_guard`]); for
//! real engines it is the process-wide [`InitGuard::process`]. It is
//! initialized once and never torn down.
//!
//! [`InitGuard::process`]: gputt_traits::InitGuard::process

use gputt_traits::TransposeEngine;

use crate::error::{EngineStage, Result, TransposeError};

/// Run `engine.initialize()` exactly once per guard and report its status.
///
/// Concurrent first callers block until the single initialization call
/// finishes. A failed initialization is logged once and then reported to
/// every caller as a fatal setup error.
pub fn ensure_engine_initialized<E: TransposeEngine + ?Sized>(engine: &E) -> Result<()> {
    let status = engine.init_guard().get_or_init(|| {
        let status = engine.initialize();
        if status.is_success() {
            tracing::debug!("transpose engine initialized");
        } else {
            tracing::error!(code = status.0, %status, "transpose engine initialization failed");
        }
        status
    });
    status.into_result().map_err(|status| TransposeError::Engine {
        stage: EngineStage::Initialize,
        status,
    })
}
