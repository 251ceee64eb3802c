//! Device stream capability.

use std::fmt;

/// Native handle of a device command queue.
///
/// `StreamHandle::DEFAULT` (0) is the default stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamHandle(pub usize);

impl StreamHandle {
    pub const DEFAULT: StreamHandle = StreamHandle(0);

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A value that can name a device stream.
///
/// Returns `None` when the value is not a stream the engine understands
/// (for example a stream from a different runtime, or one already
/// destroyed).
pub trait DeviceStream: fmt::Debug {
    fn native_handle(&self) -> Option<StreamHandle>;
}

impl DeviceStream for StreamHandle {
    fn native_handle(&self) -> Option<StreamHandle> {
        Some(*self)
    }
}
