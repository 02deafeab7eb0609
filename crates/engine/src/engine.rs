use std::ffi::c_void;
use std::path::Path;
use std::time::Duration;

use crate::error::EngineError;
use crate::event::{EngineEvent, ObservedProperty};

/// Opaque identity of a running engine instance.
///
/// Only meaningful to the backend that produced it (for libmpv, the
/// `mpv_handle*`). Carried around so diagnostics and render backends can
/// tell engine instances apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineHandle(usize);

impl EngineHandle {
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// A media decoding/playback engine.
///
/// All methods take `&self`: implementations are shared between the UI
/// thread (commands) and the service's event thread (`wait_event`). Only
/// one thread may call [`MediaEngine::wait_event`] at a time.
pub trait MediaEngine: Send + Sync + 'static {
    /// Replace the current media with `path`.
    fn load(&self, path: &Path) -> Result<(), EngineError>;

    fn set_paused(&self, paused: bool) -> Result<(), EngineError>;

    /// Seek to an absolute position in seconds.
    fn seek(&self, position_secs: f64) -> Result<(), EngineError>;

    /// Volume on the engine's 0-100 scale.
    fn set_volume(&self, volume: f64) -> Result<(), EngineError>;

    fn set_muted(&self, muted: bool) -> Result<(), EngineError>;

    /// Start reporting changes of `property` through `wait_event`.
    fn observe(&self, property: ObservedProperty) -> Result<(), EngineError>;

    /// Block until the next event, `timeout` elapses (`None` waits forever)
    /// or [`MediaEngine::wakeup`] is called. Returns `None` on timeout or
    /// wakeup.
    fn wait_event(&self, timeout: Option<Duration>) -> Option<EngineEvent>;

    /// Interrupt a blocked `wait_event` from another thread.
    fn wakeup(&self);

    fn handle(&self) -> EngineHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_pointer() {
        let mut value = 7u8;
        let ptr = &mut value as *mut u8 as *mut c_void;
        let handle = EngineHandle::from_ptr(ptr);
        assert_eq!(handle.as_ptr(), ptr);
        assert!(!handle.is_null());
        assert!(EngineHandle::from_ptr(std::ptr::null_mut()).is_null());
    }
}
