//! Safe wrapper around an `mpv_handle` with RAII teardown.

use std::ffi::{c_int, c_void, CString};
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::ffi::{
    end_file_reason, event_id, format, log_level, lossy_string, MpvEvent, MpvEventEndFile,
    MpvEventLogMessage, MpvEventProperty, MpvHandle, MpvLibrary, MPV_ERROR_SUCCESS,
};
use crate::engine::{EngineHandle, MediaEngine};
use crate::error::EngineError;
use crate::event::{
    EndReason, EngineEvent, EngineLogLevel, ObservedProperty, PropertyFormat, PropertyValue,
};

/// Option the render API requires: frames go to the client, not a window.
const VIDEO_OUTPUT: (&str, &str) = ("vo", "libmpv");

/// Lowest engine log level forwarded to `tracing`.
const LOG_THRESHOLD: &str = "warn";

/// A running libmpv core.
///
/// # Thread Safety
///
/// The client API is thread-safe, so commands may be issued from any thread.
/// `wait_event` must only be called from one thread at a time; the playback
/// service dedicates its event thread to it.
pub struct MpvEngine {
    lib: Arc<MpvLibrary>,
    handle: MpvHandle,
}

// SAFETY: libmpv documents every client API function as thread-safe. The
// handle is only destroyed in Drop, when no other reference exists.
unsafe impl Send for MpvEngine {}
unsafe impl Sync for MpvEngine {}

impl std::fmt::Debug for MpvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpvEngine")
            .field("handle", &EngineHandle::from_ptr(self.handle))
            .finish()
    }
}

impl MpvEngine {
    /// Create and initialize an mpv core.
    ///
    /// `options` are applied with `mpv_set_option_string` before
    /// initialization, after the mandatory `vo=libmpv`. A failing option is
    /// fatal so that typos in the config surface immediately.
    pub fn new(lib: Arc<MpvLibrary>, options: &[(String, String)]) -> Result<Self, EngineError> {
        // SAFETY: mpv_create has no preconditions.
        let handle = unsafe { (lib.mpv_create)() };
        if handle.is_null() {
            return Err(EngineError::CreateFailed);
        }

        // From here on Drop owns the handle, including on early return.
        let engine = Self { lib, handle };

        engine.set_option(VIDEO_OUTPUT.0, VIDEO_OUTPUT.1)?;
        for (name, value) in options {
            engine.set_option(name, value)?;
        }

        // SAFETY: handle is valid and not yet initialized.
        let code = unsafe { (engine.lib.mpv_initialize)(engine.handle) };
        engine.check(code, "mpv_initialize")?;

        let threshold = to_cstring(LOG_THRESHOLD)?;
        // SAFETY: handle is valid; threshold is a NUL-terminated string.
        let code = unsafe { (engine.lib.mpv_request_log_messages)(engine.handle, threshold.as_ptr()) };
        engine.check(code, "mpv_request_log_messages")?;

        let (major, minor) = engine.lib.api_version();
        info!(
            handle = %EngineHandle::from_ptr(engine.handle),
            api = format_args!("{major}.{minor}"),
            options = options.len(),
            "mpv core initialized"
        );
        Ok(engine)
    }

    /// The loaded library, shared with render contexts created on this core.
    pub fn library(&self) -> &Arc<MpvLibrary> {
        &self.lib
    }

    /// Raw `mpv_handle*` for the render API.
    pub fn raw_handle(&self) -> MpvHandle {
        self.handle
    }

    fn set_option(&self, name: &str, value: &str) -> Result<(), EngineError> {
        let c_name = to_cstring(name)?;
        let c_value = to_cstring(value)?;
        // SAFETY: both strings outlive the call; handle is valid.
        let code =
            unsafe { (self.lib.mpv_set_option_string)(self.handle, c_name.as_ptr(), c_value.as_ptr()) };
        debug!(option = name, value, code, "mpv option");
        self.check(code, "mpv_set_option_string")
    }

    fn command(&self, args: &[&str]) -> Result<(), EngineError> {
        let owned = args
            .iter()
            .map(|arg| to_cstring(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv: Vec<*const std::ffi::c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        argv.push(ptr::null());

        // SAFETY: argv is NULL-terminated and every entry points into `owned`,
        // which outlives the call.
        let code = unsafe { (self.lib.mpv_command)(self.handle, argv.as_mut_ptr()) };
        self.check(code, "mpv_command")
    }

    fn set_flag(&self, name: &str, value: bool) -> Result<(), EngineError> {
        let c_name = to_cstring(name)?;
        let mut flag: c_int = value.into();
        // SAFETY: FLAG properties take a pointer to int.
        let code = unsafe {
            (self.lib.mpv_set_property)(
                self.handle,
                c_name.as_ptr(),
                format::FLAG,
                &mut flag as *mut c_int as *mut c_void,
            )
        };
        self.check(code, "mpv_set_property")
    }

    fn set_double(&self, name: &str, value: f64) -> Result<(), EngineError> {
        let c_name = to_cstring(name)?;
        let mut number = value;
        // SAFETY: DOUBLE properties take a pointer to double.
        let code = unsafe {
            (self.lib.mpv_set_property)(
                self.handle,
                c_name.as_ptr(),
                format::DOUBLE,
                &mut number as *mut f64 as *mut c_void,
            )
        };
        self.check(code, "mpv_set_property")
    }

    fn check(&self, code: c_int, call: &'static str) -> Result<(), EngineError> {
        if code >= MPV_ERROR_SUCCESS {
            Ok(())
        } else {
            Err(EngineError::Api {
                call,
                code,
                message: self.lib.error_string(code),
            })
        }
    }
}

impl MediaEngine for MpvEngine {
    fn load(&self, path: &Path) -> Result<(), EngineError> {
        let path = path.to_string_lossy();
        info!(path = %path, "mpv: loadfile");
        self.command(&["loadfile", &*path, "replace"])
    }

    fn set_paused(&self, paused: bool) -> Result<(), EngineError> {
        self.set_flag("pause", paused)
    }

    fn seek(&self, position_secs: f64) -> Result<(), EngineError> {
        let target = format!("{position_secs:.3}");
        self.command(&["seek", target.as_str(), "absolute"])
    }

    fn set_volume(&self, volume: f64) -> Result<(), EngineError> {
        self.set_double("volume", volume)
    }

    fn set_muted(&self, muted: bool) -> Result<(), EngineError> {
        self.set_flag("mute", muted)
    }

    fn observe(&self, property: ObservedProperty) -> Result<(), EngineError> {
        let c_name = to_cstring(property.name())?;
        let fmt = match property.format() {
            PropertyFormat::Double => format::DOUBLE,
            PropertyFormat::Flag => format::FLAG,
        };
        // SAFETY: handle is valid; the name is copied by libmpv.
        let code = unsafe {
            (self.lib.mpv_observe_property)(self.handle, property.userdata(), c_name.as_ptr(), fmt)
        };
        self.check(code, "mpv_observe_property")
    }

    fn wait_event(&self, timeout: Option<Duration>) -> Option<EngineEvent> {
        let timeout = timeout.map_or(-1.0, |t| t.as_secs_f64());
        // SAFETY: handle is valid; only the service's event thread calls this.
        let event = unsafe { (self.lib.mpv_wait_event)(self.handle, timeout) };
        if event.is_null() {
            return None;
        }
        // SAFETY: non-null events stay valid until the next mpv_wait_event,
        // and translate copies everything it needs.
        unsafe { translate_event(&*event) }
    }

    fn wakeup(&self) {
        // SAFETY: mpv_wakeup may be called from any thread.
        unsafe { (self.lib.mpv_wakeup)(self.handle) }
    }

    fn handle(&self) -> EngineHandle {
        EngineHandle::from_ptr(self.handle)
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            debug!(handle = %EngineHandle::from_ptr(self.handle), "Destroying mpv core");
            // SAFETY: handle came from mpv_create and nothing else references
            // it: render contexts and the event thread each hold an Arc to
            // this engine, so they are gone by now.
            unsafe { (self.lib.mpv_terminate_destroy)(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

// ---------------------------------------------------------------------------
// Event translation
// ---------------------------------------------------------------------------

/// Copy an engine-owned event into an owned [`EngineEvent`].
///
/// # Safety
///
/// `event.data` must point to the payload struct matching `event.event_id`,
/// as libmpv guarantees.
unsafe fn translate_event(event: &MpvEvent) -> Option<EngineEvent> {
    match event.event_id {
        event_id::NONE => None,
        event_id::SHUTDOWN => Some(EngineEvent::Shutdown),
        event_id::FILE_LOADED => Some(EngineEvent::FileLoaded),
        event_id::PROPERTY_CHANGE => {
            let payload = &*(event.data as *const MpvEventProperty);
            let Some(property) = ObservedProperty::from_userdata(event.reply_userdata) else {
                warn!(
                    name = %lossy_string(payload.name),
                    token = event.reply_userdata,
                    "Change for a property nobody observes"
                );
                return Some(EngineEvent::Other(event.event_id));
            };
            let value = match payload.format {
                format::DOUBLE if !payload.data.is_null() => {
                    PropertyValue::Double(*(payload.data as *const f64))
                }
                format::FLAG if !payload.data.is_null() => {
                    PropertyValue::Flag(*(payload.data as *const c_int) != 0)
                }
                _ => PropertyValue::Unavailable,
            };
            Some(EngineEvent::PropertyChanged { property, value })
        }
        event_id::END_FILE => {
            let payload = &*(event.data as *const MpvEventEndFile);
            Some(EngineEvent::EndFile(end_reason(payload.reason, payload.error)))
        }
        event_id::LOG_MESSAGE => {
            let payload = &*(event.data as *const MpvEventLogMessage);
            Some(EngineEvent::Log {
                level: engine_log_level(payload.log_level),
                prefix: lossy_string(payload.prefix),
                text: lossy_string(payload.text).trim_end().to_string(),
            })
        }
        other => Some(EngineEvent::Other(other)),
    }
}

fn end_reason(reason: c_int, error: c_int) -> EndReason {
    match reason {
        end_file_reason::EOF => EndReason::Eof,
        end_file_reason::STOP => EndReason::Stop,
        end_file_reason::QUIT => EndReason::Quit,
        end_file_reason::ERROR => EndReason::Error(error),
        end_file_reason::REDIRECT => EndReason::Redirect,
        other => EndReason::Unknown(other),
    }
}

fn engine_log_level(level: c_int) -> EngineLogLevel {
    match level {
        l if l <= log_level::FATAL => EngineLogLevel::Fatal,
        l if l <= log_level::ERROR => EngineLogLevel::Error,
        l if l <= log_level::WARN => EngineLogLevel::Warn,
        l if l <= log_level::INFO => EngineLogLevel::Info,
        l if l <= log_level::V => EngineLogLevel::Verbose,
        l if l <= log_level::DEBUG => EngineLogLevel::Debug,
        _ => EngineLogLevel::Trace,
    }
}

fn to_cstring(value: &str) -> Result<CString, EngineError> {
    CString::new(value).map_err(|_| EngineError::InteriorNul(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn end_reasons_map() {
        assert_eq!(end_reason(end_file_reason::EOF, 0), EndReason::Eof);
        assert_eq!(end_reason(end_file_reason::STOP, 0), EndReason::Stop);
        assert_eq!(end_reason(end_file_reason::ERROR, -13), EndReason::Error(-13));
        assert_eq!(end_reason(42, 0), EndReason::Unknown(42));
    }

    #[test]
    fn log_levels_map() {
        assert_eq!(engine_log_level(log_level::FATAL), EngineLogLevel::Fatal);
        assert_eq!(engine_log_level(log_level::WARN), EngineLogLevel::Warn);
        assert_eq!(engine_log_level(log_level::TRACE), EngineLogLevel::Trace);
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            to_cstring("bad\0name"),
            Err(EngineError::InteriorNul(_))
        ));
    }

    #[test]
    fn translates_property_change() {
        let mut position = 12.5f64;
        let name = c"time-pos";
        let mut payload = MpvEventProperty {
            name: name.as_ptr(),
            format: format::DOUBLE,
            data: &mut position as *mut f64 as *mut c_void,
        };
        let event = MpvEvent {
            event_id: event_id::PROPERTY_CHANGE,
            error: 0,
            reply_userdata: ObservedProperty::Position.userdata(),
            data: &mut payload as *mut MpvEventProperty as *mut c_void,
        };

        // SAFETY: payload matches the event id.
        let translated = unsafe { translate_event(&event) };
        assert_eq!(
            translated,
            Some(EngineEvent::PropertyChanged {
                property: ObservedProperty::Position,
                value: PropertyValue::Double(12.5),
            })
        );
    }

    #[test]
    fn missing_property_value_is_unavailable() {
        let name = c"duration";
        let mut payload = MpvEventProperty {
            name: name.as_ptr(),
            format: format::NONE,
            data: ptr::null_mut(),
        };
        let event = MpvEvent {
            event_id: event_id::PROPERTY_CHANGE,
            error: 0,
            reply_userdata: ObservedProperty::Duration.userdata(),
            data: &mut payload as *mut MpvEventProperty as *mut c_void,
        };

        // SAFETY: payload matches the event id.
        let translated = unsafe { translate_event(&event) };
        assert_eq!(
            translated,
            Some(EngineEvent::PropertyChanged {
                property: ObservedProperty::Duration,
                value: PropertyValue::Unavailable,
            })
        );
    }

    #[test]
    fn translates_log_message() {
        let prefix: &CStr = c"cplayer";
        let level: &CStr = c"warn";
        let text: &CStr = c"audio device underrun\n";
        let mut payload = MpvEventLogMessage {
            prefix: prefix.as_ptr(),
            level: level.as_ptr(),
            text: text.as_ptr(),
            log_level: log_level::WARN,
        };
        let event = MpvEvent {
            event_id: event_id::LOG_MESSAGE,
            error: 0,
            reply_userdata: 0,
            data: &mut payload as *mut MpvEventLogMessage as *mut c_void,
        };

        // SAFETY: payload matches the event id.
        let translated = unsafe { translate_event(&event) };
        assert_eq!(
            translated,
            Some(EngineEvent::Log {
                level: EngineLogLevel::Warn,
                prefix: "cplayer".into(),
                text: "audio device underrun".into(),
            })
        );
    }

    #[test]
    fn none_event_is_timeout() {
        let event = MpvEvent {
            event_id: event_id::NONE,
            error: 0,
            reply_userdata: 0,
            data: ptr::null_mut(),
        };
        // SAFETY: NONE carries no payload.
        assert_eq!(unsafe { translate_event(&event) }, None);
    }
}
