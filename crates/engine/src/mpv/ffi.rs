//! Raw FFI bindings for libmpv's client and render APIs.
//!
//! libmpv is loaded dynamically at runtime via `libloading`, so the player
//! builds without mpv development headers and reports a clear error when the
//! library is missing. Only the entry points the player uses are bound.
//!
//! Reference: `mpv/client.h`, `mpv/render.h`, `mpv/render_gl.h`.

use std::ffi::{c_char, c_int, c_ulong, c_void, CStr};
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

/// `mpv_handle*` — a client connection to an mpv core.
pub type MpvHandle = *mut c_void;

/// `mpv_render_context*` — a render API context bound to one client.
pub type MpvRenderContextPtr = *mut c_void;

/// Success return code shared by every libmpv call that returns `int`.
pub const MPV_ERROR_SUCCESS: c_int = 0;

// ---------------------------------------------------------------------------
// mpv_format
// ---------------------------------------------------------------------------

/// Values of `mpv_format`. Kept as plain integers because they are also read
/// back out of engine-owned structs, where an out-of-range value must not be
/// undefined behavior.
pub mod format {
    use std::ffi::c_int;

    pub const NONE: c_int = 0;
    pub const STRING: c_int = 1;
    pub const OSD_STRING: c_int = 2;
    pub const FLAG: c_int = 3;
    pub const INT64: c_int = 4;
    pub const DOUBLE: c_int = 5;
    pub const NODE: c_int = 6;
}

// ---------------------------------------------------------------------------
// mpv_event_id
// ---------------------------------------------------------------------------

pub mod event_id {
    use std::ffi::c_int;

    pub const NONE: c_int = 0;
    pub const SHUTDOWN: c_int = 1;
    pub const LOG_MESSAGE: c_int = 2;
    pub const GET_PROPERTY_REPLY: c_int = 3;
    pub const SET_PROPERTY_REPLY: c_int = 4;
    pub const COMMAND_REPLY: c_int = 5;
    pub const START_FILE: c_int = 6;
    pub const END_FILE: c_int = 7;
    pub const FILE_LOADED: c_int = 8;
    pub const CLIENT_MESSAGE: c_int = 16;
    pub const VIDEO_RECONFIG: c_int = 17;
    pub const AUDIO_RECONFIG: c_int = 18;
    pub const SEEK: c_int = 20;
    pub const PLAYBACK_RESTART: c_int = 21;
    pub const PROPERTY_CHANGE: c_int = 22;
    pub const QUEUE_OVERFLOW: c_int = 24;
    pub const HOOK: c_int = 25;
}

// ---------------------------------------------------------------------------
// mpv_end_file_reason
// ---------------------------------------------------------------------------

pub mod end_file_reason {
    use std::ffi::c_int;

    pub const EOF: c_int = 0;
    pub const STOP: c_int = 2;
    pub const QUIT: c_int = 3;
    pub const ERROR: c_int = 4;
    pub const REDIRECT: c_int = 5;
}

// ---------------------------------------------------------------------------
// mpv_log_level
// ---------------------------------------------------------------------------

pub mod log_level {
    use std::ffi::c_int;

    pub const NONE: c_int = 0;
    pub const FATAL: c_int = 10;
    pub const ERROR: c_int = 20;
    pub const WARN: c_int = 30;
    pub const INFO: c_int = 40;
    pub const V: c_int = 50;
    pub const DEBUG: c_int = 60;
    pub const TRACE: c_int = 70;
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// `mpv_event`. Owned by the engine; valid until the next `mpv_wait_event`.
#[repr(C)]
pub struct MpvEvent {
    pub event_id: c_int,
    pub error: c_int,
    pub reply_userdata: u64,
    pub data: *mut c_void,
}

/// `mpv_event_property` — payload of `PROPERTY_CHANGE`.
#[repr(C)]
pub struct MpvEventProperty {
    pub name: *const c_char,
    pub format: c_int,
    pub data: *mut c_void,
}

/// `mpv_event_log_message` — payload of `LOG_MESSAGE`.
#[repr(C)]
pub struct MpvEventLogMessage {
    pub prefix: *const c_char,
    pub level: *const c_char,
    pub text: *const c_char,
    pub log_level: c_int,
}

/// `mpv_event_end_file` — payload of `END_FILE`.
#[repr(C)]
pub struct MpvEventEndFile {
    pub reason: c_int,
    pub error: c_int,
    pub playlist_entry_id: i64,
    pub playlist_insert_id: i64,
    pub playlist_insert_num_entries: c_int,
}

// ---------------------------------------------------------------------------
// Render API
// ---------------------------------------------------------------------------

/// Values of `mpv_render_param_type`.
pub mod render_param {
    use std::ffi::c_int;

    pub const INVALID: c_int = 0;
    pub const API_TYPE: c_int = 1;
    pub const OPENGL_INIT_PARAMS: c_int = 2;
    pub const OPENGL_FBO: c_int = 3;
    pub const FLIP_Y: c_int = 4;
    pub const DEPTH: c_int = 5;
    pub const ADVANCED_CONTROL: c_int = 10;
    pub const BLOCK_FOR_TARGET_TIME: c_int = 12;
}

/// `MPV_RENDER_API_TYPE_OPENGL`.
pub const MPV_RENDER_API_TYPE_OPENGL: &CStr = c"opengl";

/// Bit in the result of `mpv_render_context_update` signalling a new frame.
pub const MPV_RENDER_UPDATE_FRAME: u64 = 1;

/// `mpv_render_param` — one entry of a param list terminated by `INVALID`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MpvRenderParam {
    pub kind: c_int,
    pub data: *mut c_void,
}

impl MpvRenderParam {
    pub const END: Self = Self {
        kind: render_param::INVALID,
        data: std::ptr::null_mut(),
    };
}

/// GL proc-address callback handed to the engine during context creation.
pub type GetProcAddressFn = unsafe extern "C" fn(ctx: *mut c_void, name: *const c_char) -> *mut c_void;

/// Update callback invoked from an engine thread when a new frame is ready.
pub type RenderUpdateFn = unsafe extern "C" fn(ctx: *mut c_void);

/// `mpv_opengl_init_params`.
///
/// Client API 1.x had a third `extra_exts` field that 2.x dropped. It is kept
/// here and always null: 1.x reads it as "no extra extensions" and 2.x never
/// looks past the second field.
#[repr(C)]
pub struct MpvOpenGlInitParams {
    pub get_proc_address: Option<GetProcAddressFn>,
    pub get_proc_address_ctx: *mut c_void,
    pub extra_exts: *const c_char,
}

/// `mpv_opengl_fbo`. `internal_format` 0 means "unknown / default".
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MpvOpenGlFbo {
    pub fbo: c_int,
    pub w: c_int,
    pub h: c_int,
    pub internal_format: c_int,
}

// ---------------------------------------------------------------------------
// Function table
// ---------------------------------------------------------------------------

/// Dynamically loaded libmpv function table.
///
/// Holds the `Library` so every function pointer stays valid for the
/// lifetime of this struct.
pub struct MpvLibrary {
    _lib: Library,

    // -- Client API --
    pub mpv_client_api_version: unsafe extern "C" fn() -> c_ulong,
    pub mpv_error_string: unsafe extern "C" fn(error: c_int) -> *const c_char,
    pub mpv_create: unsafe extern "C" fn() -> MpvHandle,
    pub mpv_initialize: unsafe extern "C" fn(ctx: MpvHandle) -> c_int,
    pub mpv_terminate_destroy: unsafe extern "C" fn(ctx: MpvHandle),
    pub mpv_set_option_string:
        unsafe extern "C" fn(ctx: MpvHandle, name: *const c_char, data: *const c_char) -> c_int,
    pub mpv_command: unsafe extern "C" fn(ctx: MpvHandle, args: *mut *const c_char) -> c_int,
    pub mpv_set_property: unsafe extern "C" fn(
        ctx: MpvHandle,
        name: *const c_char,
        format: c_int,
        data: *mut c_void,
    ) -> c_int,
    pub mpv_observe_property: unsafe extern "C" fn(
        ctx: MpvHandle,
        reply_userdata: u64,
        name: *const c_char,
        format: c_int,
    ) -> c_int,
    pub mpv_request_log_messages:
        unsafe extern "C" fn(ctx: MpvHandle, min_level: *const c_char) -> c_int,
    pub mpv_wait_event: unsafe extern "C" fn(ctx: MpvHandle, timeout: f64) -> *mut MpvEvent,
    pub mpv_wakeup: unsafe extern "C" fn(ctx: MpvHandle),

    // -- Render API --
    pub mpv_render_context_create: unsafe extern "C" fn(
        res: *mut MpvRenderContextPtr,
        mpv: MpvHandle,
        params: *mut MpvRenderParam,
    ) -> c_int,
    pub mpv_render_context_set_update_callback: unsafe extern "C" fn(
        ctx: MpvRenderContextPtr,
        callback: Option<RenderUpdateFn>,
        callback_ctx: *mut c_void,
    ),
    pub mpv_render_context_update: unsafe extern "C" fn(ctx: MpvRenderContextPtr) -> u64,
    pub mpv_render_context_render:
        unsafe extern "C" fn(ctx: MpvRenderContextPtr, params: *mut MpvRenderParam) -> c_int,
    pub mpv_render_context_report_swap: unsafe extern "C" fn(ctx: MpvRenderContextPtr),
    pub mpv_render_context_free: unsafe extern "C" fn(ctx: MpvRenderContextPtr),
}

// SAFETY: the libmpv client API is documented as thread-safe; the render API
// functions are only called from the thread owning the GL context by the
// render bridge. The Library handle keeps the pointers valid.
unsafe impl Send for MpvLibrary {}
unsafe impl Sync for MpvLibrary {}

impl std::fmt::Debug for MpvLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpvLibrary")
            .field("api_version", &self.api_version())
            .finish()
    }
}

/// Copy a function pointer out of `lib`, naming the symbol on failure.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the symbol.
unsafe fn symbol<T: Copy>(lib: &Library, name: &'static [u8]) -> Result<T, MpvLoadError> {
    lib.get::<T>(name).map(|sym| *sym).map_err(|e| {
        let printable = name.strip_suffix(b"\0").unwrap_or(name);
        MpvLoadError::SymbolNotFound(format!("{}: {e}", String::from_utf8_lossy(printable)))
    })
}

impl MpvLibrary {
    /// Load libmpv from the platform's default library search path, trying
    /// each known soname in turn.
    pub fn load() -> Result<Self, MpvLoadError> {
        let mut failures = Vec::new();
        for name in Self::library_names() {
            // SAFETY: loading libmpv runs no initialization that depends on
            // caller state; its constructors only register internal tables.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    info!(library = %name, "Loaded libmpv");
                    return Self::from_library(lib);
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }
        Err(MpvLoadError::LibraryNotFound(format!(
            "{}. Is mpv installed?",
            failures.join("; ")
        )))
    }

    /// Load from a specific path (non-standard installs, bundled builds).
    pub fn load_from(path: &Path) -> Result<Self, MpvLoadError> {
        info!(path = %path.display(), "Loading libmpv from custom path");

        // SAFETY: the caller asserts this path is a libmpv build.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            MpvLoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display()))
        })?;
        Self::from_library(lib)
    }

    fn from_library(lib: Library) -> Result<Self, MpvLoadError> {
        // SAFETY: every signature below matches mpv/client.h and
        // mpv/render.h. Symbols are copied out before `lib` moves into the
        // struct, which keeps the library mapped for their whole lifetime.
        unsafe {
            let table = Self {
                mpv_client_api_version: symbol(&lib, b"mpv_client_api_version\0")?,
                mpv_error_string: symbol(&lib, b"mpv_error_string\0")?,
                mpv_create: symbol(&lib, b"mpv_create\0")?,
                mpv_initialize: symbol(&lib, b"mpv_initialize\0")?,
                mpv_terminate_destroy: symbol(&lib, b"mpv_terminate_destroy\0")?,
                mpv_set_option_string: symbol(&lib, b"mpv_set_option_string\0")?,
                mpv_command: symbol(&lib, b"mpv_command\0")?,
                mpv_set_property: symbol(&lib, b"mpv_set_property\0")?,
                mpv_observe_property: symbol(&lib, b"mpv_observe_property\0")?,
                mpv_request_log_messages: symbol(&lib, b"mpv_request_log_messages\0")?,
                mpv_wait_event: symbol(&lib, b"mpv_wait_event\0")?,
                mpv_wakeup: symbol(&lib, b"mpv_wakeup\0")?,
                mpv_render_context_create: symbol(&lib, b"mpv_render_context_create\0")?,
                mpv_render_context_set_update_callback: symbol(
                    &lib,
                    b"mpv_render_context_set_update_callback\0",
                )?,
                mpv_render_context_update: symbol(&lib, b"mpv_render_context_update\0")?,
                mpv_render_context_render: symbol(&lib, b"mpv_render_context_render\0")?,
                mpv_render_context_report_swap: symbol(
                    &lib,
                    b"mpv_render_context_report_swap\0",
                )?,
                mpv_render_context_free: symbol(&lib, b"mpv_render_context_free\0")?,
                _lib: lib,
            };

            let (major, minor) = table.api_version();
            debug!(major, minor, "All libmpv symbols loaded");
            Ok(table)
        }
    }

    /// Client API version as `(major, minor)`.
    pub fn api_version(&self) -> (u32, u32) {
        // SAFETY: no arguments, no preconditions.
        let raw = unsafe { (self.mpv_client_api_version)() } as u64;
        ((raw >> 16) as u32, (raw & 0xffff) as u32)
    }

    /// Human-readable text for a libmpv error code.
    pub fn error_string(&self, code: c_int) -> String {
        // SAFETY: mpv_error_string returns a static string for any input.
        let ptr = unsafe { (self.mpv_error_string)(code) };
        if ptr.is_null() {
            return format!("unknown error {code}");
        }
        // SAFETY: non-null, NUL-terminated, static lifetime.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    /// Platform-specific library filenames, most preferred first.
    pub fn library_names() -> &'static [&'static str] {
        if cfg!(target_os = "windows") {
            &["libmpv-2.dll", "mpv-2.dll", "mpv-1.dll"]
        } else if cfg!(target_os = "macos") {
            &["libmpv.2.dylib", "libmpv.dylib"]
        } else {
            &["libmpv.so.2", "libmpv.so.1", "libmpv.so"]
        }
    }
}

// ---------------------------------------------------------------------------
// Error type for library loading
// ---------------------------------------------------------------------------

/// Errors that can occur when loading libmpv.
#[derive(Debug, thiserror::Error)]
pub enum MpvLoadError {
    #[error("libmpv not found: {0}")]
    LibraryNotFound(String),

    #[error("Required libmpv symbol not found: {0}")]
    SymbolNotFound(String),
}

/// Read a possibly-null C string owned by the engine.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
pub unsafe fn lossy_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn library_names_are_platform_specific() {
        let names = MpvLibrary::library_names();
        assert!(!names.is_empty());
        if cfg!(target_os = "linux") {
            assert_eq!(names[0], "libmpv.so.2");
        }
    }

    #[test]
    fn loading_a_missing_path_reports_library_not_found() {
        let err = MpvLibrary::load_from(Path::new("/definitely/not/libmpv.so")).unwrap_err();
        assert!(matches!(err, MpvLoadError::LibraryNotFound(_)));
        assert!(err.to_string().contains("/definitely/not/libmpv.so"));
    }

    #[test]
    fn render_structs_match_c_layout() {
        assert_eq!(size_of::<MpvOpenGlFbo>(), 4 * size_of::<c_int>());
        assert_eq!(
            size_of::<MpvRenderParam>(),
            2 * size_of::<*mut c_void>().max(size_of::<c_int>())
        );
        assert_eq!(MpvRenderParam::END.kind, render_param::INVALID);
        assert!(MpvRenderParam::END.data.is_null());
    }

    #[test]
    fn lossy_string_handles_null() {
        // SAFETY: null is explicitly allowed.
        assert_eq!(unsafe { lossy_string(std::ptr::null()) }, "");
        let text = c"hello";
        // SAFETY: `text` is a valid C string literal.
        assert_eq!(unsafe { lossy_string(text.as_ptr()) }, "hello");
    }
}
