//! libmpv render-API backend.
//!
//! `mpv_render_context_create` resolves GL entry points through a C callback
//! that receives the [`ProcAddressResolver`] as its context pointer; libmpv
//! only calls it during creation, so the resolver is borrowed for that call
//! alone. The frame-ready callback is boxed and owned by [`MpvRenderApi`],
//! which clears it with libmpv before freeing the box.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;
use std::sync::Arc;

use tracing::{debug, error, info, trace};

use lm_engine::mpv::ffi::{
    render_param, GetProcAddressFn, MpvLibrary, MpvOpenGlFbo, MpvOpenGlInitParams,
    MpvRenderContextPtr, MpvRenderParam, MPV_ERROR_SUCCESS, MPV_RENDER_API_TYPE_OPENGL,
    MPV_RENDER_UPDATE_FRAME,
};
use lm_engine::{EngineHandle, MediaEngine, MpvEngine};

use crate::backend::{FrameReadyCallback, RenderApi, RenderBackend, RenderOutcome, SkipReason};
use crate::error::BridgeError;
use crate::proc_address::ProcAddressResolver;
use crate::target::FrameTarget;

// ---------------------------------------------------------------------------
// C callbacks
// ---------------------------------------------------------------------------

/// `get_proc_address` for `mpv_opengl_init_params`.
///
/// # Safety
///
/// `ctx` must point to a live `ProcAddressResolver` not otherwise borrowed
/// for the duration of the call; `name` must be a NUL-terminated string.
unsafe extern "C" fn get_proc_address(ctx: *mut c_void, name: *const c_char) -> *mut c_void {
    if ctx.is_null() || name.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: ctx is the resolver passed to mpv_render_context_create, which
    // only invokes this callback before it returns.
    let resolver = &mut *(ctx as *mut ProcAddressResolver<'_>);
    // SAFETY: libmpv passes GL function names as C strings.
    let name = CStr::from_ptr(name);
    resolver.resolve(name) as *mut c_void
}

/// Update callback trampoline. Runs on an mpv thread.
///
/// # Safety
///
/// `ctx` must point to the `FrameReadyCallback` boxed in `MpvRenderApi`.
unsafe extern "C" fn on_render_update(ctx: *mut c_void) {
    if ctx.is_null() {
        return;
    }
    // SAFETY: the box is only freed after mpv_render_context_set_update_callback
    // has cleared this callback, and libmpv guarantees no invocation is in
    // flight once that call returns.
    let callback = &*(ctx as *const FrameReadyCallback);
    callback();
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Creates OpenGL render contexts on an [`MpvEngine`].
#[derive(Clone, Debug)]
pub struct MpvRenderBackend {
    engine: Arc<MpvEngine>,
}

impl MpvRenderBackend {
    pub fn new(engine: Arc<MpvEngine>) -> Self {
        Self { engine }
    }
}

impl RenderBackend for MpvRenderBackend {
    type Api = MpvRenderApi;

    fn engine_handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    fn create(&self, resolver: &mut ProcAddressResolver<'_>) -> Result<MpvRenderApi, BridgeError> {
        let lib = Arc::clone(self.engine.library());

        let mut init_params = MpvOpenGlInitParams {
            get_proc_address: Some(get_proc_address as GetProcAddressFn),
            get_proc_address_ctx: &mut *resolver as *mut ProcAddressResolver<'_> as *mut c_void,
            extra_exts: ptr::null(),
        };
        let mut params = [
            MpvRenderParam {
                kind: render_param::API_TYPE,
                data: MPV_RENDER_API_TYPE_OPENGL.as_ptr() as *mut c_void,
            },
            MpvRenderParam {
                kind: render_param::OPENGL_INIT_PARAMS,
                data: &mut init_params as *mut MpvOpenGlInitParams as *mut c_void,
            },
            MpvRenderParam::END,
        ];

        let mut ctx: MpvRenderContextPtr = ptr::null_mut();
        // SAFETY: the param list is END-terminated and every pointer in it
        // outlives the call. The engine handle is valid while `engine` lives,
        // and MpvRenderApi keeps it alive for as long as the context exists.
        let code = unsafe {
            (lib.mpv_render_context_create)(&mut ctx, self.engine.raw_handle(), params.as_mut_ptr())
        };
        if code < MPV_ERROR_SUCCESS || ctx.is_null() {
            let message = lib.error_string(code);
            error!(code, message = %message, "mpv_render_context_create failed");
            return Err(BridgeError::Create { code, message });
        }

        info!(
            engine = %self.engine.handle(),
            lookups = resolver.lookups(),
            misses = resolver.misses(),
            "mpv render context created"
        );

        Ok(MpvRenderApi {
            lib,
            engine: Arc::clone(&self.engine),
            ctx,
            callback: None,
            frame_seen: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Render API
// ---------------------------------------------------------------------------

/// A live `mpv_render_context`.
pub struct MpvRenderApi {
    lib: Arc<MpvLibrary>,
    /// Held so the core outlives the render context.
    engine: Arc<MpvEngine>,
    ctx: MpvRenderContextPtr,
    /// Boxed so its address stays fixed while libmpv holds it.
    callback: Option<Box<FrameReadyCallback>>,
    frame_seen: bool,
}

// SAFETY: the render context is only used from the thread owning the bound
// GL context; the wrapper moves between threads only inside the Mutex that
// egui paint callbacks require, never concurrently.
unsafe impl Send for MpvRenderApi {}

impl std::fmt::Debug for MpvRenderApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpvRenderApi")
            .field("engine", &self.engine.handle())
            .field("ctx", &self.ctx)
            .field("frame_seen", &self.frame_seen)
            .finish()
    }
}

impl MpvRenderApi {
    fn clear_callback(&mut self) {
        // SAFETY: ctx is valid until Drop. After this returns libmpv no longer
        // references the boxed callback.
        unsafe {
            (self.lib.mpv_render_context_set_update_callback)(self.ctx, None, ptr::null_mut());
        }
        self.callback = None;
    }
}

impl RenderApi for MpvRenderApi {
    fn render(&mut self, target: &FrameTarget, flip_y: bool) -> Result<RenderOutcome, BridgeError> {
        // SAFETY: ctx is valid; called on the GL thread.
        let flags = unsafe { (self.lib.mpv_render_context_update)(self.ctx) };
        if flags & MPV_RENDER_UPDATE_FRAME != 0 {
            self.frame_seen = true;
        }
        if !self.frame_seen {
            trace!("No frame from mpv yet");
            return Ok(RenderOutcome::Skipped(SkipReason::NoFrame));
        }

        let mut fbo = MpvOpenGlFbo {
            fbo: target.target_id as c_int,
            w: target.size.width.min(c_int::MAX as u32) as c_int,
            h: target.size.height.min(c_int::MAX as u32) as c_int,
            internal_format: 0,
        };
        let mut flip: c_int = flip_y.into();
        let mut params = [
            MpvRenderParam {
                kind: render_param::OPENGL_FBO,
                data: &mut fbo as *mut MpvOpenGlFbo as *mut c_void,
            },
            MpvRenderParam {
                kind: render_param::FLIP_Y,
                data: &mut flip as *mut c_int as *mut c_void,
            },
            MpvRenderParam::END,
        ];

        // SAFETY: params is END-terminated and outlives the call; the target
        // FBO belongs to the GL context current on this thread.
        let code = unsafe { (self.lib.mpv_render_context_render)(self.ctx, params.as_mut_ptr()) };
        if code < MPV_ERROR_SUCCESS {
            return Err(BridgeError::Render {
                code,
                message: self.lib.error_string(code),
            });
        }

        // SAFETY: ctx is valid.
        unsafe { (self.lib.mpv_render_context_report_swap)(self.ctx) };
        Ok(RenderOutcome::Rendered)
    }

    fn set_update_callback(&mut self, callback: Option<FrameReadyCallback>) {
        // Clear first so the old box is unreachable before it is dropped.
        self.clear_callback();

        let Some(callback) = callback else {
            return;
        };
        let boxed = Box::new(callback);
        let raw = &*boxed as *const FrameReadyCallback as *mut c_void;
        // SAFETY: `raw` points into `boxed`, which is stored in self and only
        // dropped after clear_callback.
        unsafe {
            (self.lib.mpv_render_context_set_update_callback)(self.ctx, Some(on_render_update), raw);
        }
        self.callback = Some(boxed);
    }
}

impl Drop for MpvRenderApi {
    fn drop(&mut self) {
        self.clear_callback();
        // SAFETY: ctx came from mpv_render_context_create and is freed once.
        // The engine Arc is still held, so the core is alive.
        unsafe { (self.lib.mpv_render_context_free)(self.ctx) };
        self.ctx = ptr::null_mut();
        debug!(engine = %self.engine.handle(), "mpv render context freed");
    }
}
