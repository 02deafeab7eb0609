//! GL video surface: the host side of the render bridge.
//!
//! The engine renders into an offscreen framebuffer sized to the video
//! rectangle in physical pixels. That framebuffer is then blitted into
//! egui's target inside a paint callback, so the engine never draws over
//! the rest of the window.
//!
//! All GL work happens on the UI thread: the render context is bound in
//! eframe's creation callback, rendered in paint callbacks and released in
//! `on_exit`. The `Mutex` only exists because egui requires paint callbacks
//! to be `Send + Sync`.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use eframe::egui_glow;
use eframe::glow::{self, HasContext};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use lm_common::PhysicalSize;
use lm_engine::MpvEngine;
use lm_render_bridge::{
    BridgeError, DebugChannel, DebugMessage, DebugProbe, DebugSeverity, DebugSink, FrameReadyCallback,
    FrameTarget, FramebufferQuery, GlContextId, GlHost, MpvRenderApi, MpvRenderBackend,
    ProcAddressResolver, RenderApi, RenderContext, RenderOutcome, RenderStats,
};

// ---------------------------------------------------------------------------
// Host GL access
// ---------------------------------------------------------------------------

/// eframe's GL loader, valid inside the app creation callback.
///
/// eframe makes its painter context current before running the creation
/// callback and keeps it current on the UI thread, so that context is the
/// current one for as long as this host exists.
struct EframeGlHost<'a> {
    context: GlContextId,
    loader: &'a dyn Fn(&CStr) -> *const c_void,
}

impl GlHost for EframeGlHost<'_> {
    fn current_context(&self) -> Option<GlContextId> {
        Some(self.context)
    }

    fn proc_address(&self, name: &CStr) -> usize {
        (self.loader)(name) as usize
    }
}

struct GlowFramebuffer<'a>(&'a glow::Context);

impl FramebufferQuery for GlowFramebuffer<'_> {
    fn bound_framebuffer(&self) -> u32 {
        // SAFETY: plain state query on the current context.
        unsafe { self.0.get_parameter_i32(glow::FRAMEBUFFER_BINDING) as u32 }
    }

    fn framebuffer_status(&self) -> u32 {
        // SAFETY: plain state query on the current context.
        unsafe { self.0.check_framebuffer_status(glow::FRAMEBUFFER) }
    }
}

/// Debug-message channel on a dedicated glow handle for the same context.
/// egui only exposes its own handle shared, and installing the callback
/// needs exclusive access.
struct GlowDebugChannel {
    gl: glow::Context,
}

impl GlowDebugChannel {
    fn new(loader: &dyn Fn(&CStr) -> *const c_void) -> Self {
        // SAFETY: the loader resolves against the current context, which is
        // the one this handle will be used with.
        let gl = unsafe { glow::Context::from_loader_function_cstr(|name| loader(name)) };
        Self { gl }
    }

    fn disable(&self) {
        // SAFETY: called on the UI thread with the context current.
        unsafe { self.gl.disable(glow::DEBUG_OUTPUT) };
    }
}

impl DebugChannel for GlowDebugChannel {
    fn has_extension(&self, name: &str) -> bool {
        self.gl.supported_extensions().contains(name)
    }

    fn install(&mut self, sink: Arc<dyn DebugSink>) {
        // SAFETY: GL_KHR_debug is present (checked by the probe); the
        // callback only forwards to the sink.
        unsafe {
            self.gl.enable(glow::DEBUG_OUTPUT);
            self.gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
            self.gl
                .debug_message_callback(move |source, category, id, severity, text| {
                    sink.message(&DebugMessage {
                        source,
                        category,
                        severity: DebugSeverity::from_gl(severity),
                        id,
                        text: text.to_string(),
                    });
                });
        }
    }
}

// ---------------------------------------------------------------------------
// Offscreen target
// ---------------------------------------------------------------------------

struct OffscreenTarget {
    fbo: glow::Framebuffer,
    texture: glow::Texture,
    size: PhysicalSize,
}

impl OffscreenTarget {
    fn create(gl: &glow::Context, size: PhysicalSize) -> Result<Self, String> {
        // SAFETY: UI thread, context current. Bindings are restored to none
        // (texture) or left for the caller to rebind (framebuffer).
        unsafe {
            let texture = gl.create_texture()?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                size.width as i32,
                size.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);

            let fbo = match gl.create_framebuffer() {
                Ok(fbo) => fbo,
                Err(e) => {
                    gl.delete_texture(texture);
                    return Err(e);
                }
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            debug!(size = %size, "Offscreen video target allocated");
            Ok(Self { fbo, texture, size })
        }
    }

    fn id(&self) -> u32 {
        self.fbo.0.get()
    }

    fn destroy(self, gl: &glow::Context) {
        // SAFETY: both objects were created on this context.
        unsafe {
            gl.delete_framebuffer(self.fbo);
            gl.delete_texture(self.texture);
        }
    }
}

// ---------------------------------------------------------------------------
// Surface state (shared with paint callbacks)
// ---------------------------------------------------------------------------

struct SurfaceState {
    render: RenderContext<MpvRenderApi>,
    target: Option<OffscreenTarget>,
    /// Targets replaced on resize, deleted on the next paint.
    retired: Vec<OffscreenTarget>,
    probe: Option<DebugProbe>,
    allocation: AllocationGate,
    has_frame: bool,
    last_error: Option<String>,
}

impl SurfaceState {
    fn paint(&mut self, info: &egui::PaintCallbackInfo, painter: &egui_glow::Painter) {
        let gl = painter.gl();
        for old in self.retired.drain(..) {
            old.destroy(gl);
        }

        let viewport = info.viewport_in_pixels();
        let size = PhysicalSize::new(viewport.width_px.max(0) as u32, viewport.height_px.max(0) as u32);

        if size.is_empty() || !self.render.is_bound() {
            // Nothing to draw into, or nothing to draw with. The context
            // reports the skip so it is counted.
            let result = self
                .render
                .render_frame(&FrameTarget::new(0, size, info.pixels_per_point), true);
            self.record(result);
            return;
        }

        let Some(target) = self.ensure_target(gl, size) else {
            return;
        };
        let frame_target = FrameTarget::new(target.id(), size, info.pixels_per_point);
        let fbo = target.fbo;

        let result = render_checked(
            &mut self.render,
            self.probe.as_ref(),
            &GlowFramebuffer(gl),
            &frame_target,
        );
        self.record(result);

        if self.has_frame {
            blit(gl, fbo, painter.intermediate_fbo(), size, &viewport);
        }
        // SAFETY: hand egui back its own framebuffer.
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, painter.intermediate_fbo()) };
    }

    fn record(&mut self, result: Result<RenderOutcome, BridgeError>) {
        match result {
            Ok(RenderOutcome::Rendered) => self.has_frame = true,
            Ok(RenderOutcome::Skipped(reason)) => trace!(?reason, "Video frame skipped"),
            Err(e) => {
                warn!(error = %e, "Video render failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn ensure_target(&mut self, gl: &glow::Context, size: PhysicalSize) -> Option<&OffscreenTarget> {
        if self.target.as_ref().is_some_and(|t| t.size == size) {
            // SAFETY: bind our target for the engine.
            unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, self.target.as_ref().map(|t| t.fbo)) };
            return self.target.as_ref();
        }
        if !self.allocation.should_try(size) {
            return None;
        }

        if let Some(old) = self.target.take() {
            self.retired.push(old);
        }
        match OffscreenTarget::create(gl, size) {
            Ok(target) => {
                if let Some(probe) = &self.probe {
                    probe.check_framebuffer(&GlowFramebuffer(gl), "video target");
                }
                self.allocation.succeeded();
                self.has_frame = false;
                self.target = Some(target);
                self.target.as_ref()
            }
            Err(e) => {
                error!(error = %e, size = %size, "Failed to allocate video target");
                self.allocation.failed(size);
                self.last_error = Some(format!("video target: {e}"));
                None
            }
        }
    }
}

/// Render one frame. With a probe attached, the bound framebuffer is checked
/// before and after the engine draws.
fn render_checked<A: RenderApi>(
    render: &mut RenderContext<A>,
    probe: Option<&DebugProbe>,
    framebuffer: &dyn FramebufferQuery,
    target: &FrameTarget,
) -> Result<RenderOutcome, BridgeError> {
    if let Some(probe) = probe {
        probe.check_framebuffer(framebuffer, "before render");
    }
    let result = render.render_frame(target, true);
    if let Some(probe) = probe {
        probe.check_framebuffer(framebuffer, "after render");
    }
    result
}

/// Remembers the size whose target failed to allocate, so it is only
/// retried once the video area changes size.
#[derive(Debug, Default)]
struct AllocationGate {
    failed: Option<PhysicalSize>,
}

impl AllocationGate {
    fn should_try(&self, size: PhysicalSize) -> bool {
        self.failed != Some(size)
    }

    fn failed(&mut self, size: PhysicalSize) {
        self.failed = Some(size);
    }

    fn succeeded(&mut self) {
        self.failed = None;
    }
}

fn blit(
    gl: &glow::Context,
    source: glow::Framebuffer,
    destination: Option<glow::Framebuffer>,
    size: PhysicalSize,
    viewport: &egui::epaint::ViewportInPixels,
) {
    let (w, h) = (size.width as i32, size.height as i32);
    // SAFETY: both framebuffers belong to the current context; egui restores
    // its own state after the callback returns.
    unsafe {
        gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(source));
        gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, destination);
        gl.blit_framebuffer(
            0,
            0,
            w,
            h,
            viewport.left_px,
            viewport.from_bottom_px,
            viewport.left_px + w,
            viewport.from_bottom_px + h,
            glow::COLOR_BUFFER_BIT,
            glow::NEAREST,
        );
    }
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// The video area of the player window.
pub struct VideoSurface {
    state: Arc<Mutex<SurfaceState>>,
    debug_channel: Option<GlowDebugChannel>,
}

impl VideoSurface {
    /// Bind the engine's render path to eframe's GL context.
    ///
    /// Must be called from the app creation callback. A failure is kept as
    /// the surface error; the player keeps running without video.
    pub fn new(cc: &eframe::CreationContext<'_>, engine: Arc<MpvEngine>, gl_debug: bool) -> Self {
        let mut render = RenderContext::new();
        let mut probe = None;
        let mut debug_channel = None;
        let mut last_error = None;

        match (cc.gl.as_ref(), cc.get_proc_address) {
            (Some(gl), Some(loader)) => {
                let host = EframeGlHost {
                    context: GlContextId(Arc::as_ptr(gl) as usize),
                    loader,
                };
                let backend = MpvRenderBackend::new(engine);
                let bound = ProcAddressResolver::bind(&host)
                    .and_then(|mut resolver| render.initialize(&backend, &mut resolver));
                if let Err(e) = bound {
                    error!(error = %e, "Video output unavailable");
                    last_error = Some(e.to_string());
                }

                if gl_debug {
                    let mut channel = GlowDebugChannel::new(loader);
                    let mut attached = DebugProbe::default();
                    if attached.attach(&mut channel) {
                        debug_channel = Some(channel);
                    }
                    probe = Some(attached);
                }
            }
            _ => {
                let message = "eframe is not running the glow renderer".to_string();
                error!("{message}");
                last_error = Some(message);
            }
        }

        info!(bound = render.is_bound(), gl_debug, "Video surface ready");

        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                render,
                target: None,
                retired: Vec::new(),
                probe,
                allocation: AllocationGate::default(),
                has_frame: false,
                last_error,
            })),
            debug_channel,
        }
    }

    /// Arm or disarm repaint requests from the engine.
    pub fn set_frame_ready_callback(&self, callback: Option<FrameReadyCallback>) {
        self.state.lock().render.set_frame_ready_callback(callback);
    }

    /// Lay out the video area filling `ui` and schedule its paint callback.
    pub fn show(&self, ui: &mut egui::Ui) -> egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click());
        ui.painter().rect_filled(rect, egui::CornerRadius::ZERO, egui::Color32::BLACK);

        let state = Arc::clone(&self.state);
        let callback = egui_glow::CallbackFn::new(move |info, painter| {
            state.lock().paint(&info, painter);
        });
        ui.painter().add(egui::PaintCallback {
            rect,
            callback: Arc::new(callback),
        });
        response
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn stats(&self) -> RenderStats {
        self.state.lock().render.stats()
    }

    /// Disarm, release the render context, then delete GL objects.
    ///
    /// Runs from `on_exit` with the context still current.
    pub fn shutdown(&mut self, gl: Option<&glow::Context>) {
        let mut state = self.state.lock();
        state.render.set_frame_ready_callback(None);
        state.render.release();

        let targets: Vec<_> = state.target.take().into_iter().chain(state.retired.drain(..)).collect();
        match gl {
            Some(gl) => {
                for target in targets {
                    target.destroy(gl);
                }
            }
            None if !targets.is_empty() => warn!("No GL context at exit; video target leaked"),
            None => {}
        }

        if let Some(channel) = self.debug_channel.take() {
            channel.disable();
        }
        info!(stats = ?state.render.stats(), "Video surface shut down");
    }
}
