//! The render context: links an engine's frame producer to a host surface.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──initialize──► Bound ──release──► Released
//!                                 ▲  │
//!                                 └──┘ rebind (drain, then bind anew)
//! ```
//!
//! Every operation runs on the thread that owns the host GL context. The
//! only cross-thread entry is the frame-ready callback, which the engine
//! calls from its own threads; it is gated on a liveness flag cleared
//! before engine resources are freed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use lm_engine::EngineHandle;

use crate::backend::{FrameReadyCallback, RenderApi, RenderBackend, RenderOutcome, SkipReason};
use crate::error::BridgeError;
use crate::proc_address::ProcAddressResolver;
use crate::target::FrameTarget;

/// Where a [`RenderContext`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Bound,
    Released,
}

/// Counters for the status bar and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Shared "this context may still be used" flag.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new(alive: bool) -> Self {
        Self(Arc::new(AtomicBool::new(alive)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// GPU-side link between one engine and one host surface.
pub struct RenderContext<A: RenderApi> {
    state: BridgeState,
    api: Option<A>,
    liveness: Liveness,
    engine: Option<EngineHandle>,
    callback_armed: bool,
    stats: RenderStats,
}

impl<A: RenderApi> std::fmt::Debug for RenderContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("callback_armed", &self.callback_armed)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<A: RenderApi> Default for RenderContext<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RenderApi> RenderContext<A> {
    /// A context waiting for its surface.
    pub fn new() -> Self {
        Self {
            state: BridgeState::Uninitialized,
            api: None,
            liveness: Liveness::new(false),
            engine: None,
            callback_armed: false,
            stats: RenderStats::default(),
        }
    }

    /// Bind a render path for `backend`'s engine in the resolver's context.
    ///
    /// Allowed once per surface lifetime; later calls (including after
    /// `release`) return [`BridgeError::AlreadyInitialized`].
    pub fn initialize<B>(
        &mut self,
        backend: &B,
        resolver: &mut ProcAddressResolver<'_>,
    ) -> Result<(), BridgeError>
    where
        B: RenderBackend<Api = A>,
    {
        if self.state != BridgeState::Uninitialized {
            warn!(state = ?self.state, "Render context initialized twice");
            return Err(BridgeError::AlreadyInitialized);
        }
        self.bind(backend, resolver)
    }

    /// Tear down the current binding and bind again, possibly to a different
    /// engine.
    ///
    /// Pending repaints observe the old liveness flag cleared and do nothing.
    /// The frame-ready callback is left disarmed. Only a `Bound` context can
    /// be rebound; if binding the new engine fails the context ends up
    /// `Released`.
    pub fn rebind<B>(
        &mut self,
        backend: &B,
        resolver: &mut ProcAddressResolver<'_>,
    ) -> Result<(), BridgeError>
    where
        B: RenderBackend<Api = A>,
    {
        if self.state != BridgeState::Bound {
            warn!(state = ?self.state, "Cannot rebind a render context that is not bound");
            return Err(BridgeError::NotBound);
        }
        info!(
            from = ?self.engine,
            to = %backend.engine_handle(),
            "Rebinding render context"
        );
        self.drain();
        self.state = BridgeState::Released;
        self.engine = None;

        let result = self.bind(backend, resolver);
        if let Err(e) = &result {
            error!(error = %e, "Rebind failed; render context released");
        }
        result
    }

    fn bind<B>(&mut self, backend: &B, resolver: &mut ProcAddressResolver<'_>) -> Result<(), BridgeError>
    where
        B: RenderBackend<Api = A>,
    {
        if !resolver.is_current() {
            error!(bound = %resolver.bound_context(), "Resolver context is not current");
            return Err(BridgeError::NoCurrentContext);
        }
        resolver.resolve_essentials()?;

        let api = backend.create(resolver)?;

        self.api = Some(api);
        self.liveness = Liveness::new(true);
        self.engine = Some(backend.engine_handle());
        self.callback_armed = false;
        self.state = BridgeState::Bound;

        info!(
            engine = %backend.engine_handle(),
            context = %resolver.bound_context(),
            lookups = resolver.lookups(),
            "Render context bound"
        );
        Ok(())
    }

    /// Draw the engine's current frame into `target`.
    ///
    /// Not being bound, an empty target and the engine having no frame yet
    /// are skips. Only a failing engine render call is an error.
    pub fn render_frame(
        &mut self,
        target: &FrameTarget,
        flip_y: bool,
    ) -> Result<RenderOutcome, BridgeError> {
        let Some(api) = self.api.as_mut().filter(|_| self.state == BridgeState::Bound) else {
            self.stats.skipped += 1;
            return Ok(RenderOutcome::Skipped(SkipReason::NotBound));
        };

        if target.is_empty() {
            debug!(target = target.target_id, size = %target.size, "Skipping empty target");
            self.stats.skipped += 1;
            return Ok(RenderOutcome::Skipped(SkipReason::EmptyTarget));
        }

        match api.render(target, flip_y) {
            Ok(RenderOutcome::Rendered) => {
                self.stats.rendered += 1;
                Ok(RenderOutcome::Rendered)
            }
            Ok(skipped) => {
                self.stats.skipped += 1;
                Ok(skipped)
            }
            Err(e) => {
                self.stats.failed += 1;
                Err(e)
            }
        }
    }

    /// Arm (`Some`) or disarm (`None`) the frame-ready callback.
    ///
    /// Disarming always goes through. Arming outside `Bound` is ignored.
    pub fn set_frame_ready_callback(&mut self, callback: Option<FrameReadyCallback>) {
        let Some(api) = self.api.as_mut() else {
            if callback.is_some() {
                debug!(state = ?self.state, "Ignoring frame-ready callback: not bound");
            }
            self.callback_armed = false;
            return;
        };

        match callback {
            Some(callback) => {
                let liveness = self.liveness.clone();
                let gated: FrameReadyCallback = Arc::new(move || {
                    if liveness.is_alive() {
                        callback();
                    }
                });
                api.set_update_callback(Some(gated));
                self.callback_armed = true;
                debug!("Frame-ready callback armed");
            }
            None => {
                api.set_update_callback(None);
                if self.callback_armed {
                    debug!("Frame-ready callback disarmed");
                }
                self.callback_armed = false;
            }
        }
    }

    /// Free engine-side GL resources. Safe to call repeatedly.
    ///
    /// Must run with the bound GL context current.
    pub fn release(&mut self) {
        if self.state == BridgeState::Released {
            return;
        }
        let was_bound = self.state == BridgeState::Bound;
        self.drain();
        self.state = BridgeState::Released;
        if was_bound {
            info!(stats = ?self.stats, "Render context released");
        }
    }

    /// Disarm, clear liveness, free. Leaves `state` for the caller to set.
    fn drain(&mut self) {
        if let Some(api) = self.api.as_mut() {
            api.set_update_callback(None);
        }
        self.callback_armed = false;
        self.liveness.kill();
        // Dropping the API frees the engine's GL resources.
        self.api = None;
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.state == BridgeState::Bound
    }

    pub fn is_callback_armed(&self) -> bool {
        self.callback_armed
    }

    /// Liveness flag of the current binding.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn engine_handle(&self) -> Option<EngineHandle> {
        self.engine
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }
}

impl<A: RenderApi> Drop for RenderContext<A> {
    fn drop(&mut self) {
        self.release();
    }
}
