//! Seam between [`RenderContext`](crate::RenderContext) and an engine's
//! render API.

use std::sync::Arc;

use lm_engine::EngineHandle;

use crate::error::BridgeError;
use crate::proc_address::ProcAddressResolver;
use crate::target::FrameTarget;

/// Invoked from an engine thread when a new frame is ready. Must only
/// schedule a repaint; rendering from it is not allowed.
pub type FrameReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Why a render call drew nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The context is not in the `Bound` state.
    NotBound,
    /// The target has a zero-sized axis.
    EmptyTarget,
    /// The engine has not produced a frame yet.
    NoFrame,
}

/// Result of one render call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Skipped(SkipReason),
}

/// A live engine render context. Engine-side resources are freed on drop,
/// which must happen with the bound GL context current.
pub trait RenderApi {
    /// Draw the current frame into `target`.
    fn render(&mut self, target: &FrameTarget, flip_y: bool) -> Result<RenderOutcome, BridgeError>;

    /// Install or clear the frame-ready callback. After a `None` call
    /// returns, the previous callback is never invoked again.
    fn set_update_callback(&mut self, callback: Option<FrameReadyCallback>);
}

/// Creates [`RenderApi`] instances for one engine.
pub trait RenderBackend {
    type Api: RenderApi;

    /// Engine the created contexts render.
    fn engine_handle(&self) -> EngineHandle;

    /// Create a render API in the resolver's bound context.
    fn create(&self, resolver: &mut ProcAddressResolver<'_>) -> Result<Self::Api, BridgeError>;
}
