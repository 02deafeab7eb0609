//! Render-context bridge: lets the playback engine draw its video frames
//! into a framebuffer owned by the host window.
//!
//! - [`ProcAddressResolver`] looks up GL entry points against the host's
//!   current context on the engine's behalf.
//! - [`RenderContext`] owns the engine-side render path and its lifecycle;
//!   it is generic over a [`RenderBackend`] so tests can drive it without
//!   libmpv or a GPU.
//! - [`DebugProbe`] reports GL debug messages and framebuffer completeness.
//! - [`mpv`] is the libmpv render-API backend.

pub mod backend;
pub mod context;
pub mod debug;
pub mod error;
pub mod mpv;
pub mod proc_address;
pub mod target;

pub use backend::{FrameReadyCallback, RenderApi, RenderBackend, RenderOutcome, SkipReason};
pub use context::{BridgeState, Liveness, RenderContext, RenderStats};
pub use debug::{
    DebugChannel, DebugMessage, DebugProbe, DebugSeverity, DebugSink, FramebufferQuery,
    FramebufferReport, TracingSink,
};
pub use error::BridgeError;
pub use mpv::{MpvRenderApi, MpvRenderBackend};
pub use proc_address::{GlContextId, GlHost, ProcAddressResolver, ESSENTIAL_GL_FUNCTIONS};
pub use target::FrameTarget;
