//! Playback engine for Lumen.
//!
//! - [`mpv`] loads libmpv at runtime and wraps a client handle as
//!   [`MpvEngine`].
//! - [`MediaEngine`] is the seam between the playback service and whatever
//!   engine drives it; tests substitute an in-memory engine.
//! - [`PlaybackService`] owns an engine plus one event thread and publishes
//!   typed [`PlaybackEvent`]s to any number of subscribers.

pub mod engine;
pub mod error;
pub mod event;
pub mod mpv;
pub mod service;

pub use engine::{EngineHandle, MediaEngine};
pub use error::EngineError;
pub use event::{
    EndReason, EngineEvent, EngineLogLevel, ObservedProperty, PlaybackEvent, PlaybackSnapshot,
    PropertyValue,
};
pub use mpv::{MpvEngine, MpvLibrary, MpvLoadError};
pub use service::PlaybackService;
