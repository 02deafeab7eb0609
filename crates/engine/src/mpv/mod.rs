//! libmpv backend: runtime-loaded bindings and the client wrapper.

pub mod client;
pub mod ffi;

pub use client::MpvEngine;
pub use ffi::{MpvLibrary, MpvLoadError};
