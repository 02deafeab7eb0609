//! Shared value types for the Lumen player crates.
//!
//! Kept free of GPU, engine and UI dependencies so every other crate in the
//! workspace can depend on it.

pub mod color;
pub mod geometry;
pub mod time;

pub use color::{ParseColorError, Rgba};
pub use geometry::{LogicalSize, PhysicalSize};
pub use time::{format_clock, secs_to_millis};
