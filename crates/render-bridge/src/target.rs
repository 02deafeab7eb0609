//! Per-repaint render destination.

use lm_common::{LogicalSize, PhysicalSize};

/// Destination framebuffer for a single render call.
///
/// Built fresh on every repaint from the host surface's current state. `size`
/// is always in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTarget {
    /// GL framebuffer object name. 0 is the default framebuffer.
    pub target_id: u32,
    pub size: PhysicalSize,
    pub device_pixel_ratio: f32,
}

impl FrameTarget {
    pub fn new(target_id: u32, size: PhysicalSize, device_pixel_ratio: f32) -> Self {
        Self {
            target_id,
            size,
            device_pixel_ratio,
        }
    }

    /// Build a target from the surface's logical size and pixel ratio.
    pub fn from_logical(target_id: u32, logical: LogicalSize, device_pixel_ratio: f32) -> Self {
        Self::new(target_id, logical.to_physical(device_pixel_ratio), device_pixel_ratio)
    }

    /// Nothing can be drawn into a target with a zero axis.
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_size_is_scaled_to_physical() {
        let target = FrameTarget::from_logical(7, LogicalSize::new(400.0, 300.0), 2.0);
        assert_eq!(target.size, PhysicalSize::new(800, 600));
        assert_eq!(target.target_id, 7);
        assert!(!target.is_empty());
    }

    #[test]
    fn zero_axis_is_empty() {
        let target = FrameTarget::from_logical(0, LogicalSize::new(640.0, 0.0), 1.0);
        assert!(target.is_empty());
    }
}
