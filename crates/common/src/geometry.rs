//! Logical vs. physical pixel sizes.
//!
//! Layout happens in logical pixels; GPU framebuffers are sized in physical
//! pixels. The two differ by the device pixel ratio on high-density displays.

use serde::{Deserialize, Serialize};

/// A size in layout (logical) pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicalSize {
    pub width: f32,
    pub height: f32,
}

/// A size in device (physical) pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl LogicalSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Convert to physical pixels using `device_pixel_ratio`.
    ///
    /// Each axis is rounded to the nearest pixel. Negative, NaN or infinite
    /// inputs collapse to zero so callers can treat the result as "nothing to
    /// draw" instead of wrapping around.
    pub fn to_physical(self, device_pixel_ratio: f32) -> PhysicalSize {
        PhysicalSize {
            width: scale_axis(self.width, device_pixel_ratio),
            height: scale_axis(self.height, device_pixel_ratio),
        }
    }
}

impl PhysicalSize {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is zero.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for PhysicalSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn scale_axis(logical: f32, ratio: f32) -> u32 {
    let scaled = logical * ratio;
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0;
    }
    // Saturates at u32::MAX for absurd sizes.
    scaled.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ratio_keeps_size() {
        let size = LogicalSize::new(400.0, 300.0).to_physical(1.0);
        assert_eq!(size, PhysicalSize::new(400, 300));
    }

    #[test]
    fn high_density_scales_both_axes() {
        let size = LogicalSize::new(400.0, 300.0).to_physical(2.0);
        assert_eq!(size, PhysicalSize::new(800, 600));
    }

    #[test]
    fn fractional_ratio_rounds() {
        // 333 * 1.5 = 499.5 -> 500, 201 * 1.5 = 301.5 -> 302
        let size = LogicalSize::new(333.0, 201.0).to_physical(1.5);
        assert_eq!(size, PhysicalSize::new(500, 302));
    }

    #[test]
    fn degenerate_inputs_are_empty() {
        assert!(LogicalSize::new(-10.0, 20.0).to_physical(1.0).is_empty());
        assert!(LogicalSize::new(f32::NAN, 20.0).to_physical(1.0).is_empty());
        assert!(LogicalSize::new(10.0, 20.0).to_physical(0.0).is_empty());
    }

    #[test]
    fn display_format() {
        assert_eq!(PhysicalSize::new(1920, 1080).to_string(), "1920x1080");
    }
}
