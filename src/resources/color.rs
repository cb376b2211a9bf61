//! Color space helpers.

use glam::Vec3;

/// Converts one sRGB-encoded component to linear space.
#[inline]
#[must_use]
pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.040_45 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

/// Component-wise [`srgb_to_linear`], used for both albedo and emissive colors.
#[inline]
#[must_use]
pub fn srgb_to_linear_vec3(color: Vec3) -> Vec3 {
    Vec3::new(
        srgb_to_linear(color.x),
        srgb_to_linear(color.y),
        srgb_to_linear(color.z),
    )
}
