//! Altitude colour ramp for per-vertex terrain colours.
//!
//! Sea level is a constant blue; land runs through an HSV ramp with knees
//! at 1 500 m (green→red), 3 000 m (red→violet) and 8 000 m (darkening,
//! then brightening back toward the void-clamp ceiling).

use glam::Vec3;

/// Colour of sea-level vertices.
pub const SEA: Vec3 = Vec3::new(0.2784, 0.6431, 0.7216);

/// Saturation used across the whole land ramp (0–255 scale).
const RAMP_SATURATION: f32 = 170.0;

/// Convert HSV (hue in degrees [0, 360), saturation/value on the 0–255
/// scale) to linear RGB in [0, 1].
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Vec3 {
    let s = (saturation / 255.0).clamp(0.0, 1.0);
    let v = (value / 255.0).clamp(0.0, 1.0);

    let sector = (hue / 60.0).rem_euclid(6.0);
    let i = sector.floor();
    let f = sector - i;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

/// Colour for a vertex at `elevation` metres (already void-clamped).
pub fn elevation_color(elevation: i32) -> Vec3 {
    if elevation == 0 {
        return SEA;
    }

    let h = elevation as f32;
    let mut value = 240.0;
    let mut hue = 170.0 - 170.0 * (h / 1500.0);
    if hue < 0.0 {
        hue = 360.0 - 100.0 * ((h - 1500.0) / 1500.0);
        if hue < 260.0 {
            hue = 260.0;
            value = 240.0 - 200.0 * ((h - 3000.0) / 5000.0);
            if value < 40.0 {
                value = (40.0 + 215.0 * ((h - 8000.0) / 850.0)).min(255.0);
            }
        }
    }

    hsv_to_rgb(hue, RAMP_SATURATION, value)
}
