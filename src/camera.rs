//! The camera contract consumed by the core.
//!
//! The interactive camera lives outside the crate; this type carries the
//! values the core needs each frame — eye and look-at points, unit view
//! direction, ground altitude, FOV/aspect, and the widened clipping-cone
//! cosine used by the frustum test — and the small amount of geometry to
//! keep them consistent when a feed (like the animator) repositions it.

use glam::DVec3;

use crate::math::{self, EARTH_RADIUS};

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_DEG: f64 = 70.0;

/// Camera pose and derived frame values.
#[derive(Debug, Clone)]
pub struct Camera {
    lon: f64,
    lat: f64,
    /// Radius of the eye from the planet center, metres.
    alt: f64,
    eye: DVec3,
    look_at: DVec3,
    fov_deg: f64,
    window_width: u32,
    window_height: u32,
    clip_cosine: f64,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Camera {
            lon: 0.0,
            lat: 0.0,
            alt: EARTH_RADIUS + 2.0e7,
            eye: DVec3::ZERO,
            look_at: DVec3::ZERO,
            fov_deg: DEFAULT_FOV_DEG,
            window_width: 800,
            window_height: 600,
            clip_cosine: 0.0,
        };
        camera.reposition();
        camera.update_clip_cosine();
        camera
    }
}

impl Camera {
    pub fn new() -> Camera {
        Camera::default()
    }

    /// Place the eye at `(lon, lat)` with `alt` metres of radius from the
    /// planet center, looking at the nadir.
    pub fn set_surface_point(&mut self, lon: f64, lat: f64, alt: f64) {
        self.lon = math::wrap_lon(lon);
        self.lat = lat;
        self.alt = alt;
        self.reposition();
    }

    /// Place the eye at a Cartesian point; geographic coordinates are
    /// derived from it. All three components are stored independently.
    pub fn set_surface_point_cartesian(&mut self, point: DVec3) {
        let (lon, lat, alt) = math::spherical_from_cartesian(point);
        self.lon = lon;
        self.lat = lat;
        self.alt = alt;
        self.eye = point;
        self.look_at = DVec3::ZERO;
    }

    fn reposition(&mut self) {
        self.eye = math::cartesian_from_spherical(self.lon, self.lat, self.alt);
        self.look_at = DVec3::ZERO;
    }

    /// Aim at an explicit world-space point instead of the nadir.
    pub fn set_look_at(&mut self, look_at: DVec3) {
        self.look_at = look_at;
    }

    pub fn set_fov(&mut self, fov_deg: f64) {
        self.fov_deg = fov_deg.clamp(5.0, 170.0);
        self.update_clip_cosine();
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width.max(1);
        self.window_height = height.max(1);
        self.update_clip_cosine();
    }

    // Terrain culling uses a cone slightly wider than the window diagonal
    // so near tiles straddling the frustum edge survive.
    fn update_clip_cosine(&mut self) {
        let clip_angle = self.fov_deg * self.aspect() * 1.1 / 2.0;
        self.clip_cosine = clip_angle.to_radians().cos();
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Eye radius from the planet center, metres.
    pub fn alt(&self) -> f64 {
        self.alt
    }

    /// Metres above the datum sphere.
    pub fn alt_ground(&self) -> f64 {
        self.alt - EARTH_RADIUS
    }

    pub fn eye(&self) -> DVec3 {
        self.eye
    }

    pub fn look_at(&self) -> DVec3 {
        self.look_at
    }

    /// Unit view direction.
    pub fn view_direction(&self) -> DVec3 {
        (self.look_at - self.eye).normalize_or_zero()
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    pub fn aspect(&self) -> f64 {
        f64::from(self.window_width) / f64::from(self.window_height)
    }

    /// Cosine of the widened half-angle used by the frustum cone test.
    pub fn clip_cosine(&self) -> f64 {
        self.clip_cosine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nadir_view_points_at_center() {
        let mut camera = Camera::new();
        camera.set_surface_point(17.038, 51.102, EARTH_RADIUS + 2_000.0);

        let dir = camera.view_direction();
        let down = -camera.eye().normalize();
        assert!((dir - down).length() < 1e-9);
        assert!((camera.alt_ground() - 2_000.0).abs() < 1e-6);
    }

    #[test]
    fn cartesian_setter_stores_components_independently() {
        let mut camera = Camera::new();
        let point = DVec3::new(1.0e6, -2.0e6, 5.0e6);
        camera.set_surface_point_cartesian(point);
        assert_eq!(camera.eye(), point);
        assert!((camera.alt() - point.length()).abs() < 1e-6);
    }

    #[test]
    fn clip_cosine_widens_with_aspect() {
        let mut camera = Camera::new();
        camera.set_window_size(800, 600);
        let narrow = camera.clip_cosine();
        camera.set_window_size(1600, 600);
        let wide = camera.clip_cosine();
        // Wider window -> wider cone -> smaller cosine.
        assert!(wide < narrow);
    }
}
