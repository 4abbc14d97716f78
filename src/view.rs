//! Shared view state and per-cycle snapshots.
//!
//! All mutable scene state — the camera plus the engine toggles — sits
//! behind one mutex. Each pipeline cycle copies it into an immutable
//! [`ViewSnapshot`] at the top of the cycle, so the updater, renderer and
//! animator each work against a frozen view regardless of concurrent
//! camera writes.

use std::sync::Mutex;

use glam::DVec3;

use crate::camera::Camera;
use crate::render::DrawStyle;

/// Default LOD distance multiplier.
pub const DEFAULT_LOD_MULTIPLIER: f64 = 1.74;

/// Immutable copy of the view for one update or render cycle.
#[derive(Debug, Clone, Copy)]
pub struct ViewSnapshot {
    pub eye: DVec3,
    pub look_at: DVec3,
    pub view_direction: DVec3,
    pub clip_cosine: f64,
    /// Metres above the datum sphere.
    pub alt_ground: f64,
    pub fov_deg: f64,
    pub aspect: f64,
    pub lod_multiplier: f64,
    pub tree_updating: bool,
    pub style: DrawStyle,
}

struct ViewInner {
    camera: Camera,
    lod_multiplier: f64,
    tree_updating: bool,
    style: DrawStyle,
}

/// Mutex-guarded scene state shared by all threads.
pub struct ViewState {
    inner: Mutex<ViewInner>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState::new(Camera::new())
    }
}

impl ViewState {
    pub fn new(camera: Camera) -> ViewState {
        ViewState {
            inner: Mutex::new(ViewInner {
                camera,
                lod_multiplier: DEFAULT_LOD_MULTIPLIER,
                tree_updating: true,
                style: DrawStyle::default(),
            }),
        }
    }

    /// Copy the current view; taken atomically at the start of a cycle.
    pub fn snapshot(&self) -> ViewSnapshot {
        let inner = self.inner.lock().unwrap();
        ViewSnapshot {
            eye: inner.camera.eye(),
            look_at: inner.camera.look_at(),
            view_direction: inner.camera.view_direction(),
            clip_cosine: inner.camera.clip_cosine(),
            alt_ground: inner.camera.alt_ground(),
            fov_deg: inner.camera.fov_deg(),
            aspect: inner.camera.aspect(),
            lod_multiplier: inner.lod_multiplier,
            tree_updating: inner.tree_updating,
            style: inner.style,
        }
    }

    /// Mutate the camera under the lock; one writer per event.
    pub fn with_camera<R>(&self, mutate: impl FnOnce(&mut Camera) -> R) -> R {
        mutate(&mut self.inner.lock().unwrap().camera)
    }

    pub fn set_lod_multiplier(&self, multiplier: f64) {
        self.inner.lock().unwrap().lod_multiplier = multiplier;
    }

    /// Pause or resume tree updates (rendering continues either way).
    pub fn set_tree_updating(&self, updating: bool) {
        self.inner.lock().unwrap().tree_updating = updating;
    }

    pub fn set_draw_style(&self, style: DrawStyle) {
        self.inner.lock().unwrap().style = style;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EARTH_RADIUS;

    #[test]
    fn snapshot_freezes_camera_state() {
        let state = ViewState::default();
        state.with_camera(|camera| {
            camera.set_surface_point(20.0, 49.0, EARTH_RADIUS + 5_000.0)
        });

        let before = state.snapshot();
        state.with_camera(|camera| {
            camera.set_surface_point(120.0, -10.0, EARTH_RADIUS + 9.0e6)
        });
        let after = state.snapshot();

        assert!((before.alt_ground - 5_000.0).abs() < 1e-6);
        assert!(before.eye != after.eye);
        assert_eq!(before.lod_multiplier, DEFAULT_LOD_MULTIPLIER);
    }
}
