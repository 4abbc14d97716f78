//! Frame pipeline lifecycle: startup, swaps, texture traffic, shutdown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use glam::DVec3;
use terrastream::animation::{Animator, Waypoint};
use terrastream::camera::Camera;
use terrastream::dataset::raw::Texel;
use terrastream::dataset::{Dataset, DatasetLayout};
use terrastream::math::EARTH_RADIUS;
use terrastream::pipeline::{FramePipeline, PipelineConfig};
use terrastream::render::{DrawCall, RenderBackend, TextureHandle};
use terrastream::view::ViewState;
use terrastream::TileCache;

/// Backend that records traffic instead of drawing.
#[derive(Default)]
struct Recording {
    draws: AtomicU32,
    projections: AtomicU32,
    created: Mutex<Vec<TextureHandle>>,
    deleted: Mutex<Vec<TextureHandle>>,
    next_handle: AtomicU32,
}

struct RecordingBackend(Arc<Recording>);

impl RenderBackend for RecordingBackend {
    fn create_texture(&mut self, rgb: &[Texel], size: usize) -> TextureHandle {
        assert_eq!(rgb.len(), size * size);
        let handle = self.0.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.0.created.lock().unwrap().push(handle);
        handle
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        self.0.deleted.lock().unwrap().push(handle);
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        assert_eq!(call.positions.len(), call.normals.len());
        assert!(!call.positions.is_empty());
        self.0.draws.fetch_add(1, Ordering::Relaxed);
    }

    fn set_projection(&mut self, _fov: f64, _aspect: f64, z_near: f64, z_far: f64) {
        assert!(z_near > 0.0 && z_far > z_near);
        self.0.projections.fetch_add(1, Ordering::Relaxed);
    }

    fn set_view(&mut self, eye: DVec3, look_at: DVec3, _up: DVec3) {
        assert!(eye != look_at);
    }
}

fn start_pipeline(record: &Arc<Recording>) -> FramePipeline {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let cache = Arc::new(TileCache::new());
    let view = Arc::new(ViewState::new(Camera::new()));
    view.with_camera(|camera| camera.set_surface_point(17.038, 51.102, EARTH_RADIUS + 2.0e7));

    FramePipeline::start(
        dataset,
        cache,
        view,
        Box::new(RecordingBackend(Arc::clone(record))),
        PipelineConfig::default(),
    )
}

#[test]
fn pipeline_runs_frames_and_updates() {
    let record = Arc::new(Recording::default());
    let pipeline = start_pipeline(&record);
    let stats = pipeline.stats();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snap = stats.snapshot();
        if snap.frames >= 3 && snap.updates >= 3 {
            break;
        }
        assert!(Instant::now() < deadline, "pipeline made no progress");
        thread::sleep(Duration::from_millis(10));
    }

    let snap = stats.snapshot();
    assert!(snap.nodes_in_tree >= 18);
    assert!(record.draws.load(Ordering::Relaxed) > 0);
    assert!(record.projections.load(Ordering::Relaxed) >= 1);

    pipeline.shutdown();
}

#[test]
fn shutdown_releases_every_tile() {
    let record = Arc::new(Recording::default());
    let pipeline = start_pipeline(&record);
    let cache = pipeline.cache();
    let stats = pipeline.stats();

    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.snapshot().frames < 5 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    pipeline.shutdown();

    // Both trees dropped their references during shutdown.
    assert_eq!(cache.survey().in_use, 0);
}

#[test]
fn flight_drives_refinement_through_the_pipeline() {
    let record = Arc::new(Recording::default());
    let mut pipeline = start_pipeline(&record);
    let view = pipeline.view();
    let stats = pipeline.stats();

    // Hover above the target first so the flight is a plain descent.
    view.with_camera(|camera| {
        camera.set_surface_point(20.088333, 49.179444, EARTH_RADIUS + 50_000.0)
    });
    stats.start_history();

    let animator = Animator::start_with_stats(Arc::clone(&view), Arc::clone(&stats));
    animator.fly_to(Waypoint {
        lon: 20.088333,
        lat: 49.179444,
        alt: EARTH_RADIUS + 2_000.0,
    });
    pipeline.attach_animator(animator);

    // After the flight lands the updater should have refined to deep LODs.
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snap = stats.snapshot();
        if snap.max_lod >= 13 {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "never refined past LOD {}",
            snap.max_lod
        );
        thread::sleep(Duration::from_millis(20));
    }

    pipeline.shutdown();

    // Deletions only ever name textures the backend created.
    let created = record.created.lock().unwrap().clone();
    let deleted = record.deleted.lock().unwrap().clone();
    assert!(deleted.iter().all(|handle| created.contains(handle)));

    // The descent crossed depth bands, so the projection was reset at
    // least twice, and the flight left its marks in the history.
    assert!(record.projections.load(Ordering::Relaxed) >= 2);
    let history = stats.history();
    assert!(history.iter().any(|e| e.message.starts_with("[ANIM START]")));
    assert!(history.iter().any(|e| e.message.starts_with("[ANIM STOP]")));
}
