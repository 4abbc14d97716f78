//! Double-buffered frame pipeline.
//!
//! Two [`Earth`] buffers ping-pong between a long-lived updater thread and
//! a long-lived renderer thread. The updater refines its tree against the
//! latest view snapshot, trims the cache, then offers its tree and blocks;
//! the renderer finishes its frame, exchanges trees under the swap mutex,
//! wakes the updater and carries on with the freshly updated tree. Between
//! swaps the two threads never touch the same tree.
//!
//! GPU texture deletion is renderer-local: eviction queues handles on the
//! updater's tree, the queue crosses over at the swap, and only the
//! renderer calls [`RenderBackend::delete_texture`].
//!
//! Shutdown stops the animator first (if attached), then the updater, then
//! the renderer; the terminating updater clears its tree so every tile it
//! held becomes evictable, and the renderer drains outstanding deletions
//! before exit. A worker that misses the bounded join window aborts the
//! process.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use glam::DVec3;

use crate::animation::Animator;
use crate::cache::{Consumer, TileCache};
use crate::dataset::reader::TileReader;
use crate::dataset::Dataset;
use crate::quadtree::Earth;
use crate::render::{DepthRange, RenderBackend};
use crate::stats::{EngineStats, TreeStats};
use crate::view::ViewState;

/// Tunables for the pipeline threads.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded wait for each worker during shutdown.
    pub shutdown_timeout: Duration,
    /// Breather between renderer frames.
    pub frame_pause: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            shutdown_timeout: Duration::from_secs(5),
            frame_pause: Duration::from_millis(1),
        }
    }
}

struct SwapState {
    /// The updater finished a pass and parked its tree in `offered`.
    ready: bool,
    terminate: bool,
    offered: Option<Earth>,
}

struct PipelineShared {
    dataset: Arc<Dataset>,
    cache: Arc<TileCache>,
    view: Arc<ViewState>,
    stats: Arc<EngineStats>,
    swap: Mutex<SwapState>,
    swap_signal: Condvar,
}

/// The running engine: updater + renderer threads plus an optional
/// viewpoint animator.
pub struct FramePipeline {
    shared: Arc<PipelineShared>,
    config: PipelineConfig,
    updater: Option<thread::JoinHandle<()>>,
    renderer: Option<thread::JoinHandle<()>>,
    animator: Option<Animator>,
}

impl FramePipeline {
    /// Spawn both pipeline threads. Each initializes its own 18-root tree
    /// before entering its cycle.
    pub fn start(
        dataset: Arc<Dataset>,
        cache: Arc<TileCache>,
        view: Arc<ViewState>,
        backend: Box<dyn RenderBackend>,
        config: PipelineConfig,
    ) -> FramePipeline {
        let shared = Arc::new(PipelineShared {
            dataset,
            cache,
            view,
            stats: Arc::new(EngineStats::new()),
            swap: Mutex::new(SwapState {
                ready: false,
                terminate: false,
                offered: None,
            }),
            swap_signal: Condvar::new(),
        });

        let updater = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("terrain-updater".into())
                .spawn(move || updater_loop(&shared))
                .expect("spawn updater thread")
        };
        let renderer = {
            let shared = Arc::clone(&shared);
            let pause = config.frame_pause;
            thread::Builder::new()
                .name("terrain-renderer".into())
                .spawn(move || renderer_loop(&shared, backend, pause))
                .expect("spawn renderer thread")
        };

        FramePipeline {
            shared,
            config,
            updater: Some(updater),
            renderer: Some(renderer),
            animator: None,
        }
    }

    /// Attach the viewpoint feed so shutdown stops it first.
    pub fn attach_animator(&mut self, animator: Animator) {
        self.animator = Some(animator);
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.shared.stats)
    }

    pub fn view(&self) -> Arc<ViewState> {
        Arc::clone(&self.shared.view)
    }

    pub fn cache(&self) -> Arc<TileCache> {
        Arc::clone(&self.shared.cache)
    }

    /// Stop everything: animator, then updater, then renderer. Each join
    /// is bounded by the configured timeout; a stuck worker aborts.
    pub fn shutdown(mut self) {
        if let Some(mut animator) = self.animator.take() {
            animator.stop();
        }

        {
            let mut swap = self.shared.swap.lock().unwrap();
            swap.terminate = true;
            self.shared.swap_signal.notify_all();
        }

        if let Some(updater) = self.updater.take() {
            join_with_timeout(updater, self.config.shutdown_timeout, "updater");
        }
        if let Some(renderer) = self.renderer.take() {
            join_with_timeout(renderer, self.config.shutdown_timeout, "renderer");
        }
    }
}

fn join_with_timeout(handle: thread::JoinHandle<()>, timeout: Duration, name: &str) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::error!("{name} thread did not stop within {timeout:?}; aborting");
            std::process::abort();
        }
        thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        log::error!("{name} thread panicked during shutdown");
    }
}

fn updater_loop(shared: &PipelineShared) {
    let reader = TileReader::new(&shared.dataset);
    let mut earth = Earth::new(Consumer::B);
    if let Err(err) = earth.init_roots(&shared.cache, &reader) {
        log::error!("updater failed to build root tiles: {err}");
        shared.swap.lock().unwrap().terminate = true;
        return;
    }
    let mut snapshot = shared.view.snapshot();

    loop {
        let started = Instant::now();

        if snapshot.tree_updating {
            let mut stats = TreeStats::new();
            earth.update(&shared.cache, &reader, &snapshot, &mut stats);
            shared.stats.record_update(stats, started.elapsed());
        }

        // Cache maintenance runs on the updater only; reclaimed GPU
        // handles ride this tree across the swap to the renderer.
        let mut reclaim = Vec::new();
        shared.cache.enforce_bound(&mut reclaim);
        earth.queue_texture_deletes(reclaim);

        // Offer the refreshed tree and wait for the renderer to take it.
        let mut swap = shared.swap.lock().unwrap();
        if swap.terminate {
            drop(swap);
            earth.clear(&shared.cache);
            return;
        }
        swap.offered = Some(earth);
        swap.ready = true;
        while swap.ready && !swap.terminate {
            swap = shared.swap_signal.wait(swap).unwrap();
        }
        if swap.terminate {
            // Whichever tree sits in the slot is ours now; drop its
            // references so its tiles become evictable.
            let parked = swap.offered.take();
            drop(swap);
            if let Some(mut parked) = parked {
                parked.clear(&shared.cache);
            }
            return;
        }
        earth = swap.offered.take().expect("renderer leaves its tree on swap");
        drop(swap);

        snapshot = shared.view.snapshot();
    }
}

fn renderer_loop(shared: &PipelineShared, mut backend: Box<dyn RenderBackend>, pause: Duration) {
    let reader = TileReader::new(&shared.dataset);
    let mut earth = Earth::new(Consumer::A);
    if let Err(err) = earth.init_roots(&shared.cache, &reader) {
        log::error!("renderer failed to build root tiles: {err}");
        let mut swap = shared.swap.lock().unwrap();
        swap.terminate = true;
        shared.swap_signal.notify_all();
        return;
    }

    let mut snapshot = shared.view.snapshot();
    let mut depth_band: Option<DepthRange> = None;

    loop {
        let started = Instant::now();

        // Projection parameters step with altitude; only band crossings
        // reach the backend.
        let range = DepthRange::for_altitude(snapshot.alt_ground);
        if depth_band != Some(range) {
            backend.set_projection(snapshot.fov_deg, snapshot.aspect, range.z_near, range.z_far);
            depth_band = Some(range);
        }
        backend.set_view(snapshot.eye, snapshot.look_at, DVec3::Y);

        let mut stats = TreeStats::new();
        earth.draw(&mut *backend, &snapshot, &mut stats);
        shared.stats.record_frame(stats, started.elapsed());

        snapshot = shared.view.snapshot();

        // Swap handshake: take the updater's refreshed tree, leave ours.
        {
            let mut swap = shared.swap.lock().unwrap();
            if swap.terminate {
                drop(swap);
                for handle in earth.take_texture_deletes() {
                    backend.delete_texture(handle);
                }
                earth.clear(&shared.cache);
                return;
            }
            if swap.ready {
                let theirs = swap.offered.take().expect("updater parked its tree");
                let mine = std::mem::replace(&mut earth, theirs);
                swap.offered = Some(mine);
                swap.ready = false;
                shared.swap_signal.notify_all();
            }
        }

        // Drain deferred texture deletions on the tree we now hold.
        for handle in earth.take_texture_deletes() {
            backend.delete_texture(handle);
        }

        thread::sleep(pause);
    }
}
