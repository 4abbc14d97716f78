//! Engine performance counters.
//!
//! The updater reports tree shape and update duration, the renderer
//! reports drawn quadrants and frame duration; observers read a combined
//! snapshot. One mutex, short critical sections, no timing on the hot
//! vertex paths. An optional event history records timestamped marks
//! (flight starts, band crossings) for benchmark runs.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counters accumulated during one tree update or draw walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Nodes visited in the tree.
    pub nodes: u32,
    /// Deepest LOD present, -1 when the tree is empty.
    pub max_lod: i32,
    /// Quadrants submitted to the backend.
    pub quadrants_drawn: u32,
}

impl TreeStats {
    pub fn new() -> TreeStats {
        TreeStats {
            nodes: 0,
            max_lod: -1,
            quadrants_drawn: 0,
        }
    }
}

/// Combined engine statistics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub nodes_in_tree: u32,
    pub max_lod: i32,
    pub quadrants_drawn: u32,
    pub last_update_ms: f64,
    pub last_frame_ms: f64,
    pub updates: u64,
    pub frames: u64,
}

/// One timestamped history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Milliseconds since the stats store was created.
    pub at_ms: u64,
    pub message: String,
}

#[derive(Default)]
struct History {
    recording: bool,
    events: Vec<Event>,
}

/// Shared counter store written by both pipeline threads.
pub struct EngineStats {
    inner: Mutex<StatsSnapshot>,
    history: Mutex<History>,
    epoch: Instant,
}

impl Default for EngineStats {
    fn default() -> Self {
        EngineStats {
            inner: Mutex::new(StatsSnapshot::default()),
            history: Mutex::new(History::default()),
            epoch: Instant::now(),
        }
    }
}

impl EngineStats {
    pub fn new() -> EngineStats {
        EngineStats::default()
    }

    /// Start recording history events; previous entries are dropped.
    pub fn start_history(&self) {
        let mut history = self.history.lock().unwrap();
        history.recording = true;
        history.events.clear();
    }

    /// Stop recording; recorded entries stay readable.
    pub fn stop_history(&self) {
        self.history.lock().unwrap().recording = false;
    }

    /// Append an event when recording is on.
    pub fn add_event(&self, message: impl Into<String>) {
        let mut history = self.history.lock().unwrap();
        if history.recording {
            let at_ms = self.epoch.elapsed().as_millis() as u64;
            history.events.push(Event {
                at_ms,
                message: message.into(),
            });
        }
    }

    /// Copy of the recorded history.
    pub fn history(&self) -> Vec<Event> {
        self.history.lock().unwrap().events.clone()
    }

    /// Record one updater pass.
    pub fn record_update(&self, tree: TreeStats, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes_in_tree = tree.nodes;
        inner.max_lod = tree.max_lod;
        inner.last_update_ms = elapsed.as_secs_f64() * 1_000.0;
        inner.updates += 1;
    }

    /// Record one rendered frame.
    pub fn record_frame(&self, tree: TreeStats, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.quadrants_drawn = tree.quadrants_drawn;
        inner.last_frame_ms = elapsed.as_secs_f64() * 1_000.0;
        inner.frames += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock().unwrap()
    }
}
