//! Viewpoint feed: timed flights between surface points.
//!
//! A fixed ~15 ms tick drives the camera toward its target with a cosine
//! ease on longitude, latitude and altitude, plus an altitude hump that
//! grows with the great-angle distance of the flight — short hops stay
//! low, continental jumps arc high. Waypoint routes chain flights
//! back-to-back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::math::EARTH_RADIUS;
use crate::stats::EngineStats;
use crate::view::ViewState;

/// Animator tick interval.
pub const TICK: Duration = Duration::from_millis(15);

/// Duration of one flight.
const FLIGHT_MS: f64 = 1_500.0;

/// Peak of the altitude hump for a full-throw flight, metres.
const HOP_ALTITUDE: f64 = 1.0e7;

/// Great-angle throw (degrees) that earns the full altitude hump.
const HOP_FULL_THROW: f64 = 254.56;

/// A surface waypoint: longitude, latitude, eye radius in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

struct Flight {
    start_lon: f64,
    start_lat: f64,
    start_alt: f64,
    delta_lon: f64,
    delta_lat: f64,
    delta_alt: f64,
    throw: f64,
    started: Instant,
}

#[derive(Default)]
struct AnimState {
    flight: Option<Flight>,
    route: VecDeque<Waypoint>,
}

struct AnimatorShared {
    view: Arc<ViewState>,
    stats: Option<Arc<EngineStats>>,
    state: Mutex<AnimState>,
    terminate: AtomicBool,
}

impl AnimatorShared {
    fn mark(&self, tag: &str, lon: f64, lat: f64, alt: f64) {
        if let Some(stats) = &self.stats {
            stats.add_event(format!(
                "[{tag}] lon: {lon:.6} lat: {lat:.6} alt: {:.3}",
                alt - EARTH_RADIUS
            ));
        }
    }
}

/// The animation thread handle.
pub struct Animator {
    shared: Arc<AnimatorShared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Animator {
    /// Spawn the tick thread against the shared view state.
    pub fn start(view: Arc<ViewState>) -> Animator {
        Animator::spawn(view, None)
    }

    /// Like [`Animator::start`], also marking flight starts and landings
    /// in the stats event history.
    pub fn start_with_stats(view: Arc<ViewState>, stats: Arc<EngineStats>) -> Animator {
        Animator::spawn(view, Some(stats))
    }

    fn spawn(view: Arc<ViewState>, stats: Option<Arc<EngineStats>>) -> Animator {
        let shared = Arc::new(AnimatorShared {
            view,
            stats,
            state: Mutex::new(AnimState::default()),
            terminate: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("viewpoint-animator".into())
            .spawn(move || {
                while !worker.terminate.load(Ordering::Acquire) {
                    tick(&worker);
                    thread::sleep(TICK);
                }
            })
            .expect("spawn animator thread");

        Animator {
            shared,
            handle: Some(handle),
        }
    }

    /// Begin a flight from the camera's current position.
    pub fn fly_to(&self, target: Waypoint) {
        let mut state = self.shared.state.lock().unwrap();
        state.flight = begin_flight(&self.shared.view, target);
        if let Some(flight) = &state.flight {
            self.shared
                .mark("ANIM START", flight.start_lon, flight.start_lat, flight.start_alt);
        }
    }

    /// Queue waypoints to fly in order; the next leg starts as each one
    /// completes.
    pub fn set_route(&self, waypoints: impl IntoIterator<Item = Waypoint>) {
        let mut state = self.shared.state.lock().unwrap();
        state.route = waypoints.into_iter().collect();
    }

    /// Whether a flight or queued route leg is still pending.
    pub fn in_flight(&self) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.flight.is_some() || !state.route.is_empty()
    }

    /// Stop the tick thread and join it.
    pub fn stop(&mut self) {
        self.shared.terminate.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn begin_flight(view: &ViewState, target: Waypoint) -> Option<Flight> {
    let (start_lon, start_lat, start_alt) =
        view.with_camera(|camera| (camera.lon(), camera.lat(), camera.alt()));

    // Fly the short way around the antimeridian.
    let mut delta_lon = target.lon - start_lon;
    if delta_lon > 180.0 {
        delta_lon -= 360.0;
    }
    if delta_lon < -180.0 {
        delta_lon += 360.0;
    }
    let delta_lat = target.lat - start_lat;
    let delta_alt = target.alt - start_alt;

    if delta_lon == 0.0 && delta_lat == 0.0 && delta_alt == 0.0 {
        return None;
    }

    Some(Flight {
        start_lon,
        start_lat,
        start_alt,
        delta_lon,
        delta_lat,
        delta_alt,
        throw: (delta_lon * delta_lon + delta_lat * delta_lat).sqrt(),
        started: Instant::now(),
    })
}

fn tick(shared: &AnimatorShared) {
    let mut state = shared.state.lock().unwrap();

    if state.flight.is_none() {
        if let Some(next) = state.route.pop_front() {
            state.flight = begin_flight(&shared.view, next);
            if let Some(flight) = &state.flight {
                shared.mark("ANIM START", flight.start_lon, flight.start_lat, flight.start_alt);
            }
        }
    }

    let Some(flight) = &state.flight else {
        return;
    };

    let elapsed = flight.started.elapsed().as_secs_f64() * 1_000.0;
    if elapsed > FLIGHT_MS {
        let (lon, lat, alt) = (
            flight.start_lon + flight.delta_lon,
            flight.start_lat + flight.delta_lat,
            flight.start_alt + flight.delta_alt,
        );
        state.flight = None;
        drop(state);
        shared
            .view
            .with_camera(|camera| camera.set_surface_point(lon, lat, alt));
        shared.mark("ANIM STOP", lon, lat, alt);
        return;
    }

    let unit = elapsed / FLIGHT_MS;
    let ease = ((std::f64::consts::PI * (unit - 1.0)).cos() + 1.0) / 2.0;
    let ease_alt = ((2.0 * std::f64::consts::PI * unit - std::f64::consts::PI).cos() + 1.0) / 2.0;

    let lon = flight.start_lon + flight.delta_lon * ease;
    let lat = flight.start_lat + flight.delta_lat * ease;
    let alt = flight.start_alt
        + flight.delta_alt * ease
        + HOP_ALTITUDE * ease_alt * (flight.throw / HOP_FULL_THROW);

    drop(state);
    shared
        .view
        .with_camera(|camera| camera.set_surface_point(lon, lat, alt));
}
