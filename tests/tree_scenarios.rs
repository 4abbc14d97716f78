//! End-to-end quadtree scenarios over an empty (all-sea) dataset.

use std::sync::Arc;

use terrastream::camera::Camera;
use terrastream::cache::MAX_UNUSED_TILES;
use terrastream::dataset::reader::TileReader;
use terrastream::dataset::{Dataset, DatasetLayout};
use terrastream::math::EARTH_RADIUS;
use terrastream::quadtree::Earth;
use terrastream::stats::TreeStats;
use terrastream::view::{ViewSnapshot, ViewState};
use terrastream::{Consumer, TileCache};

fn snapshot_at(lon: f64, lat: f64, alt_ground: f64) -> ViewSnapshot {
    let state = ViewState::new(Camera::new());
    state.with_camera(|camera| camera.set_surface_point(lon, lat, EARTH_RADIUS + alt_ground));
    state.snapshot()
}

#[test]
fn distant_viewpoint_sees_the_root_forest() {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let reader = TileReader::new(&dataset);
    let cache = TileCache::new();

    let mut earth = Earth::new(Consumer::A);
    earth.init_roots(&cache, &reader).unwrap();

    // Far enough out that even the nearest tile exceeds the L1 distance
    // threshold, so every root stays at LOD 0.
    let snapshot = snapshot_at(17.038, 51.102, 4.0e7);
    let mut stats = TreeStats::new();
    earth.update(&cache, &reader, &snapshot, &mut stats);

    assert_eq!(earth.node_count(), 18);
    assert_eq!(earth.deepest_lod(), 0);
    assert_eq!(stats.nodes, 18);
    assert_eq!(stats.max_lod, 0);

    earth.clear(&cache);
}

#[test]
fn zooming_in_splits_down_to_lod_13() {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let reader = TileReader::new(&dataset);
    let cache = TileCache::new();

    let mut earth = Earth::new(Consumer::A);
    earth.init_roots(&cache, &reader).unwrap();

    // Descend in steps toward 2 km above the Tatry waypoint; every pass
    // refines further and no pass may explode the tree.
    for exponent in (4..=7).rev() {
        let alt = 10f64.powi(exponent);
        let snapshot = snapshot_at(20.088333, 49.179444, alt);
        let mut stats = TreeStats::new();
        earth.update(&cache, &reader, &snapshot, &mut stats);
        assert!(earth.node_count() < 10_000, "tree exploded at alt {alt}");
    }

    let snapshot = snapshot_at(20.088333, 49.179444, 2_000.0);
    let mut stats = TreeStats::new();
    earth.update(&cache, &reader, &snapshot, &mut stats);

    assert_eq!(earth.deepest_lod(), 13);
    assert!(earth.node_count() < 10_000);

    earth.clear(&cache);
    assert_eq!(cache.survey().in_use, 0);
}

#[test]
fn translating_near_the_ground_keeps_tree_and_cache_bounded() {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let reader = TileReader::new(&dataset);
    let cache = TileCache::new();

    let mut earth = Earth::new(Consumer::A);
    earth.init_roots(&cache, &reader).unwrap();

    let (from_lon, from_lat, from_alt) = (20.088333, 49.179444, 2_000.0);
    let (to_lon, to_lat, to_alt) = (21.101202, 47.123456, 1_500.0);

    let steps = 50;
    for step in 0..=steps {
        let t = f64::from(step) / f64::from(steps);
        let snapshot = snapshot_at(
            from_lon + (to_lon - from_lon) * t,
            from_lat + (to_lat - from_lat) * t,
            from_alt + (to_alt - from_alt) * t,
        );
        let mut stats = TreeStats::new();
        earth.update(&cache, &reader, &snapshot, &mut stats);

        assert!(earth.node_count() < 10_000, "tree exploded at step {step}");
        let survey = cache.survey();
        assert!(
            survey.unused <= MAX_UNUSED_TILES,
            "unused cache entries exceeded the bound at step {step}"
        );
    }

    // The moving viewpoint kept releasing tiles behind it.
    assert!(cache.survey().unused > 0);

    earth.clear(&cache);
    assert_eq!(cache.survey().in_use, 0);
}

#[test]
fn polar_viewpoint_terminates_and_stays_bounded() {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let reader = TileReader::new(&dataset);
    let cache = TileCache::new();

    let mut earth = Earth::new(Consumer::A);
    earth.init_roots(&cache, &reader).unwrap();

    // Every tile touching the pole shares the polar vertex, so a polar
    // viewpoint refines the whole longitude ring; a mid-range altitude
    // keeps that ring finite while still proving termination.
    for &(lon, lat) in &[(0.0, 89.999), (180.0, 89.999), (90.0, -89.999)] {
        let snapshot = snapshot_at(lon, lat, 1.0e6);
        let mut stats = TreeStats::new();
        earth.update(&cache, &reader, &snapshot, &mut stats);
        assert!(earth.node_count() < 10_000);
        assert_eq!(earth.deepest_lod(), 6, "pole ({lon},{lat}) did not refine");
    }

    earth.clear(&cache);
}

#[test]
fn meridian_straddling_viewpoints_see_the_same_depth() {
    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base("/nonexistent")));
    let reader = TileReader::new(&dataset);

    let mut depths = Vec::new();
    for lon in [0.0005, 359.9995] {
        let cache = TileCache::new();
        let mut earth = Earth::new(Consumer::A);
        earth.init_roots(&cache, &reader).unwrap();

        let snapshot = snapshot_at(lon, 45.0, 5_000.0);
        let mut stats = TreeStats::new();
        earth.update(&cache, &reader, &snapshot, &mut stats);
        depths.push(earth.deepest_lod());

        earth.clear(&cache);
    }
    assert_eq!(depths[0], depths[1]);
}
