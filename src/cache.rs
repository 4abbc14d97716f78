//! Sharded, two-consumer terrain tile cache.
//!
//! Tiles are keyed by their snapped `(top-left lon, top-left lat, LOD)` and
//! guaranteed at-most-one live materialization per key across both frame
//! pipeline consumers. Shards follow the source-band grid — every tile in a
//! shard draws from the same source file cell — which keeps per-shard lists
//! short and lock hold times small.
//!
//! Entries track one occupancy flag per consumer. Eviction never destroys
//! an entry a consumer still holds; it tombstones the slot (payload and GPU
//! texture released, key retained) and `register` reuses tombstones before
//! growing the list.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::dataset::bands::{self, HeightBand};
use crate::math;
use crate::render::TextureHandle;
use crate::tile::TerrainTile;

/// Bound on tiles resident but unreferenced by either consumer.
pub const MAX_UNUSED_TILES: usize = 50_000;

/// Extra idle slack added to the observed minimum when trimming the cache.
const BOUND_SWEEP_SLACK_MS: u64 = 5_000;

/// Frame pipeline consumer identity; each holds independent occupancy
/// flags on cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    A,
    B,
}

/// Snapped tile identity. Snapping is deterministic, so exact
/// floating-point equality is well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileKey {
    top_left_lon: f64,
    top_left_lat: f64,
    lod: u8,
}

impl TileKey {
    /// Key of the tile containing `(lon, lat)` at `lod`.
    pub fn new(lon: f64, lat: f64, lod: u8) -> TileKey {
        let (top_left_lon, top_left_lat) =
            math::snap_top_left(lon, lat, bands::lod_degree_size(lod));
        TileKey {
            top_left_lon,
            top_left_lat,
            lod,
        }
    }

    /// Key of an already-built tile.
    pub fn of(tile: &TerrainTile) -> TileKey {
        TileKey {
            top_left_lon: tile.top_left_lon(),
            top_left_lat: tile.top_left_lat(),
            lod: tile.lod(),
        }
    }

    pub fn top_left_lon(&self) -> f64 {
        self.top_left_lon
    }

    pub fn top_left_lat(&self) -> f64 {
        self.top_left_lat
    }

    pub fn lod(&self) -> u8 {
        self.lod
    }
}

struct CacheEntry {
    key: TileKey,
    tile: Option<Arc<TerrainTile>>,
    used_a: bool,
    used_b: bool,
    last_touched: u64,
}

impl CacheEntry {
    fn used_by(&self, consumer: Consumer) -> bool {
        match consumer {
            Consumer::A => self.used_a,
            Consumer::B => self.used_b,
        }
    }

    fn set_used(&mut self, consumer: Consumer, used: bool) {
        match consumer {
            Consumer::A => self.used_a = used,
            Consumer::B => self.used_b = used,
        }
    }

    fn in_use(&self) -> bool {
        self.used_a || self.used_b
    }
}

/// Aggregate cache state, gathered under the shard locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSurvey {
    /// Entries in all shards, tombstones included.
    pub entries: usize,
    /// Entries referenced by at least one consumer.
    pub in_use: usize,
    /// Resident entries referenced by neither consumer.
    pub unused: usize,
    /// Slots whose payload has been evicted.
    pub tombstones: usize,
    /// Smallest idle time among unused entries, if any.
    pub min_idle_ms: Option<u64>,
    /// Largest idle time among unused entries, if any.
    pub max_idle_ms: Option<u64>,
}

/// The sharded tile registry shared by both pipeline consumers.
pub struct TileCache {
    // One shard vector per height band, indexed like the band's
    // availability grid.
    shards: [Vec<Mutex<Vec<CacheEntry>>>; 3],
    epoch: Instant,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCache {
    pub fn new() -> TileCache {
        let shards = HeightBand::ALL.map(|band| {
            let cells = math::grid_width(band.degree_size()) * math::grid_height(band.degree_size());
            let mut shard = Vec::with_capacity(cells);
            shard.resize_with(cells, || Mutex::new(Vec::new()));
            shard
        });
        TileCache {
            shards,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn shard(&self, key: &TileKey) -> &Mutex<Vec<CacheEntry>> {
        let band = HeightBand::for_lod(key.lod);
        let (cell_lon, cell_lat) =
            math::snap_top_left(key.top_left_lon, key.top_left_lat, band.degree_size());
        let index = math::index_from_top_left(cell_lon, cell_lat, band.degree_size());
        &self.shards[band.index()][index]
    }

    /// Look up the tile for `(lon, lat, lod)`. On a hit the consumer's
    /// occupancy flag is set and the shared tile returned.
    pub fn find(
        &self,
        lon: f64,
        lat: f64,
        lod: u8,
        consumer: Consumer,
    ) -> Option<Arc<TerrainTile>> {
        let key = TileKey::new(lon, lat, lod);
        let mut entries = self.shard(&key).lock().unwrap();
        let now = self.now_ms();

        for entry in entries.iter_mut() {
            if entry.tile.is_some() && entry.key == key {
                entry.set_used(consumer, true);
                entry.last_touched = now;
                return entry.tile.clone();
            }
        }
        None
    }

    /// Register a freshly built tile for `consumer` and return the
    /// canonical instance.
    ///
    /// When another consumer registered the same key first (a speculative
    /// double build), the caller's tile is dropped and the existing entry
    /// returned. Registering the same tile instance twice is a protocol
    /// violation and panics.
    pub fn register(&self, consumer: Consumer, tile: Arc<TerrainTile>) -> Arc<TerrainTile> {
        let key = TileKey::of(&tile);
        let mut entries = self.shard(&key).lock().unwrap();
        let now = self.now_ms();

        for entry in entries.iter_mut() {
            let Some(existing) = &entry.tile else {
                continue;
            };
            if entry.key == key {
                assert!(
                    !Arc::ptr_eq(existing, &tile),
                    "cache register: tile {:?} registered twice",
                    key
                );
                log::debug!(
                    "cache register: canonicalizing double build of {:?}",
                    key
                );
                entry.set_used(consumer, true);
                entry.last_touched = now;
                return entry.tile.clone().unwrap_or(tile);
            }
        }

        let mut new_entry = CacheEntry {
            key,
            tile: Some(Arc::clone(&tile)),
            used_a: false,
            used_b: false,
            last_touched: now,
        };
        new_entry.set_used(consumer, true);

        // Reuse a tombstoned slot before growing the list.
        if let Some(slot) = entries
            .iter_mut()
            .find(|entry| entry.tile.is_none() && !entry.in_use())
        {
            *slot = new_entry;
        } else {
            entries.push(new_entry);
        }
        tile
    }

    /// Clear `consumer`'s occupancy flag on `key`.
    ///
    /// Panics when the consumer does not hold the tile — releasing without
    /// a prior acquire is an invariant violation.
    pub fn release(&self, consumer: Consumer, key: &TileKey) {
        let mut entries = self.shard(key).lock().unwrap();
        let now = self.now_ms();

        for entry in entries.iter_mut() {
            if entry.tile.is_some() && entry.key == *key {
                assert!(
                    entry.used_by(consumer),
                    "cache release: {:?} not held by {:?}",
                    key,
                    consumer
                );
                entry.set_used(consumer, false);
                entry.last_touched = now;
                return;
            }
        }
        panic!("cache release: no entry for {:?}", key);
    }

    /// Tombstone every resident entry that neither consumer holds and that
    /// has been idle at least `older_than_ms`. Released GPU texture
    /// handles are appended to `reclaim` for the renderer to delete.
    /// Returns the number of evicted tiles.
    pub fn sweep(&self, older_than_ms: u64, reclaim: &mut Vec<TextureHandle>) -> usize {
        let now = self.now_ms();
        let mut evicted = 0;

        for band in &self.shards {
            for shard in band {
                let mut entries = shard.lock().unwrap();
                for entry in entries.iter_mut() {
                    if entry.in_use() || entry.tile.is_none() {
                        continue;
                    }
                    if now.saturating_sub(entry.last_touched) >= older_than_ms {
                        if let Some(tile) = entry.tile.take() {
                            let handle = tile.texture_handle();
                            if handle != 0 {
                                reclaim.push(handle);
                            }
                            evicted += 1;
                        }
                    }
                }
            }
        }
        evicted
    }

    /// Gather aggregate counts and the idle-time extremes.
    pub fn survey(&self) -> CacheSurvey {
        let now = self.now_ms();
        let mut survey = CacheSurvey::default();

        for band in &self.shards {
            for shard in band {
                let entries = shard.lock().unwrap();
                survey.entries += entries.len();
                for entry in entries.iter() {
                    if entry.tile.is_none() {
                        survey.tombstones += 1;
                    } else if entry.in_use() {
                        survey.in_use += 1;
                    } else {
                        survey.unused += 1;
                        let idle = now.saturating_sub(entry.last_touched);
                        survey.min_idle_ms = Some(match survey.min_idle_ms {
                            Some(min) => min.min(idle),
                            None => idle,
                        });
                        survey.max_idle_ms = Some(match survey.max_idle_ms {
                            Some(max) => max.max(idle),
                            None => idle,
                        });
                    }
                }
            }
        }
        survey
    }

    /// Trim unused residents down to [`MAX_UNUSED_TILES`].
    ///
    /// Each round evicts the stalest band of entries — everything idle
    /// within the slack of the oldest observed idle time — and repeats
    /// until the bound holds. The oldest entry always qualifies, so every
    /// round makes progress.
    pub fn enforce_bound(&self, reclaim: &mut Vec<TextureHandle>) {
        loop {
            let survey = self.survey();
            if survey.unused <= MAX_UNUSED_TILES {
                return;
            }
            let Some(max_idle) = survey.max_idle_ms else {
                return;
            };
            if self.sweep(max_idle.saturating_sub(BOUND_SWEEP_SLACK_MS), reclaim) == 0 {
                return;
            }
        }
    }
}
