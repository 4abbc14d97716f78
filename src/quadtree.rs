//! Per-viewpoint LOD quadtree over the 18 root tiles.
//!
//! Each pipeline buffer owns one [`Earth`]: a forest of 18 LOD-0 roots
//! (6 × 3 at 60°) whose nodes split toward the viewpoint and merge away
//! from it. A node refreshes its closest sea-sphere vertex every update,
//! culls against the horizon and a widened frustum cone, and picks its
//! target LOD from the distance table. Tiles are acquired from the shared
//! cache (built through the reader on a miss) and released when subtrees
//! merge or the tree is torn down.

use std::sync::Arc;

use glam::DVec3;

use crate::cache::{Consumer, TileCache, TileKey};
use crate::dataset::reader::TileReader;
use crate::error::Result;
use crate::math::GM;
use crate::render::{self, RenderBackend, TextureHandle};
use crate::stats::TreeStats;
use crate::tile::TerrainTile;
use crate::view::ViewSnapshot;

/// Distance beyond any real viewpoint, used to reset closest-point scans.
const FAR_AWAY: f64 = 2_000.0 * GM;

/// Backstep added along the view direction before the frustum cone test,
/// so tiles straddling the near plane stay in.
const FRUSTUM_BACKSTEP: f64 = 10_000.0;

/// LOD selection thresholds in metres, deepest first; scaled by the view's
/// `lod_multiplier`.
const LOD_DISTANCES: [(f64, u8); 13] = [
    (5_200.0, 13),
    (10_400.0, 12),
    (20_800.0, 11),
    (41_600.0, 10),
    (83_200.0, 9),
    (166_400.0, 8),
    (332_800.0, 7),
    (665_600.0, 6),
    (1_331_200.0, 5),
    (2_662_500.0, 4),
    (5_324_900.0, 3),
    (10_649_900.0, 2),
    (21_299_700.0, 1),
];

/// Shared collaborators for one update pass.
pub struct UpdateContext<'a> {
    pub cache: &'a TileCache,
    pub reader: &'a TileReader<'a>,
    pub snapshot: &'a ViewSnapshot,
    pub consumer: Consumer,
    pub stats: &'a mut TreeStats,
}

/// Collaborators for one draw walk.
pub struct DrawContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub snapshot: &'a ViewSnapshot,
    pub stats: &'a mut TreeStats,
}

/// One quadtree node bound to a cached tile.
pub struct TerrainNode {
    key: TileKey,
    tile: Arc<TerrainTile>,
    /// NW, NE, SW, SE; a non-leaf always has all four.
    children: Option<Box<[TerrainNode; 4]>>,
    closest_point: DVec3,
    closest_normal: DVec3,
    closest_distance: f64,
    visible: bool,
    in_frustum: bool,
}

impl TerrainNode {
    /// Bind a node to the cached tile for `(lon, lat, lod)`, building and
    /// registering it on a miss.
    fn acquire(
        cache: &TileCache,
        reader: &TileReader<'_>,
        consumer: Consumer,
        lon: f64,
        lat: f64,
        lod: u8,
    ) -> Result<TerrainNode> {
        let tile = match cache.find(lon, lat, lod, consumer) {
            Some(tile) => tile,
            None => {
                let built = Arc::new(TerrainTile::build(reader, lon, lat, lod)?);
                cache.register(consumer, built)
            }
        };

        Ok(TerrainNode {
            key: TileKey::of(&tile),
            tile,
            children: None,
            closest_point: DVec3::ZERO,
            closest_normal: DVec3::ZERO,
            closest_distance: FAR_AWAY,
            visible: false,
            in_frustum: false,
        })
    }

    pub fn lod(&self) -> u8 {
        self.tile.lod()
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    fn find_closest_to_eye(&mut self, snapshot: &ViewSnapshot) {
        self.closest_distance = FAR_AWAY;
        for point in self.tile.sphere_points() {
            let distance = (*point - snapshot.eye).length();
            if distance < self.closest_distance {
                self.closest_distance = distance;
                self.closest_point = *point;
            }
        }
        self.closest_normal = self.closest_point.normalize_or_zero();
    }

    /// Horizon and must-show visibility; also refreshes the frustum flag.
    fn compute_visibility(&mut self, snapshot: &ViewSnapshot) -> bool {
        self.find_closest_to_eye(snapshot);

        let to_terrain = (self.closest_point - snapshot.eye).normalize_or_zero();
        let to_terrain_backstepped = (self.closest_point - snapshot.eye
            + snapshot.view_direction * FRUSTUM_BACKSTEP)
            .normalize_or_zero();

        // The surface normal faces away from the eye by more than ~90deg
        // only on the near side of the globe.
        let beyond_horizon = to_terrain.dot(self.closest_normal) >= -0.01;
        let close_enough = self.closest_distance <= self.tile.must_show_distance();

        self.in_frustum =
            snapshot.view_direction.dot(to_terrain_backstepped) > snapshot.clip_cosine;

        close_enough || !beyond_horizon
    }

    fn lod_to_render(&self, snapshot: &ViewSnapshot) -> u8 {
        for &(metres, lod) in &LOD_DISTANCES {
            if self.closest_distance < metres * snapshot.lod_multiplier {
                return lod;
            }
        }
        0
    }

    /// Depth-first refinement: split toward the viewpoint, merge away.
    pub fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.visible = self.compute_visibility(ctx.snapshot);
        if !self.visible {
            self.merge(ctx.cache, ctx.consumer);
            ctx.stats.nodes += 1;
            return;
        }

        let target = self.lod_to_render(ctx.snapshot);
        if target < self.lod() {
            // An ancestor at the target LOD draws this region.
            self.visible = false;
        }

        if target > self.lod() {
            if self.split(ctx) {
                if let Some(children) = &mut self.children {
                    for child in children.iter_mut() {
                        child.update(ctx);
                    }
                }
            }
        } else {
            self.merge(ctx.cache, ctx.consumer);
        }

        ctx.stats.nodes += 1;
        ctx.stats.max_lod = ctx.stats.max_lod.max(i32::from(self.lod()));
    }

    /// Create the four children one LOD deeper. Returns false (staying
    /// coarse until the next tick) when a child tile cannot be built.
    fn split(&mut self, ctx: &mut UpdateContext<'_>) -> bool {
        if self.children.is_some() {
            return true;
        }

        let half = self.tile.degree_size() / 2.0;
        let lon = self.key.top_left_lon();
        let lat = self.key.top_left_lat();
        let lod = self.lod() + 1;

        let corners = [
            (lon, lat),
            (lon + half, lat),
            (lon, lat - half),
            (lon + half, lat - half),
        ];

        let mut children = Vec::with_capacity(4);
        for (child_lon, child_lat) in corners {
            match TerrainNode::acquire(
                ctx.cache,
                ctx.reader,
                ctx.consumer,
                child_lon,
                child_lat,
                lod,
            ) {
                Ok(child) => children.push(child),
                Err(err) => {
                    log::warn!(
                        "split of {:?} failed at LOD {lod}: {err}; staying coarse",
                        self.key
                    );
                    for child in children {
                        child.release_subtree(ctx.cache, ctx.consumer);
                    }
                    return false;
                }
            }
        }

        let children: Box<[TerrainNode; 4]> = match children.try_into() {
            Ok(array) => Box::new(array),
            Err(_) => unreachable!("exactly four children acquired"),
        };
        self.children = Some(children);
        true
    }

    /// Drop the subtree below this node, releasing its cache references.
    fn merge(&mut self, cache: &TileCache, consumer: Consumer) {
        if let Some(children) = self.children.take() {
            for child in *children {
                child.release_subtree(cache, consumer);
            }
        }
    }

    /// Release this node's tile and everything below it.
    fn release_subtree(mut self, cache: &TileCache, consumer: Consumer) {
        if let Some(children) = self.children.take() {
            for child in *children {
                child.release_subtree(cache, consumer);
            }
        }
        cache.release(consumer, &self.key);
    }

    /// Draw this subtree; returns whether this node drew (or claimed) its
    /// region. A quadrant is emitted only when its child did not draw it.
    pub fn draw(&self, ctx: &mut DrawContext<'_>) -> bool {
        if !self.visible {
            return false;
        }

        const QUADRANTS: [(usize, usize); 4] = [(0, 0), (4, 0), (0, 4), (4, 4)];

        for (i, &(x0, y0)) in QUADRANTS.iter().enumerate() {
            let child_drew = match &self.children {
                Some(children) => children[i].draw(ctx),
                None => false,
            };

            if !child_drew && self.in_frustum {
                ctx.stats.quadrants_drawn += 1;
                render::draw_quadrant(&self.tile, x0, y0, &ctx.snapshot.style, ctx.backend);
            }
        }

        true
    }

    fn count_nodes(&self) -> u32 {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(TerrainNode::count_nodes).sum())
    }

    fn deepest_lod(&self) -> u8 {
        self.children
            .as_ref()
            .map_or(self.lod(), |c| {
                c.iter().map(TerrainNode::deepest_lod).max().unwrap_or(0)
            })
    }
}

/// One double-buffered tree instance: 18 roots plus the buffer-local GPU
/// deletion queue.
pub struct Earth {
    consumer: Consumer,
    roots: Vec<TerrainNode>,
    textures_to_delete: Vec<TextureHandle>,
}

impl Earth {
    pub fn new(consumer: Consumer) -> Earth {
        Earth {
            consumer,
            roots: Vec::new(),
            textures_to_delete: Vec::new(),
        }
    }

    pub fn consumer(&self) -> Consumer {
        self.consumer
    }

    /// Materialize the 18 LOD-0 roots covering the sphere.
    pub fn init_roots(&mut self, cache: &TileCache, reader: &TileReader<'_>) -> Result<()> {
        debug_assert!(self.roots.is_empty());
        for lon_step in 0..6 {
            for lat_step in 0..3 {
                let lon = f64::from(lon_step) * 60.0;
                let lat = 90.0 - f64::from(lat_step) * 60.0;
                self.roots.push(TerrainNode::acquire(
                    cache,
                    reader,
                    self.consumer,
                    lon,
                    lat,
                    0,
                )?);
            }
        }
        Ok(())
    }

    /// Run one refinement pass over every root.
    pub fn update(
        &mut self,
        cache: &TileCache,
        reader: &TileReader<'_>,
        snapshot: &ViewSnapshot,
        stats: &mut TreeStats,
    ) {
        let mut ctx = UpdateContext {
            cache,
            reader,
            snapshot,
            consumer: self.consumer,
            stats,
        };
        for root in &mut self.roots {
            root.update(&mut ctx);
        }
    }

    /// Walk the tree and emit draw calls for the visible quadrants.
    pub fn draw(
        &self,
        backend: &mut dyn RenderBackend,
        snapshot: &ViewSnapshot,
        stats: &mut TreeStats,
    ) {
        let mut ctx = DrawContext {
            backend,
            snapshot,
            stats,
        };
        for root in &self.roots {
            root.draw(&mut ctx);
        }
    }

    /// Release every cache reference this tree holds (tree teardown).
    pub fn clear(&mut self, cache: &TileCache) {
        for root in self.roots.drain(..) {
            root.release_subtree(cache, self.consumer);
        }
    }

    /// Queue a GPU texture for deletion by this buffer's renderer pass.
    pub fn queue_texture_deletes(&mut self, handles: impl IntoIterator<Item = TextureHandle>) {
        self.textures_to_delete.extend(handles);
    }

    /// Drain the deletion queue (renderer side).
    pub fn take_texture_deletes(&mut self) -> Vec<TextureHandle> {
        std::mem::take(&mut self.textures_to_delete)
    }

    pub fn node_count(&self) -> u32 {
        self.roots.iter().map(TerrainNode::count_nodes).sum()
    }

    pub fn deepest_lod(&self) -> u8 {
        self.roots
            .iter()
            .map(TerrainNode::deepest_lod)
            .max()
            .unwrap_or(0)
    }

    pub fn roots(&self) -> &[TerrainNode] {
        &self.roots
    }
}
