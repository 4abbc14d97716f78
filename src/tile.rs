//! A fully materialized terrain tile.
//!
//! One tile covers a `(top-left lon, top-left lat, LOD)` cell with a 9×9
//! elevation grid in Earth-centered Cartesian coordinates, per-vertex
//! normals computed with ghost samples so edges match the neighbouring
//! tiles, per-vertex colours, texture UVs, a 32×32 composited RGB image,
//! and the 3×3 skirt corner grid used to hide z-fighting against the sea
//! sphere at low LODs. Tiles are immutable after construction except for
//! the lazily bound GPU texture handle.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{DVec3, Vec2, Vec3};

use crate::colormap;
use crate::dataset::bands::{self, TEXTURE_MAX_LOD, TEXTURE_SIZE, TILE_GRID};
use crate::dataset::raw::Texel;
use crate::dataset::reader::{TileReader, POINT_COUNT};
use crate::error::Result;
use crate::math::{self, EARTH_CIRCUMFERENCE, EARTH_RADIUS};
use crate::render::TextureHandle;

/// Elevations above this are dataset void markers, replaced by 10 m.
const VOID_ELEVATION: i32 = 9_000;

/// Replacement elevation for void cells.
const VOID_REPLACEMENT: i32 = 10;

/// Radius offset of the closest-point sphere (below sea level).
const SPHERE_DEPTH: f64 = 500.0;

/// Radius offset of the skirt corner grid.
const SKIRT_DEPTH: f64 = 200.0;

/// UV inset keeping samples off the texture border.
const UV_SCALE: f64 = 0.973;
const UV_OFFSET: f64 = 0.0135;

/// A fully materialized 9×9 terrain tile.
pub struct TerrainTile {
    top_left_lon: f64,
    top_left_lat: f64,
    lod: u8,
    degree_size: f64,
    must_show_distance: f64,
    elevations: [i32; POINT_COUNT],
    positions: [DVec3; POINT_COUNT],
    sphere: [DVec3; POINT_COUNT],
    normals: [DVec3; POINT_COUNT],
    colors: [Vec3; POINT_COUNT],
    uv: [Vec2; POINT_COUNT],
    texture: Vec<Texel>,
    texture_handle: AtomicU32,
    skirt_points: [DVec3; 9],
    skirt_normals: [DVec3; 9],
}

impl TerrainTile {
    /// Materialize the tile containing `(lon, lat)` at `lod`.
    ///
    /// The corner is snapped to the LOD grid, so any coordinate inside the
    /// cell builds the identical tile.
    pub fn build(reader: &TileReader<'_>, lon: f64, lat: f64, lod: u8) -> Result<TerrainTile> {
        let degree_size = bands::lod_degree_size(lod);
        let (tl_lon, tl_lat) = math::snap_top_left(lon, lat, degree_size);

        let source = reader.load_tile(tl_lon, tl_lat, lod)?;

        let mut tile = TerrainTile {
            top_left_lon: tl_lon,
            top_left_lat: tl_lat,
            lod,
            degree_size,
            must_show_distance: degree_size / 8.0 / 360.0 * EARTH_CIRCUMFERENCE,
            elevations: [0; POINT_COUNT],
            positions: [DVec3::ZERO; POINT_COUNT],
            sphere: [DVec3::ZERO; POINT_COUNT],
            normals: [DVec3::ZERO; POINT_COUNT],
            colors: [Vec3::ZERO; POINT_COUNT],
            uv: [Vec2::ZERO; POINT_COUNT],
            texture: source.texture,
            texture_handle: AtomicU32::new(0),
            skirt_points: [DVec3::ZERO; 9],
            skirt_normals: [DVec3::ZERO; 9],
        };

        tile.fill_vertices(&source.heights);
        tile.fill_normals(&source.ghosts);
        tile.fill_skirt();

        Ok(tile)
    }

    fn fill_vertices(&mut self, heights: &[i32; POINT_COUNT]) {
        // Above the deepest natively-textured LOD the UVs subsample the
        // band-10 parent texture instead of covering the whole image.
        let parent_uv = (self.lod > TEXTURE_MAX_LOD).then(|| {
            let parent_deg = bands::lod_degree_size(TEXTURE_MAX_LOD);
            let (p_lon, p_lat) =
                math::snap_top_left(self.top_left_lon, self.top_left_lat, parent_deg);
            let size = 1.0 / (1u64 << (self.lod - TEXTURE_MAX_LOD)) as f64;
            (
                (self.top_left_lon - p_lon) / parent_deg,
                (p_lat - self.top_left_lat) / parent_deg,
                size,
            )
        });

        let mut i = 0;
        for y in 0..TILE_GRID {
            for x in 0..TILE_GRID {
                let fx = x as f64 / 8.0;
                let fy = y as f64 / 8.0;

                self.uv[i] = match parent_uv {
                    Some((off_lon, off_lat, size)) => Vec2::new(
                        ((off_lon + fx * size) * UV_SCALE + UV_OFFSET) as f32,
                        ((off_lat + fy * size) * UV_SCALE + UV_OFFSET) as f32,
                    ),
                    None => Vec2::new(
                        (fx * UV_SCALE + UV_OFFSET) as f32,
                        (fy * UV_SCALE + UV_OFFSET) as f32,
                    ),
                };

                let mut elevation = heights[i];
                if elevation > VOID_ELEVATION {
                    elevation = VOID_REPLACEMENT;
                }
                self.elevations[i] = elevation;

                let lon = self.top_left_lon + fx * self.degree_size;
                let lat = self.top_left_lat - fy * self.degree_size;
                self.positions[i] =
                    math::cartesian_from_spherical(lon, lat, EARTH_RADIUS + f64::from(elevation));
                self.sphere[i] =
                    math::cartesian_from_spherical(lon, lat, EARTH_RADIUS - SPHERE_DEPTH);
                self.colors[i] = colormap::elevation_color(elevation);

                i += 1;
            }
        }
    }

    fn fill_normals(&mut self, ghosts: &crate::dataset::reader::GhostHeights) {
        // Ghost vertex positions one grid step outside the tile, at the
        // raw (unclamped) neighbour elevations.
        let ghost_pos = |cell_x: f64, cell_y: f64, elevation: i32| {
            let lon = self.top_left_lon + cell_x / 8.0 * self.degree_size;
            let lat = self.top_left_lat - cell_y / 8.0 * self.degree_size;
            math::cartesian_from_spherical(lon, lat, EARTH_RADIUS + f64::from(elevation))
        };

        let nw = ghost_pos(-1.0, -1.0, ghosts.nw);
        let ne = ghost_pos(9.0, -1.0, ghosts.ne);
        let sw = ghost_pos(-1.0, 9.0, ghosts.sw);
        let se = ghost_pos(9.0, 9.0, ghosts.se);
        let mut north = [DVec3::ZERO; TILE_GRID];
        let mut east = [DVec3::ZERO; TILE_GRID];
        let mut south = [DVec3::ZERO; TILE_GRID];
        let mut west = [DVec3::ZERO; TILE_GRID];
        for i in 0..TILE_GRID {
            north[i] = ghost_pos(i as f64, -1.0, ghosts.north[i]);
            east[i] = ghost_pos(9.0, i as f64, ghosts.east[i]);
            south[i] = ghost_pos(i as f64, 9.0, ghosts.south[i]);
            west[i] = ghost_pos(-1.0, i as f64, ghosts.west[i]);
        }

        let positions = self.positions;

        // Delta from the base vertex toward grid cell (xx, yy), which may
        // lie one step outside the tile.
        let delta = |base: DVec3, xx: i32, yy: i32| -> DVec3 {
            let neighbor = if (0..TILE_GRID as i32).contains(&xx)
                && (0..TILE_GRID as i32).contains(&yy)
            {
                positions[yy as usize * TILE_GRID + xx as usize]
            } else if yy == -1 {
                if xx == -1 {
                    nw
                } else if xx == TILE_GRID as i32 {
                    ne
                } else {
                    north[xx as usize]
                }
            } else if yy == TILE_GRID as i32 {
                if xx == -1 {
                    sw
                } else if xx == TILE_GRID as i32 {
                    se
                } else {
                    south[xx as usize]
                }
            } else if xx == -1 {
                west[yy as usize]
            } else {
                east[yy as usize]
            };
            neighbor - base
        };

        for y in 0..TILE_GRID as i32 {
            for x in 0..TILE_GRID as i32 {
                let base = positions[y as usize * TILE_GRID + x as usize];

                let v_nw = delta(base, x - 1, y - 1);
                let v_n = delta(base, x, y - 1);
                let v_ne = delta(base, x + 1, y - 1);
                let v_w = delta(base, x - 1, y);
                let v_e = delta(base, x + 1, y);
                let v_sw = delta(base, x - 1, y + 1);
                let v_s = delta(base, x, y + 1);
                let v_se = delta(base, x + 1, y + 1);

                // Sum of the unit normals of the eight surrounding planes.
                let sum = plane_normal(v_ne, v_n)
                    + plane_normal(v_e, v_ne)
                    + plane_normal(v_se, v_e)
                    + plane_normal(v_s, v_se)
                    + plane_normal(v_sw, v_s)
                    + plane_normal(v_w, v_sw)
                    + plane_normal(v_nw, v_w)
                    + plane_normal(v_n, v_nw);

                self.normals[y as usize * TILE_GRID + x as usize] = sum.normalize_or_zero();
            }
        }
    }

    fn fill_skirt(&mut self) {
        let radius = EARTH_RADIUS - SKIRT_DEPTH;
        for iy in 0..3 {
            for ix in 0..3 {
                let lon = self.top_left_lon + ix as f64 * self.degree_size / 2.0;
                let lat = self.top_left_lat - iy as f64 * self.degree_size / 2.0;
                let point = math::cartesian_from_spherical(lon, lat, radius);
                self.skirt_points[iy * 3 + ix] = point;
                self.skirt_normals[iy * 3 + ix] = point.normalize();
            }
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

    pub fn degree_size(&self) -> f64 {
        self.degree_size
    }

    /// Viewpoints within this arc length force the tile visible.
    pub fn must_show_distance(&self) -> f64 {
        self.must_show_distance
    }

    pub fn position(&self, x: usize, y: usize) -> DVec3 {
        self.positions[y * TILE_GRID + x]
    }

    pub fn normal(&self, x: usize, y: usize) -> DVec3 {
        self.normals[y * TILE_GRID + x]
    }

    pub fn color(&self, x: usize, y: usize) -> Vec3 {
        self.colors[y * TILE_GRID + x]
    }

    pub fn uv(&self, x: usize, y: usize) -> Vec2 {
        self.uv[y * TILE_GRID + x]
    }

    /// Void-clamped elevation in metres at grid cell `(x, y)`.
    pub fn elevation(&self, x: usize, y: usize) -> i32 {
        self.elevations[y * TILE_GRID + x]
    }

    /// Flat accessor used by draw emission (strip tables index 0..81).
    pub fn vertex(&self, index: usize) -> (DVec3, DVec3, Vec3, Vec2) {
        (
            self.positions[index],
            self.normals[index],
            self.colors[index],
            self.uv[index],
        )
    }

    /// Sea-sphere points used for closest-vertex queries.
    pub fn sphere_points(&self) -> &[DVec3; POINT_COUNT] {
        &self.sphere
    }

    /// Skirt corner point/normal at `(ix, iy)` on the 3×3 corner grid.
    pub fn skirt_corner(&self, ix: usize, iy: usize) -> (DVec3, DVec3) {
        (self.skirt_points[iy * 3 + ix], self.skirt_normals[iy * 3 + ix])
    }

    /// Composited 32×32 RGB image, row-major from the top-left.
    pub fn texture(&self) -> &[Texel] {
        &self.texture
    }

    /// GPU texture handle; zero until first bound by the renderer.
    pub fn texture_handle(&self) -> TextureHandle {
        self.texture_handle.load(Ordering::Acquire)
    }

    /// Record the handle the renderer created for this tile's texture.
    pub fn set_texture_handle(&self, handle: TextureHandle) {
        self.texture_handle.store(handle, Ordering::Release);
    }

    /// Texture edge length in pixels.
    pub fn texture_size(&self) -> usize {
        TEXTURE_SIZE
    }
}

/// Unit normal of the plane spanned by `a` and `b`.
fn plane_normal(a: DVec3, b: DVec3) -> DVec3 {
    a.cross(b).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, DatasetLayout};

    #[test]
    fn empty_dataset_builds_sea_tile() {
        let dataset = Dataset::open(DatasetLayout::with_base("/nonexistent"));
        let reader = TileReader::new(&dataset);
        let tile = TerrainTile::build(&reader, 17.0, 51.0, 0).unwrap();

        assert_eq!(tile.top_left_lon(), 0.0);
        assert_eq!(tile.top_left_lat(), 90.0);
        assert_eq!(tile.lod(), 0);
        for y in 0..TILE_GRID {
            for x in 0..TILE_GRID {
                assert_eq!(tile.elevation(x, y), 0);
                assert_eq!(tile.color(x, y), colormap::SEA);
                let r = tile.position(x, y).length();
                assert!((r - EARTH_RADIUS).abs() < 1e-3);
            }
        }
        for texel in tile.texture() {
            assert_eq!(*texel, Texel::EMPTY);
        }
        assert_eq!(tile.texture_handle(), 0);
    }

    #[test]
    fn snapping_makes_tiles_identical() {
        let dataset = Dataset::open(DatasetLayout::with_base("/nonexistent"));
        let reader = TileReader::new(&dataset);
        let a = TerrainTile::build(&reader, 17.0, 51.0, 2).unwrap();
        let b = TerrainTile::build(&reader, 29.9, 46.0, 2).unwrap();
        assert_eq!(a.top_left_lon(), b.top_left_lon());
        assert_eq!(a.top_left_lat(), b.top_left_lat());
    }

    #[test]
    fn must_show_distance_is_an_eighth_arc() {
        let dataset = Dataset::open(DatasetLayout::with_base("/nonexistent"));
        let reader = TileReader::new(&dataset);
        let tile = TerrainTile::build(&reader, 0.0, 90.0, 0).unwrap();
        let expected = 60.0 / 8.0 / 360.0 * EARTH_CIRCUMFERENCE;
        assert!((tile.must_show_distance() - expected).abs() < 1e-6);
    }

    #[test]
    fn uv_insets_avoid_texture_border() {
        let dataset = Dataset::open(DatasetLayout::with_base("/nonexistent"));
        let reader = TileReader::new(&dataset);

        let coarse = TerrainTile::build(&reader, 100.0, 10.0, 5).unwrap();
        assert!((coarse.uv(0, 0).x - 0.0135).abs() < 1e-6);
        assert!((coarse.uv(8, 8).y - 0.9865).abs() < 1e-6);

        // Above LOD 10 the window subsamples the band-10 parent.
        let fine = TerrainTile::build(&reader, 100.0, 10.0, 12).unwrap();
        let span = fine.uv(8, 0).x - fine.uv(0, 0).x;
        assert!(span < 0.973 / 4.0 + 1e-6);
        assert!(span > 0.0);
    }

    #[test]
    fn sea_normals_point_outward() {
        let dataset = Dataset::open(DatasetLayout::with_base("/nonexistent"));
        let reader = TileReader::new(&dataset);
        let tile = TerrainTile::build(&reader, 20.0, 40.0, 3).unwrap();

        for y in 0..TILE_GRID {
            for x in 0..TILE_GRID {
                let up = tile.position(x, y).normalize();
                let n = tile.normal(x, y);
                assert!(n.dot(up) > 0.9, "normal at ({x},{y}) leans {:?}", n.dot(up));
            }
        }
    }
}
