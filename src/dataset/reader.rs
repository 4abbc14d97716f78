//! Tile synthesis from the source pyramids.
//!
//! One call assembles everything a tile needs from disk: the 9×9 elevation
//! block at the LOD's stride, ghost samples from the eight neighbouring
//! tiles (read from whatever source files those fall into, clamped to zero
//! past the poles), and the 32×32 texture composited from up to four
//! 45°-aligned source tiles. Missing source files contribute zero
//! elevation and the empty colour — data absence, never an error.

use std::io;
use std::path::PathBuf;

use super::bands::{
    self, TextureBand, TEXTURE_DEGREE_SIZE, TEXTURE_MAX_LOD, TEXTURE_SIZE, TILE_GRID,
};
use super::hgt::HeightFile;
use super::raw::{RawTextureFile, Texel};
use super::Dataset;
use crate::math;

/// Number of vertices in a tile's elevation grid.
pub const POINT_COUNT: usize = TILE_GRID * TILE_GRID;

/// Ghost elevations sampled one grid step outside the tile.
#[derive(Debug, Clone, Default)]
pub struct GhostHeights {
    pub nw: i32,
    pub ne: i32,
    pub sw: i32,
    pub se: i32,
    pub north: [i32; TILE_GRID],
    pub east: [i32; TILE_GRID],
    pub south: [i32; TILE_GRID],
    pub west: [i32; TILE_GRID],
}

/// Raw material for one tile: elevations, ghost ring, texture.
pub struct TileSource {
    pub heights: [i32; POINT_COUNT],
    pub ghosts: GhostHeights,
    pub texture: Vec<Texel>,
}

/// Reads and assembles tile source data from a scanned [`Dataset`].
pub struct TileReader<'a> {
    dataset: &'a Dataset,
}

impl<'a> TileReader<'a> {
    pub fn new(dataset: &'a Dataset) -> TileReader<'a> {
        TileReader { dataset }
    }

    /// Load everything for the tile with the given snapped top-left corner.
    pub fn load_tile(&self, tl_lon: f64, tl_lat: f64, lod: u8) -> io::Result<TileSource> {
        let mut source = TileSource {
            heights: [0; POINT_COUNT],
            ghosts: GhostHeights::default(),
            texture: vec![Texel::EMPTY; TEXTURE_SIZE * TEXTURE_SIZE],
        };

        self.read_heights(tl_lon, tl_lat, lod, &mut source)?;
        self.composite_texture(tl_lon, tl_lat, lod, &mut source.texture)?;

        Ok(source)
    }

    fn read_heights(
        &self,
        tl_lon: f64,
        tl_lat: f64,
        lod: u8,
        source: &mut TileSource,
    ) -> io::Result<()> {
        let step = bands::lod_degree_size(lod);

        // Main block.
        let main = self.dataset.resolve_height(tl_lon, tl_lat, lod);
        if let Some(path) = &main.path {
            let mut file = HeightFile::open(path, main.grid_size)?;
            file.height_block(
                &mut source.heights,
                main.x,
                main.y,
                TILE_GRID,
                TILE_GRID,
                main.skip,
            )?;
        }

        // Corner ghosts. A neighbouring tile's row 7 / column 1 adjoin this
        // tile's boundary ring; past a pole the sample is zero.
        source.ghosts.nw = self.ghost_point(tl_lon - step, tl_lat + step, lod, 7, 7)?;
        source.ghosts.ne = self.ghost_point(tl_lon + step, tl_lat + step, lod, 1, 7)?;
        source.ghosts.se = self.ghost_point(tl_lon + step, tl_lat - step, lod, 1, 1)?;
        source.ghosts.sw = self.ghost_point(tl_lon - step, tl_lat - step, lod, 7, 1)?;

        // Edge ghost lines.
        self.ghost_line(tl_lon, tl_lat + step, lod, GhostEdge::North, &mut source.ghosts.north)?;
        self.ghost_line(tl_lon + step, tl_lat, lod, GhostEdge::East, &mut source.ghosts.east)?;
        self.ghost_line(tl_lon, tl_lat - step, lod, GhostEdge::South, &mut source.ghosts.south)?;
        self.ghost_line(tl_lon - step, tl_lat, lod, GhostEdge::West, &mut source.ghosts.west)?;

        Ok(())
    }

    /// Single ghost sample at cell `(cx, cy)` of the neighbour tile.
    fn ghost_point(&self, lon: f64, lat: f64, lod: u8, cx: usize, cy: usize) -> io::Result<i32> {
        if lat > 90.0 || lat <= -90.0 {
            return Ok(0);
        }
        let lon = math::wrap_lon(lon);
        let source = self.dataset.resolve_height(lon, lat, lod);
        match &source.path {
            Some(path) => {
                let mut file = HeightFile::open(path, source.grid_size)?;
                file.height_at(source.x + cx * source.skip, source.y + cy * source.skip)
            }
            None => Ok(0),
        }
    }

    /// Nine ghost samples along one edge of the neighbour tile.
    fn ghost_line(
        &self,
        lon: f64,
        lat: f64,
        lod: u8,
        edge: GhostEdge,
        out: &mut [i32; TILE_GRID],
    ) -> io::Result<()> {
        if lat > 90.0 || lat <= -90.0 {
            out.fill(0);
            return Ok(());
        }
        let lon = math::wrap_lon(lon);
        let source = self.dataset.resolve_height(lon, lat, lod);
        let Some(path) = &source.path else {
            out.fill(0);
            return Ok(());
        };

        let mut file = HeightFile::open(path, source.grid_size)?;
        for (i, slot) in out.iter_mut().enumerate() {
            let (cx, cy) = match edge {
                GhostEdge::North => (i, 7),
                GhostEdge::East => (1, i),
                GhostEdge::South => (i, 1),
                GhostEdge::West => (7, i),
            };
            *slot = file.height_at(source.x + cx * source.skip, source.y + cy * source.skip)?;
        }
        Ok(())
    }

    /// Composite the 32×32 texture from up to four 45° source tiles.
    fn composite_texture(
        &self,
        tl_lon: f64,
        tl_lat: f64,
        lod: u8,
        out: &mut [Texel],
    ) -> io::Result<()> {
        let Some(placement) = self.find_texture_files(tl_lon, tl_lat, lod) else {
            out.fill(Texel::EMPTY);
            return Ok(());
        };

        let band = TextureBand::for_lod(lod);
        let px_size = band.pixel_size();
        let skip = TextureBand::pixel_skip(lod);
        // Negative skip marks LODs finer than the band: read a stride-1
        // window, the tile's UVs do the subsampling.
        let stride = if skip < 0 { 1 } else { skip as usize };

        let in_base_lon = (px_size - placement.offset_lon) / stride;
        let in_base_lat = (px_size - placement.offset_lat) / stride;
        let base_stop_lon = in_base_lon.min(TEXTURE_SIZE);
        let base_stop_lat = in_base_lat.min(TEXTURE_SIZE);
        let neighbor_stop_lon = TEXTURE_SIZE - base_stop_lon;
        let neighbor_stop_lat = TEXTURE_SIZE - base_stop_lat;

        // Quadrants: (source file, destination origin, copy extent, source origin).
        let quads = [
            (
                0usize,
                (0usize, 0usize),
                (base_stop_lon, base_stop_lat),
                (placement.offset_lon, placement.offset_lat),
            ),
            (
                1,
                (base_stop_lon, 0),
                (neighbor_stop_lon, base_stop_lat),
                (0, placement.offset_lat),
            ),
            (
                2,
                (0, base_stop_lat),
                (base_stop_lon, neighbor_stop_lat),
                (placement.offset_lon, 0),
            ),
            (
                3,
                (base_stop_lon, base_stop_lat),
                (neighbor_stop_lon, neighbor_stop_lat),
                (0, 0),
            ),
        ];

        for (slot, (dst_x, dst_y), (count_x, count_y), (src_x, src_y)) in quads {
            let mut file = match &placement.files[slot] {
                Some(path) => Some(RawTextureFile::open(path, px_size)?),
                None => None,
            };
            for y in 0..count_y {
                for x in 0..count_x {
                    let texel = match &mut file {
                        Some(file) => file.texel_at(src_x + x * stride, src_y + y * stride)?,
                        None => Texel::EMPTY,
                    };
                    out[(dst_y + y) * TEXTURE_SIZE + (dst_x + x)] = texel;
                }
            }
        }

        Ok(())
    }

    /// Locate the 2×2 block of 45° texture files under the tile and the
    /// tile's pixel offset inside the base (north-west) file. `None` when
    /// no file of the block is present.
    fn find_texture_files(&self, tl_lon: f64, tl_lat: f64, lod: u8) -> Option<TexturePlacement> {
        let band = TextureBand::for_lod(lod);
        let map = self.dataset.textures(band);
        let px_size = band.pixel_size() as f64;

        // Snap to the deepest natively-textured LOD grid, then to the
        // texture grid; the degree delta positions the window.
        let window_lod = lod.min(TEXTURE_MAX_LOD);
        let (hgt_lon, hgt_lat) =
            math::snap_top_left(tl_lon, tl_lat, bands::lod_degree_size(window_lod));
        let (tex_lon, tex_lat) = math::snap_top_left(hgt_lon, hgt_lat, TEXTURE_DEGREE_SIZE);

        let delta_lon = (hgt_lon - tex_lon).abs();
        let delta_lat = (hgt_lat - tex_lat).abs();
        let offset_lon = (delta_lon / TEXTURE_DEGREE_SIZE * px_size + 0.5) as usize;
        let offset_lat = (delta_lat / TEXTURE_DEGREE_SIZE * px_size + 0.5) as usize;

        let rows = math::grid_height(TEXTURE_DEGREE_SIZE);
        let mut files: [Option<PathBuf>; 4] = [None, None, None, None];
        let mut any = false;
        for y in 0..2 {
            let lat = tex_lat - y as f64 * TEXTURE_DEGREE_SIZE;
            if (90.0 - lat) / TEXTURE_DEGREE_SIZE >= rows as f64 {
                continue; // past the south pole
            }
            for x in 0..2 {
                let lon = tex_lon + x as f64 * TEXTURE_DEGREE_SIZE;
                if let Some(name) = map.lookup(lon, lat) {
                    files[y * 2 + x] =
                        Some(self.dataset.layout().texture_dir(band).join(name));
                    any = true;
                }
            }
        }

        any.then_some(TexturePlacement {
            files,
            offset_lon,
            offset_lat,
        })
    }
}

enum GhostEdge {
    North,
    East,
    South,
    West,
}

struct TexturePlacement {
    files: [Option<PathBuf>; 4],
    offset_lon: usize,
    offset_lat: usize,
}
