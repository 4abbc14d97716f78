//! Source-band lookup tables.
//!
//! The on-disk dataset is split into overlapping pyramids with different
//! tile sizes and degree footprints per LOD band. Height bands carry
//! square big-endian elevation grids; texture bands carry raw RGB tiles of
//! a fixed 45° footprint. A per-LOD "pixel skip" maps a source pixel
//! stride onto the requested LOD; texture skips turn negative above the
//! deepest texture LOD, where tiles upsample their band-10 parent instead.

/// Highest LOD the engine materializes.
pub const MAX_LOD: u8 = 13;

/// Vertices along one edge of a materialized tile (9×9 grid).
pub const TILE_GRID: usize = 9;

/// Edge length in pixels of a tile's composited texture.
pub const TEXTURE_SIZE: usize = 32;

/// Degree footprint of every texture source tile, across all bands.
pub const TEXTURE_DEGREE_SIZE: f64 = 45.0;

/// Deepest LOD with its own texture window; above this, tiles subsample
/// the band-10 parent texture through their UVs.
pub const TEXTURE_MAX_LOD: u8 = 10;

/// Fill colour for texels with no source data (RGB 0xEE, 0xFF, 0xEE).
pub const TEXTURE_EMPTY_COLOR: [u8; 3] = [0xEE, 0xFF, 0xEE];

/// Grid edge of an SRTM native tile (1° × 1°).
pub const SRTM_GRID_SIZE: usize = 1201;

/// Degree footprint of an SRTM native tile.
pub const SRTM_DEGREE_SIZE: f64 = 1.0;

/// Degree footprint of a tile at `lod`: 60° at LOD 0, halving per level.
pub fn lod_degree_size(lod: u8) -> f64 {
    60.0 / (1u64 << lod) as f64
}

/// One of the three height source pyramids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeightBand {
    /// LODs 0–3: 60° tiles, 65×65 grid.
    L00L03,
    /// LODs 4–8: 15° tiles, 513×513 grid.
    L04L08,
    /// LODs 9–13: 3.75° tiles, 4097×4097 grid.
    L09L13,
}

impl HeightBand {
    pub const ALL: [HeightBand; 3] = [HeightBand::L00L03, HeightBand::L04L08, HeightBand::L09L13];

    /// Band serving the given LOD.
    pub fn for_lod(lod: u8) -> HeightBand {
        match lod {
            0..=3 => HeightBand::L00L03,
            4..=8 => HeightBand::L04L08,
            _ => HeightBand::L09L13,
        }
    }

    /// Cache-shard index of this band.
    pub fn index(self) -> usize {
        match self {
            HeightBand::L00L03 => 0,
            HeightBand::L04L08 => 1,
            HeightBand::L09L13 => 2,
        }
    }

    /// Grid cells along one edge of a source file.
    pub fn grid_size(self) -> usize {
        match self {
            HeightBand::L00L03 => 65,
            HeightBand::L04L08 => 513,
            HeightBand::L09L13 => 4097,
        }
    }

    /// Degree footprint of a source file.
    pub fn degree_size(self) -> f64 {
        match self {
            HeightBand::L00L03 => 60.0,
            HeightBand::L04L08 => 15.0,
            HeightBand::L09L13 => 3.75,
        }
    }

    /// Deepest LOD this band serves.
    pub fn max_lod(self) -> u8 {
        match self {
            HeightBand::L00L03 => 3,
            HeightBand::L04L08 => 8,
            HeightBand::L09L13 => 13,
        }
    }

    /// Source pixel stride for a tile at `lod` within this band.
    pub fn pixel_skip(self, lod: u8) -> usize {
        1 << (self.max_lod() - lod)
    }

    /// Exact byte length of a well-formed source file (2 bytes per cell).
    pub fn file_len(self) -> u64 {
        let n = self.grid_size() as u64;
        n * n * 2
    }
}

/// One of the four texture source pyramids (all 45° tiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBand {
    /// LODs 0–2: 96×96 px.
    L00L02,
    /// LODs 3–5: 768×768 px.
    L03L05,
    /// LODs 6–8: 6144×6144 px.
    L06L08,
    /// LODs 9–13: 24576×24576 px (band 10 is the deepest native window).
    L09L10,
}

impl TextureBand {
    pub const ALL: [TextureBand; 4] = [
        TextureBand::L00L02,
        TextureBand::L03L05,
        TextureBand::L06L08,
        TextureBand::L09L10,
    ];

    /// Band serving the given LOD.
    pub fn for_lod(lod: u8) -> TextureBand {
        match lod {
            0..=2 => TextureBand::L00L02,
            3..=5 => TextureBand::L03L05,
            6..=8 => TextureBand::L06L08,
            _ => TextureBand::L09L10,
        }
    }

    /// Pixels along one edge of a source file.
    pub fn pixel_size(self) -> usize {
        match self {
            TextureBand::L00L02 => 96,
            TextureBand::L03L05 => 768,
            TextureBand::L06L08 => 6144,
            TextureBand::L09L10 => 24576,
        }
    }

    /// Exact byte length of a well-formed source file (3 bytes per pixel).
    pub fn file_len(self) -> u64 {
        let n = self.pixel_size() as u64;
        n * n * 3
    }

    /// Source pixel stride for a tile at `lod`.
    ///
    /// Positive values downsample the source; 1 copies it; negative values
    /// mark LODs finer than the band's native resolution, where the
    /// compositor reads a stride-1 window and the tile's UVs subsample the
    /// band-10 parent.
    pub fn pixel_skip(lod: u8) -> i32 {
        match lod {
            0..=2 => 1 << (2 - lod),
            3..=5 => 1 << (5 - lod),
            6..=8 => 1 << (8 - lod),
            9 => 2,
            10 => 1,
            11 => -2,
            12 => -4,
            _ => -8,
        }
    }
}
