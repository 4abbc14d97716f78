//! On-disk dataset: layout, availability, and tile synthesis.
//!
//! The dataset is a directory tree of fixed-layout height and texture
//! pyramids plus an optional SRTM native band. [`DatasetLayout`] names the
//! directories (serde-deserializable so deployments can relocate bands);
//! [`Dataset`] scans them once into immutable availability maps and
//! resolves tile requests to concrete files and in-file positions.

pub mod availability;
pub mod bands;
pub mod filename;
pub mod hgt;
pub mod raw;
pub mod reader;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math;
use availability::AvailabilityMap;
use bands::{HeightBand, TextureBand, SRTM_DEGREE_SIZE, SRTM_GRID_SIZE, TEXTURE_DEGREE_SIZE};

/// Directory layout of a dataset installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLayout {
    /// Root of the dataset tree; all other paths are relative to it.
    pub base_dir: PathBuf,
    #[serde(default = "default_heights_l00_l03")]
    pub heights_l00_l03: PathBuf,
    #[serde(default = "default_heights_l04_l08")]
    pub heights_l04_l08: PathBuf,
    #[serde(default = "default_heights_l09_l13")]
    pub heights_l09_l13: PathBuf,
    #[serde(default = "default_srtm")]
    pub srtm: PathBuf,
    #[serde(default = "default_textures_l00_l02")]
    pub textures_l00_l02: PathBuf,
    #[serde(default = "default_textures_l03_l05")]
    pub textures_l03_l05: PathBuf,
    #[serde(default = "default_textures_l06_l08")]
    pub textures_l06_l08: PathBuf,
    #[serde(default = "default_textures_l09_l10")]
    pub textures_l09_l10: PathBuf,
    /// Points-of-interest file, `lon;lat;alt;name` per line.
    #[serde(default = "default_points_file")]
    pub points_file: PathBuf,
}

fn default_heights_l00_l03() -> PathBuf {
    PathBuf::from("L00-L03")
}
fn default_heights_l04_l08() -> PathBuf {
    PathBuf::from("L04-L08")
}
fn default_heights_l09_l13() -> PathBuf {
    PathBuf::from("L09-L13")
}
fn default_srtm() -> PathBuf {
    PathBuf::from("NASA_SRTM")
}
fn default_textures_l00_l02() -> PathBuf {
    PathBuf::from("Textures/L00_L02")
}
fn default_textures_l03_l05() -> PathBuf {
    PathBuf::from("Textures/L03_L05")
}
fn default_textures_l06_l08() -> PathBuf {
    PathBuf::from("Textures/L06_L08")
}
fn default_textures_l09_l10() -> PathBuf {
    PathBuf::from("Textures/L09_L10")
}
fn default_points_file() -> PathBuf {
    PathBuf::from("earthPoints.txt")
}

impl DatasetLayout {
    /// Standard layout rooted at `base_dir`.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> DatasetLayout {
        DatasetLayout {
            base_dir: base_dir.into(),
            heights_l00_l03: default_heights_l00_l03(),
            heights_l04_l08: default_heights_l04_l08(),
            heights_l09_l13: default_heights_l09_l13(),
            srtm: default_srtm(),
            textures_l00_l02: default_textures_l00_l02(),
            textures_l03_l05: default_textures_l03_l05(),
            textures_l06_l08: default_textures_l06_l08(),
            textures_l09_l10: default_textures_l09_l10(),
            points_file: default_points_file(),
        }
    }

    /// Load a layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<DatasetLayout> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Directory of a height band.
    pub fn height_dir(&self, band: HeightBand) -> PathBuf {
        let sub = match band {
            HeightBand::L00L03 => &self.heights_l00_l03,
            HeightBand::L04L08 => &self.heights_l04_l08,
            HeightBand::L09L13 => &self.heights_l09_l13,
        };
        self.base_dir.join(sub)
    }

    /// Directory of a texture band.
    pub fn texture_dir(&self, band: TextureBand) -> PathBuf {
        let sub = match band {
            TextureBand::L00L02 => &self.textures_l00_l02,
            TextureBand::L03L05 => &self.textures_l03_l05,
            TextureBand::L06L08 => &self.textures_l06_l08,
            TextureBand::L09L10 => &self.textures_l09_l10,
        };
        self.base_dir.join(sub)
    }

    /// Directory of the SRTM native band.
    pub fn srtm_dir(&self) -> PathBuf {
        self.base_dir.join(&self.srtm)
    }

    /// Full path of the points-of-interest file.
    pub fn points_path(&self) -> PathBuf {
        self.base_dir.join(&self.points_file)
    }
}

/// A resolved height read: where the tile's block lives inside which file.
///
/// `path` is `None` when the source tile is absent; positions are computed
/// regardless so ghost reads can share the arithmetic.
#[derive(Debug, Clone)]
pub struct HeightSource {
    pub path: Option<PathBuf>,
    pub x: usize,
    pub y: usize,
    pub skip: usize,
    pub grid_size: usize,
}

/// Scanned dataset: layout plus one immutable availability map per band.
pub struct Dataset {
    layout: DatasetLayout,
    heights: [AvailabilityMap; 3],
    textures: [AvailabilityMap; 4],
    srtm: AvailabilityMap,
}

impl Dataset {
    /// Scan every band directory under the layout.
    pub fn open(layout: DatasetLayout) -> Dataset {
        let heights = HeightBand::ALL.map(|band| {
            AvailabilityMap::scan(
                &layout.height_dir(band),
                band.degree_size(),
                "hgt",
                band.file_len(),
                filename::decode_tile_name,
            )
        });
        let textures = TextureBand::ALL.map(|band| {
            AvailabilityMap::scan(
                &layout.texture_dir(band),
                TEXTURE_DEGREE_SIZE,
                "raw",
                band.file_len(),
                filename::decode_tile_name,
            )
        });
        let srtm = AvailabilityMap::scan(
            &layout.srtm_dir(),
            SRTM_DEGREE_SIZE,
            "hgt",
            (SRTM_GRID_SIZE * SRTM_GRID_SIZE * 2) as u64,
            filename::decode_srtm_name,
        );

        log::info!(
            "dataset scan: heights {}/{}/{}, textures {}/{}/{}/{}, srtm {}",
            heights[0].present_count(),
            heights[1].present_count(),
            heights[2].present_count(),
            textures[0].present_count(),
            textures[1].present_count(),
            textures[2].present_count(),
            textures[3].present_count(),
            srtm.present_count(),
        );

        Dataset {
            layout,
            heights,
            textures,
            srtm,
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Presence map of a height band.
    pub fn heights(&self, band: HeightBand) -> &AvailabilityMap {
        &self.heights[band.index()]
    }

    /// Presence map of a texture band.
    pub fn textures(&self, band: TextureBand) -> &AvailabilityMap {
        match band {
            TextureBand::L00L02 => &self.textures[0],
            TextureBand::L03L05 => &self.textures[1],
            TextureBand::L06L08 => &self.textures[2],
            TextureBand::L09L10 => &self.textures[3],
        }
    }

    /// Presence map of the SRTM native band (not consulted by synthesis).
    pub fn srtm(&self) -> &AvailabilityMap {
        &self.srtm
    }

    /// Resolve the source file and in-file block position serving
    /// `(lon, lat)` at `lod`.
    pub fn resolve_height(&self, lon: f64, lat: f64, lod: u8) -> HeightSource {
        let band = HeightBand::for_lod(lod);
        let grid_size = band.grid_size();
        let skip = band.pixel_skip(lod);

        // Top-left of the source file, then of the tile on the LOD grid;
        // the delta between them positions the block inside the file.
        let (file_lon, file_lat) = math::snap_top_left(lon, lat, band.degree_size());
        let (tile_lon, tile_lat) = math::snap_top_left(lon, lat, bands::lod_degree_size(lod));

        let delta_lon = tile_lon - file_lon;
        let delta_lat = file_lat - tile_lat;
        let x = (delta_lon / band.degree_size() * (grid_size - 1) as f64) as usize;
        let y = (delta_lat / band.degree_size() * (grid_size - 1) as f64) as usize;

        let path = self
            .heights[band.index()]
            .lookup(file_lon, file_lat)
            .map(|name| self.layout.height_dir(band).join(name));

        HeightSource {
            path,
            x,
            y,
            skip,
            grid_size,
        }
    }
}
