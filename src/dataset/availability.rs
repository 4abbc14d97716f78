//! Per-band source-file presence maps.
//!
//! One dense map per source pyramid, indexed by geographic grid cell at the
//! band's degree size. Built once at startup by scanning the band's
//! directory; an entry is accepted only when its extension matches and its
//! byte size equals the band's expected size exactly, so truncated or
//! foreign files never reach the readers. Immutable after the scan.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::math;

/// Presence map for one source band.
#[derive(Debug, Clone)]
pub struct AvailabilityMap {
    degree_size: f64,
    width: usize,
    entries: Vec<Option<String>>,
}

impl AvailabilityMap {
    /// Empty map covering the full globe at `degree_size`.
    pub fn new(degree_size: f64) -> AvailabilityMap {
        let width = math::grid_width(degree_size);
        let height = math::grid_height(degree_size);
        AvailabilityMap {
            degree_size,
            width,
            entries: vec![None; width * height],
        }
    }

    /// Build a map by scanning `dir` for files with the given extension and
    /// exact byte length, decoding each name with `decode` (which returns
    /// the tile's top-left corner).
    ///
    /// A missing directory yields an empty map — an absent band is data
    /// absence, not an error. Entries that fail the gate are skipped with a
    /// debug log; undecodable names are warned about since they usually
    /// mean a misplaced file.
    pub fn scan(
        dir: &Path,
        degree_size: f64,
        extension: &str,
        expected_len: u64,
        decode: impl Fn(&str) -> Result<(f64, f64)>,
    ) -> AvailabilityMap {
        let mut map = AvailabilityMap::new(degree_size);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => {
                log::debug!("source band directory {} not present", dir.display());
                return map;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if len != expected_len {
                log::debug!(
                    "skipping {name}: {len} bytes, expected {expected_len}"
                );
                continue;
            }
            match decode(name) {
                Ok((tl_lon, tl_lat)) => {
                    let index = math::index_from_top_left(tl_lon, tl_lat, degree_size);
                    map.set(index, name.to_string());
                }
                Err(err) => log::warn!("unrecognized file in {}: {err}", dir.display()),
            }
        }

        map
    }

    /// Degree size of one grid cell.
    pub fn degree_size(&self) -> f64 {
        self.degree_size
    }

    /// Mark the cell at `index` as present with the given source filename.
    pub fn set(&mut self, index: usize, name: String) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = Some(name);
        }
    }

    /// Source filename for the cell at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).and_then(|e| e.as_deref())
    }

    /// Source filename for the cell containing the snapped corner.
    pub fn lookup(&self, tl_lon: f64, tl_lat: f64) -> Option<&str> {
        self.get(math::index_from_top_left(tl_lon, tl_lat, self.degree_size))
    }

    /// Number of present cells.
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Total cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.entries.len()
    }
}
