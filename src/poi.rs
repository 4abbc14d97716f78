//! Points-of-interest file.
//!
//! Line-oriented UTF-8, one `lon;lat;altMetersAboveRadius;name` record per
//! line. Altitudes are stored relative to the datum radius on disk and
//! absolute (radius from the planet center) in memory.

use std::fs;
use std::io::Write;
use std::path::Path;

use glam::DVec3;

use crate::error::{Error, Result};
use crate::math::{self, EARTH_RADIUS};

/// A named surface point.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthPoint {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Eye radius from the planet center, metres.
    pub alt: f64,
    /// Cartesian position derived from the spherical fields.
    pub position: DVec3,
}

impl EarthPoint {
    /// Point at `(lon, lat)`, `alt_above_radius` metres above the datum.
    pub fn new(name: impl Into<String>, lon: f64, lat: f64, alt_above_radius: f64) -> EarthPoint {
        let alt = EARTH_RADIUS + alt_above_radius;
        EarthPoint {
            name: name.into(),
            lon,
            lat,
            alt,
            position: math::cartesian_from_spherical(lon, lat, alt),
        }
    }
}

/// Load a points file. A missing file is an empty list; a malformed line
/// is an error naming the line.
pub fn load_points(path: &Path) -> Result<Vec<EarthPoint>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut points = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: &str| Error::MalformedPointsFile {
            path: path.to_path_buf(),
            line: index + 1,
            reason: reason.to_string(),
        };

        let mut fields = line.splitn(4, ';');
        let lon: f64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| malformed("bad longitude"))?;
        let lat: f64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| malformed("bad latitude"))?;
        let alt: f64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| malformed("bad altitude"))?;
        let name = fields.next().ok_or_else(|| malformed("missing name"))?;

        points.push(EarthPoint::new(name, lon, lat, alt));
    }
    Ok(points)
}

/// Write a points file in the same `lon;lat;alt;name` form.
pub fn save_points(path: &Path, points: &[EarthPoint]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    for point in points {
        writeln!(
            file,
            "{:.6};{:.6};{:.3};{}",
            point.lon,
            point.lat,
            point.alt - EARTH_RADIUS,
            point.name
        )?;
    }
    Ok(())
}

/// Insert keeping the list sorted by name; returns the insertion index.
pub fn insert_sorted(points: &mut Vec<EarthPoint>, point: EarthPoint) -> usize {
    let index = points
        .binary_search_by(|probe| probe.name.cmp(&point.name))
        .unwrap_or_else(|i| i);
    points.insert(index, point);
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("terrastream-poi-{tag}-{}.txt", std::process::id()))
    }

    #[test]
    fn round_trips_through_disk() {
        let path = scratch_file("roundtrip");
        let points = vec![
            EarthPoint::new("Wroclaw", 17.038, 51.102, 120.0),
            EarthPoint::new("Tatry; south face", 20.088333, 49.179444, 2_503.0),
        ];
        save_points(&path, &points).unwrap();

        let loaded = load_points(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "Wroclaw");
        // Name is the final field, so semicolons inside it survive.
        assert_eq!(loaded[1].name, "Tatry; south face");
        assert!((loaded[1].alt - (EARTH_RADIUS + 2_503.0)).abs() < 1e-3);
        assert!((loaded[0].position - points[0].position).length() < 1e-3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_empty() {
        let points = load_points(Path::new("/nonexistent/earthPoints.txt")).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn malformed_line_is_reported() {
        let path = scratch_file("bad");
        fs::write(&path, "17.0;51.0;not-a-number;X\n").unwrap();
        let err = load_points(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedPointsFile { line: 1, .. }));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn insert_keeps_name_order() {
        let mut points = Vec::new();
        insert_sorted(&mut points, EarthPoint::new("b", 0.0, 0.0, 0.0));
        insert_sorted(&mut points, EarthPoint::new("a", 0.0, 0.0, 0.0));
        let index = insert_sorted(&mut points, EarthPoint::new("ab", 0.0, 0.0, 0.0));
        assert_eq!(index, 1);
        let names: Vec<_> = points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "ab", "b"]);
    }
}
