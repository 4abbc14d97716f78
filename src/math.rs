//! Geographic and spherical coordinate math.
//!
//! Longitude is normalized to [0, 360) and latitude to [-90, +90]; the
//! "top-left" of a tile is its lowest longitude / highest latitude corner.
//! Grid math works in a y-down frame (`grid_y = 90 - lat`) so that flooring
//! snaps toward the top-left on every hemisphere.

use glam::DVec3;

/// Mean Earth radius in metres (sphere model, matches the dataset's datum).
pub const EARTH_RADIUS: f64 = 6_378_100.0;

/// Earth circumference in metres, used for arc-length distances.
pub const EARTH_CIRCUMFERENCE: f64 = 40_074_784.208;

/// One kilometre in metres.
pub const KM: f64 = 1_000.0;

/// One thousand kilometres in metres.
pub const GM: f64 = 1_000_000.0;

/// Convert geographic spherical coordinates to Earth-centered Cartesian.
///
/// `lon`/`lat` in degrees, `radius` in metres from the planet center. The
/// frame puts +y through the north pole and +z through (lon 0, lat 0).
pub fn cartesian_from_spherical(lon: f64, lat: f64, radius: f64) -> DVec3 {
    let lon_r = lon.to_radians();
    let lat_r = lat.to_radians();
    DVec3::new(
        radius * lon_r.sin() * lat_r.cos(),
        radius * lat_r.sin(),
        radius * lon_r.cos() * lat_r.cos(),
    )
}

/// Recover `(lon, lat, radius)` from an Earth-centered Cartesian point.
pub fn spherical_from_cartesian(p: DVec3) -> (f64, f64, f64) {
    let radius = p.length();
    let lat = (p.y / radius).asin().to_degrees();
    let lon = angle_from_cartesian(p.z, p.x);
    (lon, lat, radius)
}

/// Quadrant-exact angle in degrees [0, 360) of the planar vector `(x, y)`.
///
/// Degenerate vectors shorter than 1 mm are clamped so the division stays
/// finite; the returned angle for those is meaningless but bounded.
pub fn angle_from_cartesian(x: f64, y: f64) -> f64 {
    let len = (x * x + y * y).sqrt().max(0.001);

    if x >= 0.0 && y >= 0.0 {
        (y / len).asin().to_degrees()
    } else if x < 0.0 && y >= 0.0 {
        (-x / len).asin().to_degrees() + 90.0
    } else if x < 0.0 && y < 0.0 {
        (-y / len).asin().to_degrees() + 180.0
    } else {
        (x / len).asin().to_degrees() + 270.0
    }
}

/// Normalize a longitude into [0, 360).
pub fn wrap_lon(lon: f64) -> f64 {
    let mut lon = lon;
    if lon >= 360.0 {
        lon -= 360.0;
    }
    if lon < 0.0 {
        lon += 360.0;
    }
    lon
}

/// Snap `(lon, lat)` to the top-left corner of its cell on the `degree_size`
/// grid. Snapping is idempotent: a snapped corner snaps to itself.
pub fn snap_top_left(lon: f64, lat: f64, degree_size: f64) -> (f64, f64) {
    let grid_x = wrap_lon(lon);
    let grid_y = 90.0 - lat;

    let snapped_x = (grid_x / degree_size).floor() * degree_size;
    let snapped_y = (grid_y / degree_size).floor() * degree_size;

    (snapped_x, 90.0 - snapped_y)
}

/// Number of grid columns at `degree_size`.
pub fn grid_width(degree_size: f64) -> usize {
    (360.0 / degree_size + 0.5) as usize
}

/// Number of grid rows at `degree_size`.
pub fn grid_height(degree_size: f64) -> usize {
    (180.0 / degree_size + 0.5) as usize
}

/// Availability-map index of a snapped top-left corner.
///
/// The input must already lie on the grid; the +0.5 rounding only absorbs
/// floating error from the snap, not arbitrary positions.
pub fn index_from_top_left(tl_lon: f64, tl_lat: f64, degree_size: f64) -> usize {
    let grid_x = wrap_lon(tl_lon);
    let grid_y = 90.0 - tl_lat;

    let ix = (grid_x / degree_size + 0.5) as usize;
    let iy = (grid_y / degree_size + 0.5) as usize;

    iy * grid_width(degree_size) + ix
}

/// Top-left corner of the cell at `index` on the `degree_size` grid.
pub fn top_left_from_index(index: usize, degree_size: f64) -> (f64, f64) {
    let width = grid_width(degree_size);
    let ix = index % width;
    let iy = index / width;

    (ix as f64 * degree_size, 90.0 - iy as f64 * degree_size)
}

/// Index of the cell `(dx, dy)` steps away from `base`, wrapping in
/// longitude and returning `None` past either pole.
pub fn neighbor_index(base: usize, degree_size: f64, dx: i32, dy: i32) -> Option<usize> {
    let width = grid_width(degree_size) as i32;
    let height = grid_height(degree_size) as i32;

    let base_x = base as i32 % width;
    let base_y = base as i32 / width;

    let mut nx = base_x + dx;
    let ny = base_y + dy;

    if nx < 0 {
        nx += width;
    }
    if nx >= width {
        nx -= width;
    }

    if ny < 0 || ny >= height {
        return None;
    }

    Some((ny * width + nx) as usize)
}
