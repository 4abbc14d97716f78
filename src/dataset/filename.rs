//! Tile filename codecs.
//!
//! Two conventions coexist in the dataset:
//!
//! - Composite pyramid: `[NS]LL.LL,[EW]LLL.LL.hgt` (or `.raw`) with two
//!   decimal places, naming the tile's *top-left* corner.
//! - SRTM native: `[NS]LL[EW]LLL.hgt` with integer degrees, naming the
//!   *lower-left* corner; decoding therefore adds 1° of latitude.
//!
//! Longitudes at or past the antimeridian are written as `W(360 - lon)`.
//! Both directions round-trip exactly for every name the encoders emit.

use crate::error::{Error, Result};

/// Encode a composite-pyramid tile name from its top-left corner.
pub fn encode_tile_name(tl_lon: f64, tl_lat: f64, extension: &str) -> String {
    let (lon_side, lon_value) = if tl_lon >= 180.0 {
        ('W', 360.0 - tl_lon)
    } else {
        ('E', tl_lon)
    };
    let (lat_side, lat_value) = if tl_lat >= 0.0 {
        ('N', tl_lat)
    } else {
        ('S', -tl_lat)
    };

    format!("{lat_side}{lat_value:05.2},{lon_side}{lon_value:06.2}.{extension}")
}

/// Decode a composite-pyramid tile name back to its top-left corner.
pub fn decode_tile_name(name: &str) -> Result<(f64, f64)> {
    let stem = name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(name);
    let bad = || Error::InvalidFilename(name.to_string());

    let (lat_part, lon_part) = stem.split_once(',').ok_or_else(bad)?;
    if lat_part.len() != 6 || lon_part.len() != 7 {
        return Err(bad());
    }

    let lat_side = lat_part.as_bytes()[0];
    let lon_side = lon_part.as_bytes()[0];
    let mut lat: f64 = lat_part[1..].parse().map_err(|_| bad())?;
    let mut lon: f64 = lon_part[1..].parse().map_err(|_| bad())?;

    match lon_side {
        b'E' => {}
        b'W' => lon = 360.0 - lon,
        _ => return Err(bad()),
    }
    match lat_side {
        b'N' => {}
        b'S' => lat = -lat,
        _ => return Err(bad()),
    }

    Ok((lon, lat))
}

/// Encode an SRTM native tile name from the tile's top-left corner.
pub fn encode_srtm_name(tl_lon: f64, tl_lat: f64) -> String {
    let (lon_side, lon_value) = if tl_lon >= 180.0 {
        ('W', 360.0 - tl_lon)
    } else {
        ('E', tl_lon)
    };
    // SRTM names carry the lower-left corner, one degree south of ours.
    let lower_lat = tl_lat - 1.0;
    let (lat_side, lat_value) = if lower_lat >= 0.0 {
        ('N', lower_lat)
    } else {
        ('S', -lower_lat)
    };

    format!("{lat_side}{lat_value:02.0}{lon_side}{lon_value:03.0}.hgt")
}

/// Decode an SRTM native tile name to the tile's top-left corner.
pub fn decode_srtm_name(name: &str) -> Result<(f64, f64)> {
    let stem = name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(name);
    let bad = || Error::InvalidFilename(name.to_string());

    if stem.len() != 7 {
        return Err(bad());
    }
    let lat_side = stem.as_bytes()[0];
    let lon_side = stem.as_bytes()[3];
    let mut lat: f64 = stem[1..3].parse().map_err(|_| bad())?;
    let mut lon: f64 = stem[4..7].parse().map_err(|_| bad())?;

    match lon_side {
        b'E' => {}
        b'W' => lon = 360.0 - lon,
        _ => return Err(bad()),
    }
    match lat_side {
        b'N' => {}
        b'S' => lat = -lat,
        _ => return Err(bad()),
    }

    Ok((lon, lat + 1.0))
}
