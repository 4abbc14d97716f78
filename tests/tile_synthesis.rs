//! Tile synthesis against crafted on-disk datasets.
//!
//! Builds small real dataset trees in a temp directory — correctly sized
//! height and texture files with a deterministic global value function —
//! and checks block extraction, ghost-read edge continuity, texture
//! compositing and the all-absent (sea) fallback.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use terrastream::colormap;
use terrastream::dataset::bands::TEXTURE_SIZE;
use terrastream::dataset::filename::encode_tile_name;
use terrastream::dataset::raw::Texel;
use terrastream::dataset::reader::TileReader;
use terrastream::dataset::{Dataset, DatasetLayout};
use terrastream::tile::TerrainTile;

/// Deterministic elevation for a global sample index; files generated
/// from it agree wherever their footprints overlap.
fn global_height(i: i64, j: i64) -> u16 {
    ((i * 7 + j * 13).rem_euclid(800)) as u16
}

fn dataset_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "terrastream-synth-{tag}-{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    root
}

/// Write one 65x65 L00-L03 height file whose samples come from the
/// global value function.
fn write_height_file(root: &Path, tl_lon: f64, tl_lat: f64) {
    let dir = root.join("L00-L03");
    fs::create_dir_all(&dir).unwrap();

    let i0 = (tl_lon / 60.0 * 64.0) as i64;
    let j0 = ((90.0 - tl_lat) / 60.0 * 64.0) as i64;

    let mut bytes = Vec::with_capacity(65 * 65 * 2);
    for j in 0..65i64 {
        for i in 0..65i64 {
            bytes.extend_from_slice(&global_height(i0 + i, j0 + j).to_be_bytes());
        }
    }
    let name = encode_tile_name(tl_lon, tl_lat, "hgt");
    File::create(dir.join(name)).unwrap().write_all(&bytes).unwrap();
}

/// Write one 96x96 texture file with a position-coded texel pattern.
fn write_texture_file(root: &Path, tl_lon: f64, tl_lat: f64) {
    let dir = root.join("Textures/L00_L02");
    fs::create_dir_all(&dir).unwrap();

    let mut bytes = Vec::with_capacity(96 * 96 * 3);
    for y in 0..96u32 {
        for x in 0..96u32 {
            bytes.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8]);
        }
    }
    let name = encode_tile_name(tl_lon, tl_lat, "raw");
    File::create(dir.join(name)).unwrap().write_all(&bytes).unwrap();
}

#[test]
fn block_extraction_follows_the_source_grid() {
    let root = dataset_root("block");
    write_height_file(&root, 0.0, 90.0);

    let dataset = Dataset::open(DatasetLayout::with_base(&root));
    let reader = TileReader::new(&dataset);
    let tile = TerrainTile::build(&reader, 10.0, 80.0, 0).unwrap();

    // A LOD-0 tile spans the whole file at stride 8.
    for y in 0..9 {
        for x in 0..9 {
            let expected = i32::from(global_height(x as i64 * 8, y as i64 * 8));
            assert_eq!(tile.elevation(x, y), expected, "vertex ({x},{y})");
        }
    }

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn adjacent_tiles_share_identical_edges() {
    let root = dataset_root("edges");
    // A 2x2 block of source files around the corner (60E, 30N).
    write_height_file(&root, 0.0, 90.0);
    write_height_file(&root, 60.0, 90.0);
    write_height_file(&root, 0.0, 30.0);
    write_height_file(&root, 60.0, 30.0);

    let dataset = Dataset::open(DatasetLayout::with_base(&root));
    let reader = TileReader::new(&dataset);

    let nw = TerrainTile::build(&reader, 1.0, 89.0, 0).unwrap();
    let ne = TerrainTile::build(&reader, 61.0, 89.0, 0).unwrap();
    let sw = TerrainTile::build(&reader, 1.0, 29.0, 0).unwrap();
    let se = TerrainTile::build(&reader, 61.0, 29.0, 0).unwrap();

    // Shared vertical edge: nw column 8 == ne column 0.
    for y in 0..9 {
        assert_eq!(nw.elevation(8, y), ne.elevation(0, y));
        assert_eq!(nw.position(8, y), ne.position(0, y), "row {y}");
        assert_eq!(nw.normal(8, y), ne.normal(0, y), "normal row {y}");
    }

    // Shared horizontal edge: nw row 8 == sw row 0.
    for x in 0..9 {
        assert_eq!(nw.elevation(x, 8), sw.elevation(x, 0));
        assert_eq!(nw.position(x, 8), sw.position(x, 0), "col {x}");
        assert_eq!(nw.normal(x, 8), sw.normal(x, 0), "normal col {x}");
    }

    // The four-way corner is byte-identical everywhere.
    assert_eq!(nw.position(8, 8), ne.position(0, 8));
    assert_eq!(nw.position(8, 8), sw.position(8, 0));
    assert_eq!(nw.position(8, 8), se.position(0, 0));
    assert_eq!(nw.normal(8, 8), se.normal(0, 0));

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn sibling_tiles_inside_one_file_share_identical_edges() {
    let root = dataset_root("siblings");
    write_height_file(&root, 0.0, 90.0);

    let dataset = Dataset::open(DatasetLayout::with_base(&root));
    let reader = TileReader::new(&dataset);

    // Two LOD-1 tiles drawn from the same source file at stride 4.
    let west = TerrainTile::build(&reader, 1.0, 89.0, 1).unwrap();
    let east = TerrainTile::build(&reader, 31.0, 89.0, 1).unwrap();
    assert_eq!(west.top_left_lon(), 0.0);
    assert_eq!(east.top_left_lon(), 30.0);

    for y in 0..9 {
        assert_eq!(west.elevation(8, y), east.elevation(0, y));
        assert_eq!(west.position(8, y), east.position(0, y), "row {y}");
        assert_eq!(west.normal(8, y), east.normal(0, y), "normal row {y}");
    }

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn texture_composites_base_and_fills_absent_neighbours() {
    let root = dataset_root("texture");
    write_texture_file(&root, 0.0, 90.0);

    let dataset = Dataset::open(DatasetLayout::with_base(&root));
    let reader = TileReader::new(&dataset);
    let tile = TerrainTile::build(&reader, 0.0, 90.0, 0).unwrap();

    let texture = tile.texture();
    // The 60-degree tile window starts at the file origin with stride 4;
    // (96 - 0) / 4 = 24 columns/rows come from the base file.
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let texel = texture[y * TEXTURE_SIZE + x];
            if x < 24 && y < 24 {
                let sx = (x * 4) as u8;
                let sy = (y * 4) as u8;
                assert_eq!(texel, Texel { r: sx, g: sy, b: sx ^ sy }, "texel ({x},{y})");
            } else {
                assert_eq!(texel, Texel::EMPTY, "texel ({x},{y}) should be empty");
            }
        }
    }

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn mid_pacific_tile_is_sea() {
    let root = dataset_root("pacific");
    // Data exists over Europe only.
    write_height_file(&root, 0.0, 90.0);
    write_texture_file(&root, 0.0, 90.0);

    let dataset = Dataset::open(DatasetLayout::with_base(&root));
    let reader = TileReader::new(&dataset);
    let tile = TerrainTile::build(&reader, 182.0, -10.0, 0).unwrap();

    for y in 0..9 {
        for x in 0..9 {
            assert_eq!(tile.elevation(x, y), 0);
            assert_eq!(tile.color(x, y), colormap::SEA);
        }
    }
    for texel in tile.texture() {
        assert_eq!(*texel, Texel::EMPTY);
    }

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn dataset_scan_is_shared_across_threads() {
    let root = dataset_root("threads");
    write_height_file(&root, 0.0, 90.0);

    let dataset = Arc::new(Dataset::open(DatasetLayout::with_base(&root)));
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let dataset = Arc::clone(&dataset);
            std::thread::spawn(move || {
                let reader = TileReader::new(&dataset);
                let tile = TerrainTile::build(&reader, 10.0 + f64::from(i), 80.0, 1).unwrap();
                tile.elevation(0, 0)
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    fs::remove_dir_all(&root).unwrap();
}
