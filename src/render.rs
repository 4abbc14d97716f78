//! Rendering seam: the backend contract and draw-call emission.
//!
//! The core never touches a graphics API. It emits textured or
//! vertex-coloured triangle lists and strips through [`RenderBackend`],
//! creates GPU textures lazily on first draw, and records handles for
//! deferred deletion when tiles are evicted. Quadrants use either
//! per-triangle emission or the precomputed 40-index strip orderings.

use glam::{DVec3, Vec2, Vec3};

use crate::dataset::raw::Texel;
use crate::tile::TerrainTile;

/// Opaque GPU texture identifier; zero means "not created".
pub type TextureHandle = u32;

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
}

/// Per-vertex attribute stream accompanying positions and normals.
pub enum Attributes<'a> {
    /// Per-vertex colours (solid mode).
    Colors(&'a [Vec3]),
    /// Texture coordinates plus the texture to sample.
    TextureUv(&'a [Vec2], TextureHandle),
}

/// One submitted batch of geometry.
pub struct DrawCall<'a> {
    pub primitive: Primitive,
    pub positions: &'a [DVec3],
    pub normals: &'a [DVec3],
    pub attributes: Attributes<'a>,
}

/// The rendering back end consumed by the core: anything able to draw
/// textured triangle meshes.
pub trait RenderBackend: Send {
    /// Upload a square RGB image; returns a non-zero handle.
    fn create_texture(&mut self, rgb: &[Texel], size: usize) -> TextureHandle;

    /// Delete a texture previously created here. Unknown handles are
    /// ignored.
    fn delete_texture(&mut self, handle: TextureHandle);

    /// Submit one batch of triangles or a strip.
    fn draw(&mut self, call: &DrawCall<'_>);

    /// Update the projection; called when the viewpoint crosses a depth
    /// band or the window geometry changes.
    fn set_projection(&mut self, fov_deg: f64, aspect: f64, z_near: f64, z_far: f64);

    /// Update the view transform for the coming frame.
    fn set_view(&mut self, eye: DVec3, look_at: DVec3, up: DVec3);
}

/// How the quadtree turns tiles into draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStyle {
    pub mode: DrawMode,
    /// Use the precomputed strip orderings instead of per-triangle lists.
    pub strips: bool,
    /// Emit the sunken bottom-plane quad per quadrant.
    pub skirts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Per-vertex colours.
    Solid,
    /// The tile's composited texture.
    Textured,
}

impl Default for DrawStyle {
    fn default() -> Self {
        DrawStyle {
            mode: DrawMode::Textured,
            strips: true,
            skirts: true,
        }
    }
}

/// z-buffer partition: projection depths as a step function of ground
/// altitude. The core signals the renderer when the band changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub z_near: f64,
    pub z_far: f64,
}

impl DepthRange {
    /// Depth band for a viewpoint `alt_ground` metres above ground.
    pub fn for_altitude(alt_ground: f64) -> DepthRange {
        let km = 1_000.0;
        if alt_ground <= 1.0 * km {
            DepthRange { z_near: 0.015 * km, z_far: 200.0 * km }
        } else if alt_ground <= 10.0 * km {
            DepthRange { z_near: 0.015 * km, z_far: 300.0 * km }
        } else if alt_ground <= 100.0 * km {
            DepthRange { z_near: 0.150 * km, z_far: 3_000.0 * km }
        } else if alt_ground <= 1_000.0 * km {
            DepthRange { z_near: 15.0 * km, z_far: 300_000.0 * km }
        } else {
            DepthRange { z_near: 150.0 * km, z_far: 3_000_000.0 * km }
        }
    }
}

// Triangle-strip vertex orderings over the 9x9 grid, one 40-index
// sequence per quadrant (NW, NE, SW, SE). Rows alternate direction so the
// strip stays continuous.
pub const STRIP_NW: [u8; 40] = [
    0, 9, 1, 10, 2, 11, 3, 12, 4, 13, //
    13, 22, 12, 21, 11, 20, 10, 19, 9, 18, //
    18, 27, 19, 28, 20, 29, 21, 30, 22, 31, //
    31, 40, 30, 39, 29, 38, 28, 37, 27, 36,
];
pub const STRIP_NE: [u8; 40] = [
    4, 13, 5, 14, 6, 15, 7, 16, 8, 17, //
    17, 26, 16, 25, 15, 24, 14, 23, 13, 22, //
    22, 31, 23, 32, 24, 33, 25, 34, 26, 35, //
    35, 44, 34, 43, 33, 42, 32, 41, 31, 40,
];
pub const STRIP_SW: [u8; 40] = [
    36, 45, 37, 46, 38, 47, 39, 48, 40, 49, //
    49, 58, 48, 57, 47, 56, 46, 55, 45, 54, //
    54, 63, 55, 64, 56, 65, 57, 66, 58, 67, //
    67, 76, 66, 75, 65, 74, 64, 73, 63, 72,
];
pub const STRIP_SE: [u8; 40] = [
    40, 49, 41, 50, 42, 51, 43, 52, 44, 53, //
    53, 62, 52, 61, 51, 60, 50, 59, 49, 58, //
    58, 67, 59, 68, 60, 69, 61, 70, 62, 71, //
    71, 80, 70, 79, 69, 78, 68, 77, 67, 76,
];

/// Strip ordering for the quadrant whose top-left grid cell is `(x0, y0)`.
pub fn quadrant_strip(x0: usize, y0: usize) -> &'static [u8; 40] {
    match (x0, y0) {
        (0, 0) => &STRIP_NW,
        (4, 0) => &STRIP_NE,
        (0, 4) => &STRIP_SW,
        (4, 4) => &STRIP_SE,
        _ => unreachable!("quadrant origin must be one of (0|4, 0|4)"),
    }
}

/// Make sure the tile's texture lives on the GPU, creating it on first use.
fn bind_texture(tile: &TerrainTile, backend: &mut dyn RenderBackend) -> TextureHandle {
    let mut handle = tile.texture_handle();
    if handle == 0 {
        handle = backend.create_texture(tile.texture(), tile.texture_size());
        tile.set_texture_handle(handle);
    }
    handle
}

/// Emit one quadrant of a tile.
pub fn draw_quadrant(
    tile: &TerrainTile,
    x0: usize,
    y0: usize,
    style: &DrawStyle,
    backend: &mut dyn RenderBackend,
) {
    if style.strips {
        draw_quadrant_strip(tile, x0, y0, style, backend);
    } else {
        draw_quadrant_triangles(tile, x0, y0, style, backend);
    }
    if style.skirts {
        draw_skirt(tile, x0, y0, style, backend);
    }
}

fn draw_quadrant_strip(
    tile: &TerrainTile,
    x0: usize,
    y0: usize,
    style: &DrawStyle,
    backend: &mut dyn RenderBackend,
) {
    let strip = quadrant_strip(x0, y0);

    let mut positions = [DVec3::ZERO; 40];
    let mut normals = [DVec3::ZERO; 40];
    let mut colors = [Vec3::ZERO; 40];
    let mut uv = [Vec2::ZERO; 40];
    for (slot, &index) in strip.iter().enumerate() {
        let (p, n, c, t) = tile.vertex(index as usize);
        positions[slot] = p;
        normals[slot] = n;
        colors[slot] = c;
        uv[slot] = t;
    }

    let attributes = match style.mode {
        DrawMode::Solid => Attributes::Colors(&colors),
        DrawMode::Textured => Attributes::TextureUv(&uv, bind_texture(tile, backend)),
    };
    backend.draw(&DrawCall {
        primitive: Primitive::TriangleStrip,
        positions: &positions,
        normals: &normals,
        attributes,
    });
}

fn draw_quadrant_triangles(
    tile: &TerrainTile,
    x0: usize,
    y0: usize,
    style: &DrawStyle,
    backend: &mut dyn RenderBackend,
) {
    // 4x4 cells, two triangles each.
    let mut positions = Vec::with_capacity(96);
    let mut normals = Vec::with_capacity(96);
    let mut colors = Vec::with_capacity(96);
    let mut uv = Vec::with_capacity(96);

    let mut push = |x: usize, y: usize| {
        positions.push(tile.position(x, y));
        normals.push(tile.normal(x, y));
        colors.push(tile.color(x, y));
        uv.push(tile.uv(x, y));
    };

    for y in y0..y0 + 4 {
        for x in x0..x0 + 4 {
            push(x, y);
            push(x, y + 1);
            push(x + 1, y);

            push(x, y + 1);
            push(x + 1, y + 1);
            push(x + 1, y);
        }
    }

    let attributes = match style.mode {
        DrawMode::Solid => Attributes::Colors(&colors),
        DrawMode::Textured => Attributes::TextureUv(&uv, bind_texture(tile, backend)),
    };
    backend.draw(&DrawCall {
        primitive: Primitive::Triangles,
        positions: &positions,
        normals: &normals,
        attributes,
    });
}

/// Emit the quadrant's sunken bottom plane, hiding z-fighting between
/// low-LOD tiles and the sea sphere.
fn draw_skirt(
    tile: &TerrainTile,
    x0: usize,
    y0: usize,
    style: &DrawStyle,
    backend: &mut dyn RenderBackend,
) {
    let ix = x0 / 4;
    let iy = y0 / 4;

    let (p00, n00) = tile.skirt_corner(ix, iy);
    let (p01, n01) = tile.skirt_corner(ix, iy + 1);
    let (p10, n10) = tile.skirt_corner(ix + 1, iy);
    let (p11, n11) = tile.skirt_corner(ix + 1, iy + 1);

    let positions = [p00, p01, p10, p11];
    let normals = [n00, n01, n10, n11];
    let colors = [
        tile.color(x0, y0),
        tile.color(x0, y0 + 4),
        tile.color(x0 + 4, y0),
        tile.color(x0 + 4, y0 + 4),
    ];
    let uv = [
        tile.uv(x0, y0),
        tile.uv(x0, y0 + 4),
        tile.uv(x0 + 4, y0),
        tile.uv(x0 + 4, y0 + 4),
    ];

    let attributes = match style.mode {
        DrawMode::Solid => Attributes::Colors(&colors),
        DrawMode::Textured => Attributes::TextureUv(&uv, bind_texture(tile, backend)),
    };
    backend.draw(&DrawCall {
        primitive: Primitive::TriangleStrip,
        positions: &positions,
        normals: &normals,
        attributes,
    });
}
