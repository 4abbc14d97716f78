//! Random access to raw interleaved RGB texture files.
//!
//! A texture source file is a bare row-major grid of 3-byte RGB texels,
//! north up, no header. `Texel` is `bytemuck`-Pod so whole rows cast
//! to and from byte slices without copies.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use bytemuck::{Pod, Zeroable};

use super::bands::TEXTURE_EMPTY_COLOR;

/// One interleaved RGB texel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Texel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Texel {
    /// Fill colour for texels with no source data.
    pub const EMPTY: Texel = Texel {
        r: TEXTURE_EMPTY_COLOR[0],
        g: TEXTURE_EMPTY_COLOR[1],
        b: TEXTURE_EMPTY_COLOR[2],
    };
}

/// Open texture file with a known pixel edge length.
pub struct RawTextureFile {
    file: File,
    pixel_size: usize,
}

impl RawTextureFile {
    /// Open `path` as a `pixel_size` × `pixel_size` texel grid.
    pub fn open(path: &Path, pixel_size: usize) -> io::Result<RawTextureFile> {
        Ok(RawTextureFile {
            file: File::open(path)?,
            pixel_size,
        })
    }

    /// Read the texel at `(x, y)`.
    pub fn texel_at(&mut self, x: usize, y: usize) -> io::Result<Texel> {
        let offset = (y * self.pixel_size + x) as u64 * 3;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut texel = Texel::zeroed();
        self.file.read_exact(bytemuck::bytes_of_mut(&mut texel))?;
        Ok(texel)
    }
}
