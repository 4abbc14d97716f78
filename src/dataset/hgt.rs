//! Random access to fixed-layout elevation files.
//!
//! A height file is a bare square grid of big-endian 16-bit cells,
//! row-major from the top-left, north up. Files are opened per read and
//! closed when the handle drops; reads are small seeks, no mmap.
//!
//! Cells decode unsigned-widened to `i32`: SRTM voids (−32768 as signed)
//! arrive as large positive values and are caught downstream by the
//! >9000 m error clamp.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Open height file with a known grid edge length.
pub struct HeightFile {
    file: File,
    grid_size: usize,
}

impl HeightFile {
    /// Open `path` as a `grid_size` × `grid_size` cell grid.
    pub fn open(path: &Path, grid_size: usize) -> io::Result<HeightFile> {
        Ok(HeightFile {
            file: File::open(path)?,
            grid_size,
        })
    }

    /// Read the cell at `(x, y)`.
    pub fn height_at(&mut self, x: usize, y: usize) -> io::Result<i32> {
        let offset = (y * self.grid_size + x) as u64 * 2;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut bytes = [0u8; 2];
        self.file.read_exact(&mut bytes)?;
        Ok(i32::from(u16::from_be_bytes(bytes)))
    }

    /// Read an `sx` × `sy` block starting at `(x, y)`, stepping `skip`
    /// cells per sample in each dimension, into `buffer` row-major.
    pub fn height_block(
        &mut self,
        buffer: &mut [i32],
        x: usize,
        y: usize,
        sx: usize,
        sy: usize,
        skip: usize,
    ) -> io::Result<()> {
        debug_assert!(buffer.len() >= sx * sy);
        let mut i = 0;
        for row in 0..sy {
            for col in 0..sx {
                buffer[i] = self.height_at(x + col * skip, y + row * skip)?;
                i += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_grid(path: &Path, grid_size: usize, value: impl Fn(usize, usize) -> u16) {
        let mut bytes = Vec::with_capacity(grid_size * grid_size * 2);
        for y in 0..grid_size {
            for x in 0..grid_size {
                bytes.extend_from_slice(&value(x, y).to_be_bytes());
            }
        }
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn reads_big_endian_cells() {
        let path = std::env::temp_dir().join(format!("terrastream-hgt-{}.hgt", std::process::id()));
        write_grid(&path, 65, |x, y| (y * 65 + x) as u16);

        let mut file = HeightFile::open(&path, 65).unwrap();
        assert_eq!(file.height_at(0, 0).unwrap(), 0);
        assert_eq!(file.height_at(64, 0).unwrap(), 64);
        assert_eq!(file.height_at(0, 1).unwrap(), 65);
        assert_eq!(file.height_at(64, 64).unwrap(), 65 * 65 - 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn block_read_strides() {
        let path = std::env::temp_dir().join(format!(
            "terrastream-hgt-block-{}.hgt",
            std::process::id()
        ));
        write_grid(&path, 65, |x, y| (y * 65 + x) as u16);

        let mut file = HeightFile::open(&path, 65).unwrap();
        let mut block = [0i32; 81];
        file.height_block(&mut block, 0, 0, 9, 9, 8).unwrap();

        assert_eq!(block[0], 0);
        assert_eq!(block[8], 64);
        assert_eq!(block[9], 8 * 65);
        assert_eq!(block[80], 64 * 65 + 64);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn void_values_widen_unsigned() {
        let path = std::env::temp_dir().join(format!(
            "terrastream-hgt-void-{}.hgt",
            std::process::id()
        ));
        write_grid(&path, 65, |_, _| i16::MIN as u16);

        let mut file = HeightFile::open(&path, 65).unwrap();
        assert_eq!(file.height_at(3, 3).unwrap(), 32_768);

        std::fs::remove_file(&path).unwrap();
    }
}
