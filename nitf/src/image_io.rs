use crate::image::{ImageMode, ImageSubheader};
use crate::{Location, NitfError};
use std::io;

/// Byte layout of an uncompressed image segment's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    mode: ImageMode,
    num_bands: u64,
    bytes_per_pixel: u64,
    num_rows: u64,
    num_cols: u64,
    block_rows: u64,
    block_cols: u64,
    blocks_per_row: u64,
    blocks_per_col: u64,
    block_bytes: u64,
    total_bytes: u64,
}

impl ImageLayout {
    pub fn new(subheader: &ImageSubheader, location: Location) -> Result<ImageLayout, NitfError> {
        if subheader.is_compressed() {
            return Err(NitfError::Unsupported {
                location,
                reason: format!("compression {}", subheader.compression),
            });
        }
        if subheader.bits_per_pixel == 0 || subheader.bits_per_pixel % 8 != 0 {
            return Err(NitfError::Unsupported {
                location,
                reason: format!("{} bits per pixel", subheader.bits_per_pixel),
            });
        }
        let num_bands = subheader.num_bands() as u64;
        let block_rows = subheader.effective_block_rows();
        let block_cols = subheader.effective_block_cols();
        if num_bands == 0 || block_rows == 0 || block_cols == 0 {
            return Err(NitfError::Structural {
                location,
                reason: "image has no bands or an empty block".to_owned(),
            });
        }

        let blocks_per_row = subheader.blocks_per_row;
        let blocks_per_col = subheader.blocks_per_col;
        let covered_cols = blocks_per_row.checked_mul(block_cols);
        let covered_rows = blocks_per_col.checked_mul(block_rows);
        if covered_cols.map_or(true, |c| c < subheader.num_cols)
            || covered_rows.map_or(true, |r| r < subheader.num_rows)
        {
            return Err(NitfError::Structural {
                location,
                reason: format!(
                    "{}x{} blocks of {}x{} do not cover {}x{}",
                    blocks_per_col,
                    blocks_per_row,
                    block_rows,
                    block_cols,
                    subheader.num_rows,
                    subheader.num_cols
                ),
            });
        }

        let bytes_per_pixel = subheader.bytes_per_pixel();
        let block_bytes = block_rows
            .checked_mul(block_cols)
            .and_then(|n| n.checked_mul(bytes_per_pixel))
            .ok_or(NitfError::SizeOverflow)?;
        let total_bytes = blocks_per_row
            .checked_mul(blocks_per_col)
            .and_then(|n| n.checked_mul(num_bands))
            .and_then(|n| n.checked_mul(block_bytes))
            .ok_or(NitfError::SizeOverflow)?;

        Ok(ImageLayout {
            mode: subheader.mode,
            num_bands,
            bytes_per_pixel,
            num_rows: subheader.num_rows,
            num_cols: subheader.num_cols,
            block_rows,
            block_cols,
            blocks_per_row,
            blocks_per_col,
            block_bytes,
            total_bytes,
        })
    }

    pub fn mode(&self) -> ImageMode {
        self.mode
    }

    pub fn num_bands(&self) -> u64 {
        self.num_bands
    }

    pub fn bytes_per_pixel(&self) -> u64 {
        self.bytes_per_pixel
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn num_cols(&self) -> u64 {
        self.num_cols
    }

    pub fn block_rows(&self) -> u64 {
        self.block_rows
    }

    pub fn block_cols(&self) -> u64 {
        self.block_cols
    }

    /// Bytes of one band of one block.
    pub fn block_bytes(&self) -> u64 {
        self.block_bytes
    }

    /// Bytes of the whole image data, padding included.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Distance between horizontally adjacent pixels of one band.
    pub fn column_stride(&self) -> u64 {
        match self.mode {
            ImageMode::Pixel => self.num_bands * self.bytes_per_pixel,
            _ => self.bytes_per_pixel,
        }
    }

    /// Offset of a pixel from the start of the image data. All arguments
    /// must lie inside the image.
    pub fn pixel_offset(&self, band: u64, row: u64, col: u64) -> u64 {
        let block = (row / self.block_rows) * self.blocks_per_row + col / self.block_cols;
        let rr = row % self.block_rows;
        let cc = col % self.block_cols;
        let bpp = self.bytes_per_pixel;
        let nbands = self.num_bands;
        let bb = self.block_bytes;
        match self.mode {
            ImageMode::Block => (block * nbands + band) * bb + (rr * self.block_cols + cc) * bpp,
            ImageMode::Sequential => {
                let nblocks = self.blocks_per_row * self.blocks_per_col;
                (band * nblocks + block) * bb + (rr * self.block_cols + cc) * bpp
            }
            ImageMode::Pixel => {
                block * nbands * bb + ((rr * self.block_cols + cc) * nbands + band) * bpp
            }
            ImageMode::Row => {
                block * nbands * bb + ((rr * nbands + band) * self.block_cols + cc) * bpp
            }
        }
    }
}

/// Write adaptor that hands whole blocks to the inner writer. The tail of a
/// partial block goes out on `flush` or `into_inner`.
#[derive(Debug)]
pub struct BlockCache<W: io::Write> {
    inner: W,
    block_size: usize,
    buffer: Vec<u8>,
}

impl<W: io::Write> BlockCache<W> {
    pub fn new(inner: W, block_size: usize) -> BlockCache<W> {
        let block_size = block_size.max(1);
        BlockCache {
            inner,
            block_size,
            buffer: Vec::with_capacity(block_size),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        io::Write::flush(&mut self)?;
        Ok(self.inner)
    }
}

impl<W: io::Write> io::Write for BlockCache<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(data);
        let whole = self.buffer.len() / self.block_size * self.block_size;
        if whole > 0 {
            self.inner.write_all(&self.buffer[..whole])?;
            self.buffer.drain(..whole);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}
