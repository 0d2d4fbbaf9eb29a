//! Per-band pixel sources for writing and sinks for reading.

use crate::NitfError;
use std::io::{self, Read, Seek, SeekFrom};

/// Supplies one band's pixels in row-major order.
pub trait BandSource {
    /// Fills `buf` with the next pixels.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), NitfError>;
}

/// Receives one band's pixels in row-major order.
pub trait BandSink {
    fn write(&mut self, data: &[u8]) -> Result<(), NitfError>;
}

impl<S: BandSource + ?Sized> BandSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), NitfError> {
        (**self).read(buf)
    }
}

fn exhausted(needed: usize, available: usize) -> NitfError {
    NitfError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("band source needs {} bytes, has {}", needed, available),
    ))
}

// Copies pixels out of an interleaved buffer, `skip` pixels apart.
fn gather(src: &[u8], bytes_per_pixel: usize, skip: usize, dst: &mut [u8]) {
    let stride = bytes_per_pixel * (skip + 1);
    for (i, pixel) in dst.chunks_mut(bytes_per_pixel).enumerate() {
        let at = i * stride;
        pixel.copy_from_slice(&src[at..at + pixel.len()]);
    }
}

// Bytes spanned by `pixels` pixels spaced `skip` apart, ending on the last
// pixel.
fn span(pixels: usize, bytes_per_pixel: usize, skip: usize) -> usize {
    if pixels == 0 {
        0
    } else {
        (pixels - 1) * bytes_per_pixel * (skip + 1) + bytes_per_pixel
    }
}

/// Band held in memory, either alone or interleaved with others.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    position: usize,
    bytes_per_pixel: usize,
    pixel_skip: usize,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> MemorySource {
        MemorySource {
            data,
            position: 0,
            bytes_per_pixel: 1,
            pixel_skip: 0,
        }
    }

    /// One band of pixel-interleaved data: starts at byte `start` and skips
    /// `pixel_skip` pixels after each one taken.
    pub fn interleaved(
        data: Vec<u8>,
        start: usize,
        bytes_per_pixel: usize,
        pixel_skip: usize,
    ) -> MemorySource {
        MemorySource {
            data,
            position: start,
            bytes_per_pixel: bytes_per_pixel.max(1),
            pixel_skip,
        }
    }
}

impl BandSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), NitfError> {
        let available = self.data.len().saturating_sub(self.position);
        if self.pixel_skip == 0 {
            if buf.len() > available {
                return Err(exhausted(buf.len(), available));
            }
            buf.copy_from_slice(&self.data[self.position..self.position + buf.len()]);
            self.position += buf.len();
            return Ok(());
        }

        let pixels = buf.len() / self.bytes_per_pixel;
        let needed = span(pixels, self.bytes_per_pixel, self.pixel_skip);
        if needed > available {
            return Err(exhausted(needed, available));
        }
        gather(
            &self.data[self.position..],
            self.bytes_per_pixel,
            self.pixel_skip,
            buf,
        );
        self.position += pixels * self.bytes_per_pixel * (self.pixel_skip + 1);
        Ok(())
    }
}

/// Band read from a seekable stream, such as raw pixels in a file.
#[derive(Debug)]
pub struct FileSource<R> {
    inner: R,
    position: u64,
    bytes_per_pixel: usize,
    pixel_skip: usize,
    scratch: Vec<u8>,
}

impl<R: Read + Seek> FileSource<R> {
    pub fn new(inner: R, start: u64) -> FileSource<R> {
        FileSource::interleaved(inner, start, 1, 0)
    }

    pub fn interleaved(
        inner: R,
        start: u64,
        bytes_per_pixel: usize,
        pixel_skip: usize,
    ) -> FileSource<R> {
        FileSource {
            inner,
            position: start,
            bytes_per_pixel: bytes_per_pixel.max(1),
            pixel_skip,
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BandSource for FileSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), NitfError> {
        self.inner.seek(SeekFrom::Start(self.position))?;
        if self.pixel_skip == 0 {
            self.inner.read_exact(buf)?;
            self.position += buf.len() as u64;
            return Ok(());
        }

        let pixels = buf.len() / self.bytes_per_pixel;
        let needed = span(pixels, self.bytes_per_pixel, self.pixel_skip);
        self.scratch.resize(needed, 0);
        self.inner.read_exact(&mut self.scratch)?;
        gather(&self.scratch, self.bytes_per_pixel, self.pixel_skip, buf);
        self.position += (pixels * self.bytes_per_pixel * (self.pixel_skip + 1)) as u64;
        Ok(())
    }
}

/// Decimates another source: keeps every `row_skip`-th row of `num_cols`
/// pixels and every `col_skip`-th pixel in it.
pub struct PixelSkipSource<S> {
    inner: S,
    num_cols: usize,
    bytes_per_pixel: usize,
    row_skip: usize,
    col_skip: usize,
    started: bool,
    input: Vec<u8>,
    output: Vec<u8>,
    cursor: usize,
}

impl<S: BandSource> PixelSkipSource<S> {
    pub fn new(
        inner: S,
        num_cols: usize,
        bytes_per_pixel: usize,
        row_skip: usize,
        col_skip: usize,
    ) -> PixelSkipSource<S> {
        PixelSkipSource {
            inner,
            num_cols,
            bytes_per_pixel: bytes_per_pixel.max(1),
            row_skip: row_skip.max(1),
            col_skip: col_skip.max(1),
            started: false,
            input: Vec::new(),
            output: Vec::new(),
            cursor: 0,
        }
    }

    /// Bytes of one output row.
    pub fn row_bytes(&self) -> usize {
        (self.num_cols + self.col_skip - 1) / self.col_skip * self.bytes_per_pixel
    }

    fn next_row(&mut self) -> Result<(), NitfError> {
        self.input.resize(self.num_cols * self.bytes_per_pixel, 0);
        if self.started {
            for _ in 1..self.row_skip {
                self.inner.read(&mut self.input)?;
            }
        }
        self.started = true;
        self.inner.read(&mut self.input)?;

        self.output.clear();
        let bpp = self.bytes_per_pixel;
        for col in (0..self.num_cols).step_by(self.col_skip) {
            self.output
                .extend_from_slice(&self.input[col * bpp..(col + 1) * bpp]);
        }
        self.cursor = 0;
        Ok(())
    }
}

impl<S: BandSource> BandSource for PixelSkipSource<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), NitfError> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.cursor == self.output.len() {
                self.next_row()?;
                if self.output.is_empty() {
                    return Err(exhausted(buf.len(), filled));
                }
            }
            let n = (buf.len() - filled).min(self.output.len() - self.cursor);
            buf[filled..filled + n].copy_from_slice(&self.output[self.cursor..self.cursor + n]);
            filled += n;
            self.cursor += n;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn with_capacity(capacity: usize) -> MemorySink {
        MemorySink {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl BandSink for MemorySink {
    fn write(&mut self, data: &[u8]) -> Result<(), NitfError> {
        self.data.extend_from_slice(data);
        Ok(())
    }
}
