use log::debug;
use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockingError {
    InvalidLayout { reason: String },
    /// The requested rows do not start or end on a block boundary.
    NotBlockAligned { row: u64 },
    RowsOutOfRange { start: u64, count: u64, total: u64 },
    BufferTooSmall { needed: usize, available: usize },
    SizeOverflow,
}

impl error::Error for BlockingError {}
impl fmt::Display for BlockingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidLayout { reason } => write!(f, "invalid block layout: {}", reason),
            Self::NotBlockAligned { row } => {
                write!(f, "row {} is not on a block boundary", row)
            }
            Self::RowsOutOfRange {
                start,
                count,
                total,
            } => write!(
                f,
                "rows {}..{} outside an image of {} rows",
                start,
                start.saturating_add(*count),
                total
            ),
            Self::BufferTooSmall { needed, available } => write!(
                f,
                "buffer of {} bytes is smaller than the {} required",
                available, needed
            ),
            Self::SizeOverflow => write!(f, "block size computation overflowed"),
        }
    }
}

fn to_usize(value: u64) -> Result<usize, BlockingError> {
    usize::try_from(value).map_err(|_| BlockingError::SizeOverflow)
}

fn mul(a: u64, b: u64) -> Result<u64, BlockingError> {
    a.checked_mul(b).ok_or(BlockingError::SizeOverflow)
}

fn div_ceil(a: u64, b: u64) -> Result<u64, BlockingError> {
    Ok(a.checked_add(b - 1).ok_or(BlockingError::SizeOverflow)? / b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    pub rows: usize,
    pub cols: usize,
    pub bytes_per_pixel: usize,
}

impl BlockShape {
    pub fn num_bytes(&self) -> Result<usize, BlockingError> {
        self.rows
            .checked_mul(self.cols)
            .and_then(|n| n.checked_mul(self.bytes_per_pixel))
            .ok_or(BlockingError::SizeOverflow)
    }
}

/// Copies one block out of `src`, which holds `valid_rows` rows of
/// `src_cols` pixels. The block starts at column `first_col`; pixels past
/// the source rows or columns are zero.
pub fn block_tile(
    src: &[u8],
    src_cols: usize,
    valid_rows: usize,
    first_col: usize,
    shape: BlockShape,
    dst: &mut [u8],
) -> Result<(), BlockingError> {
    let bpp = shape.bytes_per_pixel;
    let src_needed = valid_rows
        .checked_mul(src_cols)
        .and_then(|n| n.checked_mul(bpp))
        .ok_or(BlockingError::SizeOverflow)?;
    if src.len() < src_needed {
        return Err(BlockingError::BufferTooSmall {
            needed: src_needed,
            available: src.len(),
        });
    }
    let block_bytes = shape.num_bytes()?;
    if dst.len() < block_bytes {
        return Err(BlockingError::BufferTooSmall {
            needed: block_bytes,
            available: dst.len(),
        });
    }

    let out_row_bytes = shape.cols * bpp;
    let copy_cols = shape.cols.min(src_cols.saturating_sub(first_col));
    let copy_bytes = copy_cols * bpp;
    for r in 0..shape.rows {
        let out = &mut dst[r * out_row_bytes..(r + 1) * out_row_bytes];
        if r >= valid_rows {
            out.fill(0);
            continue;
        }
        if copy_bytes > 0 {
            let start = (r * src_cols + first_col) * bpp;
            out[..copy_bytes].copy_from_slice(&src[start..start + copy_bytes]);
        }
        out[copy_bytes..].fill(0);
    }
    Ok(())
}

/// Block geometry of one image segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    first_row: u64,
    num_rows: u64,
    // NPPBV: Number of pixels per block vertical.
    block_rows: u64,
    // NPPBH: Number of pixels per block horizontal.
    block_cols: u64,
    // NBPR: Number of blocks per row.
    blocks_per_row: u64,
    // NBPC: Number of blocks per column.
    blocks_per_col: u64,
}

impl SegmentLayout {
    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn block_rows(&self) -> u64 {
        self.block_rows
    }

    pub fn block_cols(&self) -> u64 {
        self.block_cols
    }

    pub fn blocks_per_row(&self) -> u64 {
        self.blocks_per_row
    }

    pub fn blocks_per_col(&self) -> u64 {
        self.blocks_per_col
    }

    /// Bytes of one band of this segment as written, padding included.
    pub fn band_bytes(&self, bytes_per_pixel: u64) -> Result<u64, BlockingError> {
        let blocks = mul(self.blocks_per_row, self.blocks_per_col)?;
        mul(mul(blocks, self.block_rows)?, mul(self.block_cols, bytes_per_pixel)?)
    }
}

/// Rearranges row-major pixels into the block-major order of one or more
/// image segments.
#[derive(Debug, Clone)]
pub struct ImageBlocker {
    num_cols: u64,
    segments: Vec<SegmentLayout>,
}

impl ImageBlocker {
    /// Block dimensions of zero mean a single block spanning the segment in
    /// that direction.
    pub fn new(
        rows_per_segment: &[u64],
        num_cols: u64,
        block_rows: u64,
        block_cols: u64,
    ) -> Result<ImageBlocker, BlockingError> {
        if num_cols == 0 {
            return Err(BlockingError::InvalidLayout {
                reason: "image has no columns".to_owned(),
            });
        }
        let block_cols = if block_cols == 0 { num_cols } else { block_cols };
        let blocks_per_row = div_ceil(num_cols, block_cols)?;

        let mut segments = Vec::with_capacity(rows_per_segment.len());
        let mut first_row: u64 = 0;
        for (i, &num_rows) in rows_per_segment.iter().enumerate() {
            if num_rows == 0 {
                return Err(BlockingError::InvalidLayout {
                    reason: format!("segment {} has no rows", i),
                });
            }
            let rows = if block_rows == 0 {
                num_rows
            } else {
                block_rows.min(num_rows)
            };
            let layout = SegmentLayout {
                first_row,
                num_rows,
                block_rows: rows,
                block_cols,
                blocks_per_row,
                blocks_per_col: div_ceil(num_rows, rows)?,
            };
            debug!("segment {} layout {:?}", i, layout);
            segments.push(layout);
            first_row = first_row
                .checked_add(num_rows)
                .ok_or(BlockingError::SizeOverflow)?;
        }

        Ok(ImageBlocker { num_cols, segments })
    }

    pub fn num_cols(&self) -> u64 {
        self.num_cols
    }

    pub fn total_rows(&self) -> u64 {
        self.segments.last().map_or(0, |s| s.first_row + s.num_rows)
    }

    pub fn segments(&self) -> &[SegmentLayout] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&SegmentLayout> {
        self.segments.get(index)
    }

    pub fn segment_of_row(&self, row: u64) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| row >= s.first_row && row < s.first_row + s.num_rows)
    }

    /// Finds the segment holding the `index`-th block row of the whole
    /// image, and the global first row of that block row.
    pub fn locate_block_row(&self, index: u64) -> Option<(usize, u64)> {
        let mut remaining = index;
        for (i, segment) in self.segments.iter().enumerate() {
            if remaining < segment.blocks_per_col {
                return Some((i, segment.first_row + remaining * segment.block_rows));
            }
            remaining -= segment.blocks_per_col;
        }
        None
    }

    // Block rows covered by the request: (segment, global first row, rows
    // of real data).
    fn plan(&self, start_row: u64, num_rows: u64) -> Result<Vec<(usize, u64, u64)>, BlockingError> {
        let total = self.total_rows();
        let end = start_row
            .checked_add(num_rows)
            .ok_or(BlockingError::SizeOverflow)?;
        if end > total {
            return Err(BlockingError::RowsOutOfRange {
                start: start_row,
                count: num_rows,
                total,
            });
        }

        let mut plan = Vec::new();
        let mut row = start_row;
        while row < end {
            let index = self.segment_of_row(row).ok_or(BlockingError::RowsOutOfRange {
                start: start_row,
                count: num_rows,
                total,
            })?;
            let segment = &self.segments[index];
            let local = row - segment.first_row;
            if local % segment.block_rows != 0 {
                return Err(BlockingError::NotBlockAligned { row });
            }
            let rows = segment.block_rows.min(segment.num_rows - local);
            if row + rows > end {
                return Err(BlockingError::NotBlockAligned { row: end });
            }
            plan.push((index, row, rows));
            row += rows;
        }
        Ok(plan)
    }

    /// Exact output size of `block` for the same rows.
    pub fn num_bytes_required(
        &self,
        start_row: u64,
        num_rows: u64,
        bytes_per_pixel: u64,
    ) -> Result<u64, BlockingError> {
        self.plan(start_row, num_rows)?
            .iter()
            .try_fold(0u64, |acc, &(index, _, _)| {
                let segment = &self.segments[index];
                let row_of_blocks = mul(
                    mul(segment.blocks_per_row, segment.block_rows)?,
                    mul(segment.block_cols, bytes_per_pixel)?,
                )?;
                acc.checked_add(row_of_blocks)
                    .ok_or(BlockingError::SizeOverflow)
            })
    }

    /// Blocks `num_rows` row-major rows starting at global row `start_row`.
    /// `start_row` must begin a block row of its segment, and the range must
    /// end on a block boundary or at the end of a segment.
    pub fn block(
        &self,
        src: &[u8],
        start_row: u64,
        num_rows: u64,
        bytes_per_pixel: usize,
        dst: &mut [u8],
    ) -> Result<(), BlockingError> {
        let plan = self.plan(start_row, num_rows)?;
        let src_cols = to_usize(self.num_cols)?;
        let row_bytes = src_cols
            .checked_mul(bytes_per_pixel)
            .ok_or(BlockingError::SizeOverflow)?;
        let src_needed = to_usize(num_rows)?
            .checked_mul(row_bytes)
            .ok_or(BlockingError::SizeOverflow)?;
        if src.len() < src_needed {
            return Err(BlockingError::BufferTooSmall {
                needed: src_needed,
                available: src.len(),
            });
        }
        let dst_needed =
            to_usize(self.num_bytes_required(start_row, num_rows, bytes_per_pixel as u64)?)?;
        if dst.len() < dst_needed {
            return Err(BlockingError::BufferTooSmall {
                needed: dst_needed,
                available: dst.len(),
            });
        }

        let mut out = 0;
        for (index, row, rows) in plan {
            let segment = &self.segments[index];
            let shape = BlockShape {
                rows: to_usize(segment.block_rows)?,
                cols: to_usize(segment.block_cols)?,
                bytes_per_pixel,
            };
            let block_bytes = shape.num_bytes()?;
            let rows = to_usize(rows)?;
            let src_start = to_usize(row - start_row)? * row_bytes;
            let src_rows = &src[src_start..src_start + rows * row_bytes];

            for block_col in 0..to_usize(segment.blocks_per_row)? {
                block_tile(
                    src_rows,
                    src_cols,
                    rows,
                    block_col * shape.cols,
                    shape,
                    &mut dst[out..out + block_bytes],
                )?;
                out += block_bytes;
            }
        }
        Ok(())
    }
}
