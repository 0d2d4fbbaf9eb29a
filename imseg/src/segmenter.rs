use log::{debug, info};
use std::error;
use std::fmt;

/// Largest row or column offset the 5-digit halves of ILOC can hold.
pub const ILOC_MAX: u64 = 99_999;
/// Largest image data length the 10-digit LI field admits.
pub const NUM_BYTES_MAX: u64 = 9_999_999_998;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    Impossible { reason: String },
    SizeOverflow,
}

impl error::Error for SegmentationError {}
impl fmt::Display for SegmentationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Impossible { reason } => write!(f, "segmentation impossible: {}", reason),
            Self::SizeOverflow => write!(f, "segment size computation overflowed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub iloc_max: u64,
    pub num_bytes_max: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            iloc_max: ILOC_MAX,
            num_bytes_max: NUM_BYTES_MAX,
        }
    }
}

/// Rows of the full image carried by one image segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    first_row: u64,
    // Row offset from the segment this one attaches to.
    row_offset: u64,
    num_rows: u64,
}

impl SegmentRange {
    pub fn new(first_row: u64, row_offset: u64, num_rows: u64) -> SegmentRange {
        SegmentRange {
            first_row,
            row_offset,
            num_rows,
        }
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn row_offset(&self) -> u64 {
        self.row_offset
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// One past the last row.
    pub fn end_row(&self) -> u64 {
        self.first_row + self.num_rows
    }

    /// ILOC text, `RRRRRCCCCC`, with a zero column offset.
    pub fn iloc(&self) -> String {
        format!("{:05}{:05}", self.row_offset, 0)
    }

    /// Maps the global rows `[start, start + count)` onto this segment,
    /// returning the segment-local first row and the number of rows shared.
    pub fn overlap(&self, start: u64, count: u64) -> Option<(u64, u64)> {
        let end = start.saturating_add(count);
        let lo = start.max(self.first_row);
        let hi = end.min(self.end_row());
        if lo < hi {
            Some((lo - self.first_row, hi - lo))
        } else {
            None
        }
    }
}

/// Splits an image into row ranges that each fit one image segment.
#[derive(Debug, Clone)]
pub struct ImageSegmentComputer {
    num_rows: u64,
    num_cols: u64,
    bytes_per_pixel: u64,
    block_rows: u64,
    block_cols: u64,
    limits: Limits,
    row_limit: u64,
    segments: Vec<SegmentRange>,
}

impl ImageSegmentComputer {
    pub fn new(
        num_rows: u64,
        num_cols: u64,
        bytes_per_pixel: u64,
        limits: Limits,
    ) -> Result<ImageSegmentComputer, SegmentationError> {
        ImageSegmentComputer::blocked(num_rows, num_cols, bytes_per_pixel, 0, 0, limits)
    }

    /// Block dimensions of zero mean the image is not blocked in that
    /// direction.
    pub fn blocked(
        num_rows: u64,
        num_cols: u64,
        bytes_per_pixel: u64,
        block_rows: u64,
        block_cols: u64,
        limits: Limits,
    ) -> Result<ImageSegmentComputer, SegmentationError> {
        let mut computer = ImageSegmentComputer {
            num_rows,
            num_cols,
            bytes_per_pixel,
            block_rows,
            block_cols,
            limits,
            row_limit: 0,
            segments: Vec::new(),
        };
        if num_rows == 0 {
            debug!("no rows to segment");
            return Ok(computer);
        }
        computer.row_limit = computer.compute_row_limit()?;
        computer.partition()?;
        info!(
            "{} rows split into {} segments of at most {} rows",
            num_rows,
            computer.segments.len(),
            computer.row_limit
        );
        Ok(computer)
    }

    fn compute_row_limit(&self) -> Result<u64, SegmentationError> {
        if self.num_cols == 0 || self.bytes_per_pixel == 0 {
            return Err(SegmentationError::Impossible {
                reason: "rows hold no bytes".to_owned(),
            });
        }

        let padded_cols = if self.block_cols > 0 {
            let blocks = self
                .num_cols
                .checked_add(self.block_cols - 1)
                .ok_or(SegmentationError::SizeOverflow)?
                / self.block_cols;
            blocks
                .checked_mul(self.block_cols)
                .ok_or(SegmentationError::SizeOverflow)?
        } else {
            self.num_cols
        };
        let bytes_per_row = padded_cols
            .checked_mul(self.bytes_per_pixel)
            .ok_or(SegmentationError::SizeOverflow)?;
        if bytes_per_row > self.limits.num_bytes_max {
            return Err(SegmentationError::Impossible {
                reason: format!(
                    "a single row of {} bytes exceeds the segment maximum of {}",
                    bytes_per_row, self.limits.num_bytes_max
                ),
            });
        }

        let max_rows_by_bytes = self.limits.num_bytes_max / bytes_per_row;
        let mut row_limit = self.limits.iloc_max.min(max_rows_by_bytes);
        debug!(
            "row limit {} (bytes allow {}, ILOC allows {})",
            row_limit, max_rows_by_bytes, self.limits.iloc_max
        );

        if self.block_rows > 0 {
            row_limit = row_limit / self.block_rows * self.block_rows;
        }
        if row_limit == 0 {
            return Err(SegmentationError::Impossible {
                reason: format!(
                    "not even one block of {} rows fits in a segment",
                    self.block_rows.max(1)
                ),
            });
        }
        Ok(row_limit)
    }

    fn partition(&mut self) -> Result<(), SegmentationError> {
        let mut first_row = 0;
        let mut row_offset = 0;
        while first_row < self.num_rows {
            let num_rows = self.row_limit.min(self.num_rows - first_row);
            self.segments
                .push(SegmentRange::new(first_row, row_offset, num_rows));
            row_offset = num_rows;
            first_row = first_row
                .checked_add(num_rows)
                .ok_or(SegmentationError::SizeOverflow)?;
        }
        Ok(())
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn num_cols(&self) -> u64 {
        self.num_cols
    }

    pub fn bytes_per_pixel(&self) -> u64 {
        self.bytes_per_pixel
    }

    pub fn block_rows(&self) -> u64 {
        self.block_rows
    }

    pub fn block_cols(&self) -> u64 {
        self.block_cols
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Rows per full segment; zero when the image has no rows.
    pub fn row_limit(&self) -> u64 {
        self.row_limit
    }

    pub fn segments(&self) -> &[SegmentRange] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn rows_per_segment(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.num_rows).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let computer =
            ImageSegmentComputer::blocked(383_735, 37_287, 1, 1024, 1024, Limits::default())
                .unwrap();
        assert_eq!(computer.row_limit(), 99_328);
        assert_eq!(computer.rows_per_segment(), vec![99_328, 99_328, 99_328, 85_751]);
        assert_eq!(computer.segments()[0].iloc(), "0000000000");
        assert_eq!(computer.segments()[1].iloc(), "9932800000");
    }

    #[test]
    fn test_small_image_one_segment() {
        let computer = ImageSegmentComputer::new(10, 10, 1, Limits::default()).unwrap();
        assert_eq!(computer.segments(), &[SegmentRange::new(0, 0, 10)]);
    }

    #[test]
    fn test_zero_rows() {
        let computer = ImageSegmentComputer::new(0, 10, 1, Limits::default()).unwrap();
        assert!(computer.segments().is_empty());
    }

    #[test]
    fn test_byte_limit_drives_split() {
        let limits = Limits {
            iloc_max: 99_999,
            num_bytes_max: 1000,
        };
        let computer = ImageSegmentComputer::new(25, 100, 1, limits).unwrap();
        assert_eq!(computer.rows_per_segment(), vec![10, 10, 5]);
    }

    #[test]
    fn test_padded_columns_count_against_bytes() {
        let limits = Limits {
            iloc_max: 99_999,
            num_bytes_max: 1000,
        };
        // 90 columns pad to 100 with 50-column blocks.
        let computer = ImageSegmentComputer::blocked(40, 90, 1, 5, 50, limits).unwrap();
        assert_eq!(computer.row_limit(), 10);
    }

    #[test]
    fn test_row_too_wide() {
        let limits = Limits {
            iloc_max: 99_999,
            num_bytes_max: 10,
        };
        let result = ImageSegmentComputer::new(5, 11, 1, limits);
        assert!(matches!(result, Err(SegmentationError::Impossible { .. })));
    }

    #[test]
    fn test_block_taller_than_limit() {
        let limits = Limits {
            iloc_max: 100,
            num_bytes_max: 1_000_000,
        };
        let result = ImageSegmentComputer::blocked(500, 1, 1, 128, 0, limits);
        assert!(matches!(result, Err(SegmentationError::Impossible { .. })));
    }

    #[test]
    fn test_overflowing_dimensions() {
        let result = ImageSegmentComputer::new(1, u64::MAX, 2, Limits::default());
        assert_eq!(result.unwrap_err(), SegmentationError::SizeOverflow);
    }

    #[test]
    fn test_overlap() {
        let range = SegmentRange::new(100, 100, 50);
        assert_eq!(range.overlap(90, 20), Some((0, 10)));
        assert_eq!(range.overlap(140, 100), Some((40, 10)));
        assert_eq!(range.overlap(150, 1), None);
        assert_eq!(range.overlap(0, 100), None);
    }
}
