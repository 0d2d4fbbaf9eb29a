use crate::image::ImageSubheader;
use crate::NitfError;

/// Decimation applied while reading: every `row_skip`-th row and every
/// `col_skip`-th column, starting with the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSkip {
    row_skip: u64,
    col_skip: u64,
}

impl PixelSkip {
    pub fn new(row_skip: u64, col_skip: u64) -> Result<PixelSkip, NitfError> {
        if row_skip == 0 || col_skip == 0 {
            return Err(NitfError::InvalidWindow {
                reason: format!("skip factors {}x{} must be at least 1", row_skip, col_skip),
            });
        }
        Ok(PixelSkip { row_skip, col_skip })
    }

    pub fn row_skip(&self) -> u64 {
        self.row_skip
    }

    pub fn col_skip(&self) -> u64 {
        self.col_skip
    }
}

/// Rectangle and bands to read from an image segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubWindow {
    pub start_row: u64,
    pub num_rows: u64,
    pub start_col: u64,
    pub num_cols: u64,
    pub bands: Vec<usize>,
    pub skip: Option<PixelSkip>,
}

impl SubWindow {
    /// Every pixel of every band.
    pub fn full(subheader: &ImageSubheader) -> SubWindow {
        SubWindow {
            start_row: 0,
            num_rows: subheader.num_rows,
            start_col: 0,
            num_cols: subheader.num_cols,
            bands: (0..subheader.num_bands()).collect(),
            skip: None,
        }
    }

    fn skips(&self) -> (u64, u64) {
        self.skip
            .map(|s| (s.row_skip, s.col_skip))
            .unwrap_or((1, 1))
    }

    pub fn output_rows(&self) -> u64 {
        let (row_skip, _) = self.skips();
        (self.num_rows + row_skip - 1) / row_skip
    }

    pub fn output_cols(&self) -> u64 {
        let (_, col_skip) = self.skips();
        (self.num_cols + col_skip - 1) / col_skip
    }

    pub(crate) fn row_skip(&self) -> u64 {
        self.skips().0
    }

    pub(crate) fn col_skip(&self) -> u64 {
        self.skips().1
    }

    pub(crate) fn validate(&self, rows: u64, cols: u64, bands: usize) -> Result<(), NitfError> {
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(NitfError::InvalidWindow {
                reason: "window is empty".to_owned(),
            });
        }
        let end_row = self.start_row.checked_add(self.num_rows);
        let end_col = self.start_col.checked_add(self.num_cols);
        if end_row.map_or(true, |end| end > rows) || end_col.map_or(true, |end| end > cols) {
            return Err(NitfError::InvalidWindow {
                reason: format!(
                    "rows {}+{} cols {}+{} outside {}x{}",
                    self.start_row, self.num_rows, self.start_col, self.num_cols, rows, cols
                ),
            });
        }
        if self.bands.is_empty() {
            return Err(NitfError::InvalidWindow {
                reason: "no bands requested".to_owned(),
            });
        }
        if let Some(band) = self.bands.iter().find(|&&b| b >= bands) {
            return Err(NitfError::InvalidWindow {
                reason: format!("band {} of {}", band, bands),
            });
        }
        Ok(())
    }
}
