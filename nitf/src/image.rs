use crate::fields::{FieldReader, FieldWriter, Offset, TreContext};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::info;
use std::fmt;
use tre::Extensions;

/// Largest NPPBH/NPPBV written as a block size; wider unblocked images use 0.
const MAX_BLOCK_DIM: u64 = 8192;

/// IMODE: how bands are interleaved in the image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// B: band interleaved by block.
    Block,
    /// P: band interleaved by pixel.
    Pixel,
    /// R: band interleaved by row.
    Row,
    /// S: band sequential.
    Sequential,
}

impl ImageMode {
    pub fn code(self) -> &'static str {
        match self {
            ImageMode::Block => "B",
            ImageMode::Pixel => "P",
            ImageMode::Row => "R",
            ImageMode::Sequential => "S",
        }
    }

    pub fn from_code(code: &str) -> Option<ImageMode> {
        match code {
            "B" => Some(ImageMode::Block),
            "P" => Some(ImageMode::Pixel),
            "R" => Some(ImageMode::Row),
            "S" => Some(ImageMode::Sequential),
            _ => None,
        }
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    // NELUT: Number of entries in each table.
    pub entries: usize,
    // LUTD: One table of `entries` bytes per LUT.
    pub tables: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandInfo {
    // IREPBAND: Band representation.
    pub representation: String,
    // ISUBCAT: Band subcategory.
    pub subcategory: String,
    // IFC: Band image filter condition.
    pub filter_condition: String,
    // IMFLT: Band standard image filter code.
    pub filter_code: String,
    pub lut: Option<LookupTable>,
}

impl Default for BandInfo {
    fn default() -> Self {
        BandInfo {
            representation: String::new(),
            subcategory: String::new(),
            filter_condition: "N".to_owned(),
            filter_code: String::new(),
            lut: None,
        }
    }
}

impl BandInfo {
    fn read(reader: &mut FieldReader) -> Result<BandInfo, NitfError> {
        let mut band = BandInfo {
            representation: reader.text("IREPBAND", 2)?,
            subcategory: reader.text("ISUBCAT", 6)?,
            filter_condition: reader.text("IFC", 1)?,
            filter_code: reader.text("IMFLT", 3)?,
            lut: None,
        };
        let num_luts = reader.unsigned("NLUTS", 1)? as usize;
        if num_luts > 0 {
            let entries = reader.unsigned("NELUT", 5)? as usize;
            let mut tables = Vec::with_capacity(num_luts);
            for _ in 0..num_luts {
                // `bytes` checks against what the subheader holds before
                // copying.
                tables.push(reader.bytes("LUTD", entries)?);
            }
            band.lut = Some(LookupTable { entries, tables });
        }
        Ok(band)
    }

    fn write(&self, writer: &mut FieldWriter) -> Result<(), NitfError> {
        writer.text("IREPBAND", 2, &self.representation)?;
        writer.text("ISUBCAT", 6, &self.subcategory)?;
        writer.text("IFC", 1, &self.filter_condition)?;
        writer.text("IMFLT", 3, &self.filter_code)?;
        match &self.lut {
            None => writer.unsigned("NLUTS", 1, 0),
            Some(lut) => {
                writer.unsigned("NLUTS", 1, lut.tables.len() as u64)?;
                writer.unsigned("NELUT", 5, lut.entries as u64)?;
                for table in &lut.tables {
                    writer.bytes("LUTD", lut.entries, table)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSubheader {
    // IID1: Image identifier 1.
    pub id: String,
    // IDATIM: Image date and time.
    pub date_time: String,
    // TGTID: Target identifier.
    pub target_id: String,
    // IID2: Image identifier 2.
    pub title: String,
    // ISCLAS: Image security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // ENCRYP: Encryption.
    pub encrypted: u64,
    // ISORCE: Image source.
    pub source: String,
    // NROWS: Number of significant rows in image.
    pub num_rows: u64,
    // NCOLS: Number of significant columns in image.
    pub num_cols: u64,
    // PVTYPE: Pixel value type.
    pub pixel_value_type: String,
    // IREP: Image representation.
    pub representation: String,
    // ICAT: Image category.
    pub category: String,
    // ABPP: Actual bits-per-pixel per band.
    pub actual_bits_per_pixel: u64,
    // PJUST: Pixel justification.
    pub justification: String,
    // ICORDS: Image coordinate representation, blank for none.
    pub coordinate_system: String,
    // IGEOLO: Image geographic location, present when ICORDS is set.
    pub geolocation: String,
    // ICOM: Image comments, at most nine.
    pub comments: Vec<String>,
    // IC: Image compression.
    pub compression: String,
    // COMRAT: Compression rate code, present for compressed images.
    pub compression_rate: String,
    pub bands: Vec<BandInfo>,
    // ISYNC: Image sync code.
    pub sync_code: u64,
    pub mode: ImageMode,
    // NBPR: Number of blocks per row.
    pub blocks_per_row: u64,
    // NBPC: Number of blocks per column.
    pub blocks_per_col: u64,
    // NPPBH: Pixels per block horizontal, 0 for a single unblocked column.
    pub block_cols: u64,
    // NPPBV: Pixels per block vertical, 0 for a single unblocked row.
    pub block_rows: u64,
    // NBPP: Number of bits per pixel per band.
    pub bits_per_pixel: u64,
    // IDLVL: Image display level.
    pub display_level: u64,
    // IALVL: Attachment level.
    pub attachment_level: u64,
    // ILOC: Image location relative to the attachment.
    pub location: Offset,
    // IMAG: Image magnification.
    pub magnification: String,
    // UDID: User defined image data.
    pub user_defined: Extensions,
    // UDOFL: User defined overflow.
    pub user_defined_overflow: u64,
    // IXSHD: Image extended subheader data.
    pub extended: Extensions,
    // IXSOFL: Image extended subheader overflow.
    pub extended_overflow: u64,
}

impl Default for ImageSubheader {
    fn default() -> Self {
        ImageSubheader {
            id: String::new(),
            date_time: String::new(),
            target_id: String::new(),
            title: String::new(),
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            encrypted: 0,
            source: String::new(),
            num_rows: 0,
            num_cols: 0,
            pixel_value_type: "INT".to_owned(),
            representation: "MONO".to_owned(),
            category: "VIS".to_owned(),
            actual_bits_per_pixel: 8,
            justification: "R".to_owned(),
            coordinate_system: String::new(),
            geolocation: String::new(),
            comments: Vec::new(),
            compression: "NC".to_owned(),
            compression_rate: String::new(),
            bands: vec![BandInfo {
                representation: "M".to_owned(),
                ..BandInfo::default()
            }],
            sync_code: 0,
            mode: ImageMode::Block,
            blocks_per_row: 1,
            blocks_per_col: 1,
            block_cols: 0,
            block_rows: 0,
            bits_per_pixel: 8,
            display_level: 1,
            attachment_level: 0,
            location: Offset::default(),
            magnification: "1.0".to_owned(),
            user_defined: Extensions::new(),
            user_defined_overflow: 0,
            extended: Extensions::new(),
            extended_overflow: 0,
        }
    }
}

fn blocking(total: u64, block: u64) -> (u64, u64) {
    if block == 0 || block >= total {
        let size = if total > MAX_BLOCK_DIM { 0 } else { total };
        (1, size)
    } else {
        ((total + block - 1) / block, block)
    }
}

impl ImageSubheader {
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    /// Storage bytes of one pixel of one band.
    pub fn bytes_per_pixel(&self) -> u64 {
        (self.bits_per_pixel + 7) / 8
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self.compression.as_str(), "NC" | "NM")
    }

    /// NPPBV with 0 resolved to the image height.
    pub fn effective_block_rows(&self) -> u64 {
        if self.block_rows == 0 {
            self.num_rows
        } else {
            self.block_rows
        }
    }

    /// NPPBH with 0 resolved to the image width.
    pub fn effective_block_cols(&self) -> u64 {
        if self.block_cols == 0 {
            self.num_cols
        } else {
            self.block_cols
        }
    }

    /// Sets NBPR, NBPC, NPPBH and NPPBV from NROWS/NCOLS and the requested
    /// block size. Zero, or a size covering the image, means unblocked in
    /// that direction.
    pub fn set_blocking(&mut self, block_rows: u64, block_cols: u64) {
        let (blocks_per_col, rows) = blocking(self.num_rows, block_rows);
        let (blocks_per_row, cols) = blocking(self.num_cols, block_cols);
        self.blocks_per_col = blocks_per_col;
        self.block_rows = rows;
        self.blocks_per_row = blocks_per_row;
        self.block_cols = cols;
    }

    pub(crate) fn decode(
        data: &[u8],
        index: usize,
        ctx: &mut TreContext,
    ) -> Result<ImageSubheader, NitfError> {
        let location = Location::Image(index);
        info!("Image subheader {} start, {} bytes", index, data.len());
        let mut reader = FieldReader::new(data, location);
        let part_type = reader.text("IM", 2)?;
        if part_type != "IM" {
            return Err(NitfError::Structural {
                location,
                reason: format!("expected IM, found {:?}", part_type),
            });
        }

        let mut subheader = ImageSubheader {
            id: reader.text("IID1", 10)?,
            date_time: reader.text("IDATIM", 14)?,
            target_id: reader.text("TGTID", 17)?,
            title: reader.text("IID2", 80)?,
            classification: reader.text("ISCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            encrypted: reader.unsigned("ENCRYP", 1)?,
            source: reader.text("ISORCE", 42)?,
            num_rows: reader.unsigned("NROWS", 8)?,
            num_cols: reader.unsigned("NCOLS", 8)?,
            pixel_value_type: reader.text("PVTYPE", 3)?,
            representation: reader.text("IREP", 8)?,
            category: reader.text("ICAT", 8)?,
            actual_bits_per_pixel: reader.unsigned("ABPP", 2)?,
            justification: reader.text("PJUST", 1)?,
            coordinate_system: reader.text("ICORDS", 1)?,
            bands: Vec::new(),
            ..ImageSubheader::default()
        };
        if !subheader.coordinate_system.is_empty() {
            subheader.geolocation = reader.text("IGEOLO", 60)?;
        }

        let num_comments = reader.unsigned("NICOM", 1)?;
        for _ in 0..num_comments {
            subheader.comments.push(reader.text("ICOM", 80)?);
        }

        subheader.compression = reader.text("IC", 2)?;
        if subheader.is_compressed() {
            subheader.compression_rate = reader.text("COMRAT", 4)?;
        }

        let mut num_bands = reader.unsigned("NBANDS", 1)?;
        if num_bands == 0 {
            num_bands = reader.unsigned("XBANDS", 5)?;
        }
        for _ in 0..num_bands {
            // Every band needs at least 13 bytes, so a bogus count runs out
            // of subheader long before it runs out of memory.
            subheader.bands.push(BandInfo::read(&mut reader)?);
        }

        subheader.sync_code = reader.unsigned("ISYNC", 1)?;
        let mode = reader.text("IMODE", 1)?;
        subheader.mode = ImageMode::from_code(&mode).ok_or_else(|| NitfError::Structural {
            location,
            reason: format!("unknown IMODE {:?}", mode),
        })?;
        subheader.blocks_per_row = reader.unsigned("NBPR", 4)?;
        subheader.blocks_per_col = reader.unsigned("NBPC", 4)?;
        subheader.block_cols = reader.unsigned("NPPBH", 4)?;
        subheader.block_rows = reader.unsigned("NPPBV", 4)?;
        subheader.bits_per_pixel = reader.unsigned("NBPP", 2)?;
        subheader.display_level = reader.unsigned("IDLVL", 3)?;
        subheader.attachment_level = reader.unsigned("IALVL", 3)?;
        subheader.location = reader.offset_pair("ILOC")?;
        subheader.magnification = reader.text("IMAG", 4)?;

        let (user_defined, user_defined_overflow) = reader.extensions("UDIDL", "UDOFL", ctx)?;
        subheader.user_defined = user_defined;
        subheader.user_defined_overflow = user_defined_overflow;
        let (extended, extended_overflow) = reader.extensions("IXSHDL", "IXSOFL", ctx)?;
        subheader.extended = extended;
        subheader.extended_overflow = extended_overflow;

        reader.finish("LISH")?;
        info!(
            "Image subheader {} finish, {}x{} with {} bands, IMODE {}",
            index,
            subheader.num_rows,
            subheader.num_cols,
            subheader.bands.len(),
            subheader.mode
        );
        Ok(subheader)
    }

    pub(crate) fn encode(&self, index: usize) -> Result<Vec<u8>, NitfError> {
        let location = Location::Image(index);
        let mut writer = FieldWriter::new(location);
        writer.text("IM", 2, "IM")?;
        writer.text("IID1", 10, &self.id)?;
        writer.text("IDATIM", 14, &self.date_time)?;
        writer.text("TGTID", 17, &self.target_id)?;
        writer.text("IID2", 80, &self.title)?;
        writer.text("ISCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        writer.unsigned("ENCRYP", 1, self.encrypted)?;
        writer.text("ISORCE", 42, &self.source)?;
        writer.unsigned("NROWS", 8, self.num_rows)?;
        writer.unsigned("NCOLS", 8, self.num_cols)?;
        writer.text("PVTYPE", 3, &self.pixel_value_type)?;
        writer.text("IREP", 8, &self.representation)?;
        writer.text("ICAT", 8, &self.category)?;
        writer.unsigned("ABPP", 2, self.actual_bits_per_pixel)?;
        writer.text("PJUST", 1, &self.justification)?;
        writer.text("ICORDS", 1, &self.coordinate_system)?;
        if !self.coordinate_system.is_empty() {
            writer.text("IGEOLO", 60, &self.geolocation)?;
        }

        if self.comments.len() > 9 {
            return Err(NitfError::ToWrite {
                location,
                reason: format!("{} comments, at most 9 allowed", self.comments.len()),
            });
        }
        writer.unsigned("NICOM", 1, self.comments.len() as u64)?;
        for comment in &self.comments {
            writer.text("ICOM", 80, comment)?;
        }

        writer.text("IC", 2, &self.compression)?;
        if self.is_compressed() {
            writer.text("COMRAT", 4, &self.compression_rate)?;
        }

        if self.bands.is_empty() {
            return Err(NitfError::ToWrite {
                location,
                reason: "image has no bands".to_owned(),
            });
        }
        if self.bands.len() <= 9 {
            writer.unsigned("NBANDS", 1, self.bands.len() as u64)?;
        } else {
            writer.unsigned("NBANDS", 1, 0)?;
            writer.unsigned("XBANDS", 5, self.bands.len() as u64)?;
        }
        for band in &self.bands {
            band.write(&mut writer)?;
        }

        writer.unsigned("ISYNC", 1, self.sync_code)?;
        writer.text("IMODE", 1, self.mode.code())?;
        writer.unsigned("NBPR", 4, self.blocks_per_row)?;
        writer.unsigned("NBPC", 4, self.blocks_per_col)?;
        writer.unsigned("NPPBH", 4, self.block_cols)?;
        writer.unsigned("NPPBV", 4, self.block_rows)?;
        writer.unsigned("NBPP", 2, self.bits_per_pixel)?;
        writer.unsigned("IDLVL", 3, self.display_level)?;
        writer.unsigned("IALVL", 3, self.attachment_level)?;
        writer.offset_pair("ILOC", self.location)?;
        writer.text("IMAG", 4, &self.magnification)?;

        writer.extensions(
            "UDIDL",
            "UDOFL",
            &self.user_defined,
            self.user_defined_overflow,
        )?;
        writer.extensions(
            "IXSHDL",
            "IXSOFL",
            &self.extended,
            self.extended_overflow,
        )?;
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tre::Registry;

    fn decode(bytes: &[u8]) -> Result<ImageSubheader, NitfError> {
        let registry = Registry::new();
        let mut warnings = Vec::new();
        let mut ctx = TreContext {
            registry: &registry,
            strict: false,
            warnings: &mut warnings,
        };
        ImageSubheader::decode(bytes, 0, &mut ctx)
    }

    #[test]
    fn test_default_round_trip() {
        let subheader = ImageSubheader {
            num_rows: 10,
            num_cols: 20,
            ..ImageSubheader::default()
        };
        let bytes = subheader.encode(0).unwrap();
        assert_eq!(decode(&bytes).unwrap(), subheader);
    }

    #[test]
    fn test_full_round_trip() {
        let mut bands: Vec<BandInfo> = (0..12)
            .map(|i| BandInfo {
                representation: if i == 0 { "LU".to_owned() } else { String::new() },
                subcategory: format!("{}", i),
                ..BandInfo::default()
            })
            .collect();
        bands[0].lut = Some(LookupTable {
            entries: 4,
            tables: vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
        });
        let subheader = ImageSubheader {
            num_rows: 5000,
            num_cols: 9000,
            coordinate_system: "G".to_owned(),
            geolocation: "X".repeat(60),
            comments: vec!["first".to_owned(), "second".to_owned()],
            compression: "C8".to_owned(),
            compression_rate: "N045".to_owned(),
            bands,
            mode: ImageMode::Sequential,
            location: Offset::new(-5, 10),
            ..ImageSubheader::default()
        };
        let bytes = subheader.encode(0).unwrap();
        assert_eq!(decode(&bytes).unwrap(), subheader);
    }

    #[test]
    fn test_truncated_lut() {
        let mut subheader = ImageSubheader::default();
        subheader.bands[0].lut = Some(LookupTable {
            entries: 3,
            tables: vec![vec![1, 2, 3]],
        });
        let mut bytes = subheader.encode(0).unwrap();
        // Claim 99999 entries per table.
        let nelut = bytes
            .windows(8)
            .position(|w| w == b"00003\x01\x02\x03")
            .unwrap();
        bytes[nelut..nelut + 5].copy_from_slice(b"99999");
        assert!(matches!(decode(&bytes), Err(NitfError::Truncated { .. })));
    }

    #[test]
    fn test_wrong_part_type() {
        let mut bytes = ImageSubheader::default().encode(0).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(NitfError::Structural { .. })));
    }

    #[test]
    fn test_set_blocking() {
        let mut subheader = ImageSubheader {
            num_rows: 99_328,
            num_cols: 37_287,
            ..ImageSubheader::default()
        };
        subheader.set_blocking(1024, 1024);
        assert_eq!(subheader.blocks_per_row, 37);
        assert_eq!(subheader.blocks_per_col, 97);
        assert_eq!(subheader.effective_block_rows(), 1024);

        subheader.set_blocking(0, 0);
        assert_eq!(subheader.block_rows, 0);
        assert_eq!(subheader.effective_block_rows(), 99_328);
        assert_eq!(subheader.blocks_per_col, 1);

        subheader.num_rows = 500;
        subheader.set_blocking(1024, 0);
        assert_eq!(subheader.block_rows, 500);
    }
}
