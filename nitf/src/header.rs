use crate::fields::{FieldReader, FieldWriter, TreContext};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::{info, warn};
use tre::Extensions;

/// Bytes from FHDR through HL.
pub const FIXED_LEN: usize = 360;
/// A header with no segments and no extensions.
pub const MIN_LEN: usize = 388;
/// Offset of the 6-digit HL field.
pub(crate) const HL_OFFSET: usize = 354;
pub(crate) const HL_LEN: usize = 6;
/// Largest count each segment group admits.
pub const MAX_SEGMENTS: usize = 999;

/// Lengths of one segment as listed in the file header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    pub subheader_length: u64,
    pub data_length: u64,
}

// (subheader length width, data length width) per segment group.
pub(crate) const IMAGE_WIDTHS: (usize, usize) = (6, 10);
pub(crate) const GRAPHIC_WIDTHS: (usize, usize) = (4, 6);
pub(crate) const TEXT_WIDTHS: (usize, usize) = (4, 5);
pub(crate) const DES_WIDTHS: (usize, usize) = (4, 9);
pub(crate) const RES_WIDTHS: (usize, usize) = (4, 7);

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    // FHDR: File profile name, NITF or NSIF.
    pub profile: String,
    // FVER: File version.
    pub version: String,
    // CLEVEL: Complexity level.
    pub complexity_level: u64,
    // STYPE: Standard type.
    pub system_type: String,
    // OSTAID: Originating station ID.
    pub originating_station: String,
    // FDT: File date and time.
    pub date_time: String,
    // FTITLE: File title.
    pub title: String,
    // FSCLAS: File security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // FSCOP: File copy number.
    pub copy_number: u64,
    // FSCPYS: File number of copies.
    pub num_copies: u64,
    // ENCRYP: Encryption.
    pub encrypted: u64,
    // FBKGC: File background color, three binary bytes.
    pub background_color: [u8; 3],
    // ONAME: Originator's name.
    pub originator_name: String,
    // OPHONE: Originator's phone number.
    pub originator_phone: String,
    // FL: File length.
    pub file_length: u64,
    // HL: NITF file header length.
    pub header_length: u64,
    pub images: Vec<ComponentInfo>,
    pub graphics: Vec<ComponentInfo>,
    pub texts: Vec<ComponentInfo>,
    pub data_extensions: Vec<ComponentInfo>,
    pub reserved_extensions: Vec<ComponentInfo>,
    // UDHD: User defined header data.
    pub user_defined: Extensions,
    // UDHOFL: User defined header overflow.
    pub user_defined_overflow: u64,
    // XHD: Extended header data.
    pub extended: Extensions,
    // XHDLOFL: Extended header data overflow.
    pub extended_overflow: u64,
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            profile: "NITF".to_owned(),
            version: "02.10".to_owned(),
            complexity_level: 3,
            system_type: "BF01".to_owned(),
            originating_station: String::new(),
            date_time: String::new(),
            title: String::new(),
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            copy_number: 0,
            num_copies: 0,
            encrypted: 0,
            background_color: [0; 3],
            originator_name: String::new(),
            originator_phone: String::new(),
            file_length: 0,
            header_length: 0,
            images: Vec::new(),
            graphics: Vec::new(),
            texts: Vec::new(),
            data_extensions: Vec::new(),
            reserved_extensions: Vec::new(),
            user_defined: Extensions::new(),
            user_defined_overflow: 0,
            extended: Extensions::new(),
            extended_overflow: 0,
        }
    }
}

/// Accepts `NITF02.10` and `NSIF01.00`.
pub(crate) fn check_signature(prefix: &[u8]) -> Result<(), NitfError> {
    let signature = String::from_utf8_lossy(prefix).into_owned();
    match &prefix[..] {
        b"NITF02.10" | b"NSIF01.00" => Ok(()),
        [b'N', b'I', b'T', b'F', version @ ..] | [b'N', b'S', b'I', b'F', version @ ..] => {
            Err(NitfError::UnsupportedVersion {
                version: String::from_utf8_lossy(version).into_owned(),
            })
        }
        _ => Err(NitfError::NotNitf { signature }),
    }
}

fn read_components(
    reader: &mut FieldReader,
    count_field: &'static str,
    subheader_field: &'static str,
    data_field: &'static str,
    (subheader_width, data_width): (usize, usize),
) -> Result<Vec<ComponentInfo>, NitfError> {
    let count = reader.unsigned(count_field, 3)?;
    let mut infos = Vec::with_capacity(count as usize);
    for _ in 0..count {
        infos.push(ComponentInfo {
            subheader_length: reader.unsigned(subheader_field, subheader_width)?,
            data_length: reader.unsigned(data_field, data_width)?,
        });
    }
    Ok(infos)
}

fn write_components(
    writer: &mut FieldWriter,
    count_field: &'static str,
    subheader_field: &'static str,
    data_field: &'static str,
    (subheader_width, data_width): (usize, usize),
    infos: &[ComponentInfo],
) -> Result<(), NitfError> {
    writer.unsigned(count_field, 3, infos.len() as u64)?;
    for info in infos {
        writer.unsigned(subheader_field, subheader_width, info.subheader_length)?;
        writer.unsigned(data_field, data_width, info.data_length)?;
    }
    Ok(())
}

impl FileHeader {
    pub(crate) fn decode(data: &[u8], ctx: &mut TreContext) -> Result<FileHeader, NitfError> {
        info!("File header start, {} bytes", data.len());
        let mut reader = FieldReader::new(data, Location::FileHeader);
        check_signature(reader.take("FHDR", 9)?)?;
        let profile = String::from_utf8_lossy(&data[..4]).into_owned();
        let version = String::from_utf8_lossy(&data[4..9]).into_owned();

        let mut header = FileHeader {
            profile,
            version,
            complexity_level: reader.unsigned("CLEVEL", 2)?,
            system_type: reader.text("STYPE", 4)?,
            originating_station: reader.text("OSTAID", 10)?,
            date_time: reader.text("FDT", 14)?,
            title: reader.text("FTITLE", 80)?,
            classification: reader.text("FSCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            copy_number: reader.unsigned_or_blank("FSCOP", 5)?,
            num_copies: reader.unsigned_or_blank("FSCPYS", 5)?,
            encrypted: reader.unsigned("ENCRYP", 1)?,
            ..FileHeader::default()
        };
        header
            .background_color
            .copy_from_slice(reader.take("FBKGC", 3)?);
        header.originator_name = reader.text("ONAME", 24)?;
        header.originator_phone = reader.text("OPHONE", 18)?;
        header.file_length = reader.unsigned("FL", 12)?;
        header.header_length = reader.unsigned("HL", HL_LEN)?;

        header.images = read_components(&mut reader, "NUMI", "LISH", "LI", IMAGE_WIDTHS)?;
        header.graphics = read_components(&mut reader, "NUMS", "LSSH", "LS", GRAPHIC_WIDTHS)?;
        let reserved = reader.unsigned_or_blank("NUMX", 3)?;
        if reserved != 0 {
            warn!("file header NUMX is {}, expected 0", reserved);
        }
        header.texts = read_components(&mut reader, "NUMT", "LTSH", "LT", TEXT_WIDTHS)?;
        header.data_extensions =
            read_components(&mut reader, "NUMDES", "LDSH", "LD", DES_WIDTHS)?;
        header.reserved_extensions =
            read_components(&mut reader, "NUMRES", "LRESH", "LRE", RES_WIDTHS)?;

        let (user_defined, user_defined_overflow) = reader.extensions("UDHDL", "UDHOFL", ctx)?;
        header.user_defined = user_defined;
        header.user_defined_overflow = user_defined_overflow;
        let (extended, extended_overflow) = reader.extensions("XHDL", "XHDLOFL", ctx)?;
        header.extended = extended;
        header.extended_overflow = extended_overflow;

        reader.finish("HL")?;
        info!(
            "File header finish, {} images, {} graphics, {} texts, {} DES, {} RES",
            header.images.len(),
            header.graphics.len(),
            header.texts.len(),
            header.data_extensions.len(),
            header.reserved_extensions.len()
        );
        Ok(header)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, NitfError> {
        let mut writer = FieldWriter::new(Location::FileHeader);
        writer.text("FHDR", 4, &self.profile)?;
        writer.text("FVER", 5, &self.version)?;
        writer.unsigned("CLEVEL", 2, self.complexity_level)?;
        writer.text("STYPE", 4, &self.system_type)?;
        writer.text("OSTAID", 10, &self.originating_station)?;
        writer.text("FDT", 14, &self.date_time)?;
        writer.text("FTITLE", 80, &self.title)?;
        writer.text("FSCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        writer.unsigned("FSCOP", 5, self.copy_number)?;
        writer.unsigned("FSCPYS", 5, self.num_copies)?;
        writer.unsigned("ENCRYP", 1, self.encrypted)?;
        writer.bytes("FBKGC", 3, &self.background_color)?;
        writer.text("ONAME", 24, &self.originator_name)?;
        writer.text("OPHONE", 18, &self.originator_phone)?;
        writer.unsigned("FL", 12, self.file_length)?;
        writer.unsigned("HL", HL_LEN, self.header_length)?;

        write_components(&mut writer, "NUMI", "LISH", "LI", IMAGE_WIDTHS, &self.images)?;
        write_components(&mut writer, "NUMS", "LSSH", "LS", GRAPHIC_WIDTHS, &self.graphics)?;
        writer.unsigned("NUMX", 3, 0)?;
        write_components(&mut writer, "NUMT", "LTSH", "LT", TEXT_WIDTHS, &self.texts)?;
        write_components(
            &mut writer,
            "NUMDES",
            "LDSH",
            "LD",
            DES_WIDTHS,
            &self.data_extensions,
        )?;
        write_components(
            &mut writer,
            "NUMRES",
            "LRESH",
            "LRE",
            RES_WIDTHS,
            &self.reserved_extensions,
        )?;

        writer.extensions(
            "UDHDL",
            "UDHOFL",
            &self.user_defined,
            self.user_defined_overflow,
        )?;
        writer.extensions("XHDL", "XHDLOFL", &self.extended, self.extended_overflow)?;
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tre::{Registry, Tre};

    fn decode(bytes: &[u8]) -> Result<FileHeader, NitfError> {
        let registry = Registry::new();
        let mut warnings = Vec::new();
        let mut ctx = TreContext {
            registry: &registry,
            strict: false,
            warnings: &mut warnings,
        };
        FileHeader::decode(bytes, &mut ctx)
    }

    #[test]
    fn test_minimal_header_length() {
        let header = FileHeader::default();
        let bytes = header.encode().unwrap();
        assert_eq!(bytes.len(), MIN_LEN);
        assert_eq!(&bytes[HL_OFFSET - 12..HL_OFFSET], b"000000000000");
        assert_eq!(bytes.len() - FIXED_LEN, 28);
    }

    #[test]
    fn test_header_round_trip() {
        let mut header = FileHeader {
            title: "Round trip".to_owned(),
            background_color: [1, 2, 3],
            file_length: 1000,
            ..FileHeader::default()
        };
        header.images.push(ComponentInfo {
            subheader_length: 500,
            data_length: 12,
        });
        header.data_extensions.push(ComponentInfo {
            subheader_length: 200,
            data_length: 9,
        });
        header
            .extended
            .push(Tre::raw("HDRTRE", b"payload".to_vec()).unwrap());
        header.user_defined_overflow = 1;

        let mut bytes = header.encode().unwrap();
        header.header_length = bytes.len() as u64;
        bytes = header.encode().unwrap();

        assert_eq!(decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_signatures() {
        assert!(check_signature(b"NITF02.10").is_ok());
        assert!(check_signature(b"NSIF01.00").is_ok());
        assert!(matches!(
            check_signature(b"NITF02.00"),
            Err(NitfError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            check_signature(b"GIF89a..."),
            Err(NitfError::NotNitf { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = FileHeader::default().encode().unwrap();
        bytes.push(b'0');
        assert!(matches!(decode(&bytes), Err(NitfError::Structural { .. })));
    }
}
