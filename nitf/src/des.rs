use crate::fields::{FieldReader, FieldWriter};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::info;
use std::fmt;

/// DESID of the segments that carry TREs which did not fit their owner.
pub const OVERFLOW_DESID: &str = "TRE_OVERFLOW";

/// DESOFLW: the extension section a TRE_OVERFLOW segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverflowSection {
    UserDefinedHeader,
    ExtendedHeader,
    UserDefinedImage,
    ExtendedImage,
    ExtendedGraphic,
    ExtendedText,
}

impl OverflowSection {
    pub fn code(self) -> &'static str {
        match self {
            OverflowSection::UserDefinedHeader => "UDHD",
            OverflowSection::ExtendedHeader => "XHD",
            OverflowSection::UserDefinedImage => "UDID",
            OverflowSection::ExtendedImage => "IXSHD",
            OverflowSection::ExtendedGraphic => "SXSHD",
            OverflowSection::ExtendedText => "TXSHD",
        }
    }

    pub fn from_code(code: &str) -> Option<OverflowSection> {
        match code {
            "UDHD" => Some(OverflowSection::UserDefinedHeader),
            "XHD" => Some(OverflowSection::ExtendedHeader),
            "UDID" => Some(OverflowSection::UserDefinedImage),
            "IXSHD" => Some(OverflowSection::ExtendedImage),
            "SXSHD" => Some(OverflowSection::ExtendedGraphic),
            "TXSHD" => Some(OverflowSection::ExtendedText),
            _ => None,
        }
    }

    /// Largest value the section's length field may take.
    pub fn limit(self) -> usize {
        match self {
            OverflowSection::UserDefinedHeader
            | OverflowSection::ExtendedHeader
            | OverflowSection::UserDefinedImage
            | OverflowSection::ExtendedImage => 99_999,
            // LSSH and LTSH are 4 digits; the fixed subheader takes the rest.
            OverflowSection::ExtendedGraphic => 9_741,
            OverflowSection::ExtendedText => 9_717,
        }
    }
}

impl fmt::Display for OverflowSection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Owner of an overflowed section: DESOFLW plus DESITEM, where the item is
/// 0 for the file header and the 1-based segment number otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverflowTarget {
    pub section: OverflowSection,
    pub item: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataExtensionSubheader {
    // DESID: Unique DES type identifier.
    pub type_id: String,
    // DESVER: Version of the data field definition.
    pub version: u64,
    // DESCLAS: DES security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // DESOFLW and DESITEM, present for TRE_OVERFLOW.
    pub overflow: Option<OverflowTarget>,
    // DESSHF: DES user-defined subheader fields.
    pub user_subheader: Vec<u8>,
}

impl Default for DataExtensionSubheader {
    fn default() -> Self {
        DataExtensionSubheader {
            type_id: String::new(),
            version: 1,
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            overflow: None,
            user_subheader: Vec::new(),
        }
    }
}

impl DataExtensionSubheader {
    /// Subheader of a TRE_OVERFLOW segment carrying the owner's security
    /// markings.
    pub fn overflow(
        target: OverflowTarget,
        classification: &str,
        security: &SecurityGroup,
    ) -> DataExtensionSubheader {
        DataExtensionSubheader {
            type_id: OVERFLOW_DESID.to_owned(),
            version: 1,
            classification: classification.to_owned(),
            security: security.clone(),
            overflow: Some(target),
            user_subheader: Vec::new(),
        }
    }

    pub fn is_overflow(&self) -> bool {
        self.type_id == OVERFLOW_DESID
    }

    pub(crate) fn decode(data: &[u8], index: usize) -> Result<DataExtensionSubheader, NitfError> {
        let location = Location::DataExtension(index);
        info!("DES subheader {} start, {} bytes", index, data.len());
        let mut reader = FieldReader::new(data, location);
        let part_type = reader.text("DE", 2)?;
        if part_type != "DE" {
            return Err(NitfError::Structural {
                location,
                reason: format!("expected DE, found {:?}", part_type),
            });
        }

        let mut subheader = DataExtensionSubheader {
            type_id: reader.text("DESID", 25)?,
            version: reader.unsigned("DESVER", 2)?,
            classification: reader.text("DESCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            ..DataExtensionSubheader::default()
        };
        if subheader.is_overflow() {
            let code = reader.text("DESOFLW", 6)?;
            let section =
                OverflowSection::from_code(&code).ok_or_else(|| NitfError::Structural {
                    location,
                    reason: format!("unknown DESOFLW {:?}", code),
                })?;
            let item = reader.unsigned("DESITEM", 3)?;
            subheader.overflow = Some(OverflowTarget { section, item });
        }
        let user_length = reader.unsigned("DESSHL", 4)? as usize;
        subheader.user_subheader = reader.bytes("DESSHF", user_length)?;

        reader.finish("LDSH")?;
        info!("DES subheader {} finish, DESID {}", index, subheader.type_id);
        Ok(subheader)
    }

    pub(crate) fn encode(&self, index: usize) -> Result<Vec<u8>, NitfError> {
        let location = Location::DataExtension(index);
        let mut writer = FieldWriter::new(location);
        writer.text("DE", 2, "DE")?;
        writer.text("DESID", 25, &self.type_id)?;
        writer.unsigned("DESVER", 2, self.version)?;
        writer.text("DESCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        if self.is_overflow() {
            let target = self.overflow.ok_or_else(|| NitfError::ToWrite {
                location,
                reason: "TRE_OVERFLOW segment without an owner".to_owned(),
            })?;
            writer.text("DESOFLW", 6, target.section.code())?;
            writer.unsigned("DESITEM", 3, target.item)?;
        }
        writer.unsigned("DESSHL", 4, self.user_subheader.len() as u64)?;
        writer.bytes("DESSHF", self.user_subheader.len(), &self.user_subheader)?;
        Ok(writer.finish())
    }
}
