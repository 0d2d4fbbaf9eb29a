use crate::fields::{FieldReader, FieldWriter};
use crate::NitfError;

/// Encoded size of the group.
pub const SECURITY_GROUP_LEN: usize = 166;

/// Security fields shared by the file header and every subheader. The
/// owning structure's prefix (FS, IS, SS, TS, DES, RES) is dropped from the
/// names below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroup {
    // CLSY: Classification system.
    pub classification_system: String,
    // CODE: Codewords.
    pub codewords: String,
    // CTLH: Control and handling.
    pub control_and_handling: String,
    // REL: Releasing instructions.
    pub releasing_instructions: String,
    // DCTP: Declassification type.
    pub declassification_type: String,
    // DCDT: Declassification date.
    pub declassification_date: String,
    // DCXM: Declassification exemption.
    pub declassification_exemption: String,
    // DG: Downgrade.
    pub downgrade: String,
    // DGDT: Downgrade date.
    pub downgrade_date: String,
    // CLTX: Classification text.
    pub classification_text: String,
    // CATP: Classification authority type.
    pub authority_type: String,
    // CAUT: Classification authority.
    pub authority: String,
    // CRSN: Classification reason.
    pub reason: String,
    // SRDT: Security source date.
    pub source_date: String,
    // CTLN: Security control number.
    pub control_number: String,
}

impl SecurityGroup {
    pub(crate) fn read(reader: &mut FieldReader) -> Result<SecurityGroup, NitfError> {
        Ok(SecurityGroup {
            classification_system: reader.text("CLSY", 2)?,
            codewords: reader.text("CODE", 11)?,
            control_and_handling: reader.text("CTLH", 2)?,
            releasing_instructions: reader.text("REL", 20)?,
            declassification_type: reader.text("DCTP", 2)?,
            declassification_date: reader.text("DCDT", 8)?,
            declassification_exemption: reader.text("DCXM", 4)?,
            downgrade: reader.text("DG", 1)?,
            downgrade_date: reader.text("DGDT", 8)?,
            classification_text: reader.text("CLTX", 43)?,
            authority_type: reader.text("CATP", 1)?,
            authority: reader.text("CAUT", 40)?,
            reason: reader.text("CRSN", 1)?,
            source_date: reader.text("SRDT", 8)?,
            control_number: reader.text("CTLN", 15)?,
        })
    }

    pub(crate) fn write(&self, writer: &mut FieldWriter) -> Result<(), NitfError> {
        writer.text("CLSY", 2, &self.classification_system)?;
        writer.text("CODE", 11, &self.codewords)?;
        writer.text("CTLH", 2, &self.control_and_handling)?;
        writer.text("REL", 20, &self.releasing_instructions)?;
        writer.text("DCTP", 2, &self.declassification_type)?;
        writer.text("DCDT", 8, &self.declassification_date)?;
        writer.text("DCXM", 4, &self.declassification_exemption)?;
        writer.text("DG", 1, &self.downgrade)?;
        writer.text("DGDT", 8, &self.downgrade_date)?;
        writer.text("CLTX", 43, &self.classification_text)?;
        writer.text("CATP", 1, &self.authority_type)?;
        writer.text("CAUT", 40, &self.authority)?;
        writer.text("CRSN", 1, &self.reason)?;
        writer.text("SRDT", 8, &self.source_date)?;
        writer.text("CTLN", 15, &self.control_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    #[test]
    fn test_security_group_width() {
        let group = SecurityGroup {
            classification_system: "US".to_owned(),
            control_number: "123".to_owned(),
            ..SecurityGroup::default()
        };
        let mut writer = FieldWriter::new(Location::FileHeader);
        group.write(&mut writer).unwrap();
        let bytes = writer.finish();
        assert_eq!(bytes.len(), SECURITY_GROUP_LEN);

        let mut reader = FieldReader::new(&bytes, Location::FileHeader);
        assert_eq!(SecurityGroup::read(&mut reader).unwrap(), group);
        assert_eq!(reader.remaining(), 0);
    }
}
