use crate::fields::{FieldReader, FieldWriter};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedExtensionSubheader {
    // RESID: Unique RES type identifier.
    pub type_id: String,
    // RESVER: Version of the data field definition.
    pub version: u64,
    // RESCLAS: RES security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // RESSHF: RES user-defined subheader fields.
    pub user_subheader: Vec<u8>,
}

impl Default for ReservedExtensionSubheader {
    fn default() -> Self {
        ReservedExtensionSubheader {
            type_id: String::new(),
            version: 1,
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            user_subheader: Vec::new(),
        }
    }
}

impl ReservedExtensionSubheader {
    pub(crate) fn decode(
        data: &[u8],
        index: usize,
    ) -> Result<ReservedExtensionSubheader, NitfError> {
        let location = Location::ReservedExtension(index);
        info!("RES subheader {} start, {} bytes", index, data.len());
        let mut reader = FieldReader::new(data, location);
        let part_type = reader.text("RE", 2)?;
        if part_type != "RE" {
            return Err(NitfError::Structural {
                location,
                reason: format!("expected RE, found {:?}", part_type),
            });
        }

        let mut subheader = ReservedExtensionSubheader {
            type_id: reader.text("RESID", 25)?,
            version: reader.unsigned("RESVER", 2)?,
            classification: reader.text("RESCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            ..ReservedExtensionSubheader::default()
        };
        let user_length = reader.unsigned("RESSHL", 4)? as usize;
        subheader.user_subheader = reader.bytes("RESSHF", user_length)?;

        reader.finish("LRESH")?;
        Ok(subheader)
    }

    pub(crate) fn encode(&self, index: usize) -> Result<Vec<u8>, NitfError> {
        let mut writer = FieldWriter::new(Location::ReservedExtension(index));
        writer.text("RE", 2, "RE")?;
        writer.text("RESID", 25, &self.type_id)?;
        writer.unsigned("RESVER", 2, self.version)?;
        writer.text("RESCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        writer.unsigned("RESSHL", 4, self.user_subheader.len() as u64)?;
        writer.bytes("RESSHF", self.user_subheader.len(), &self.user_subheader)?;
        Ok(writer.finish())
    }
}
