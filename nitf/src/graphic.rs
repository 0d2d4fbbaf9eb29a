use crate::fields::{FieldReader, FieldWriter, Offset, TreContext};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::info;
use tre::Extensions;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicSubheader {
    // SID: Graphic identifier.
    pub id: String,
    // SNAME: Graphic name.
    pub name: String,
    // SSCLAS: Graphic security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // ENCRYP: Encryption.
    pub encrypted: u64,
    // SFMT: Graphic type, C for CGM.
    pub format: String,
    // SDLVL: Graphic display level.
    pub display_level: u64,
    // SALVL: Graphic attachment level.
    pub attachment_level: u64,
    // SLOC: Graphic location.
    pub location: Offset,
    // SBND1: First graphic bound location.
    pub first_bound: Offset,
    // SCOLOR: Graphic color.
    pub color: String,
    // SBND2: Second graphic bound location.
    pub second_bound: Offset,
    // SXSHD: Graphic extended subheader data.
    pub extended: Extensions,
    // SXSOFL: Graphic extended subheader overflow.
    pub extended_overflow: u64,
}

impl Default for GraphicSubheader {
    fn default() -> Self {
        GraphicSubheader {
            id: String::new(),
            name: String::new(),
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            encrypted: 0,
            format: "C".to_owned(),
            display_level: 1,
            attachment_level: 0,
            location: Offset::default(),
            first_bound: Offset::default(),
            color: "C".to_owned(),
            second_bound: Offset::default(),
            extended: Extensions::new(),
            extended_overflow: 0,
        }
    }
}

impl GraphicSubheader {
    pub(crate) fn decode(
        data: &[u8],
        index: usize,
        ctx: &mut TreContext,
    ) -> Result<GraphicSubheader, NitfError> {
        let location = Location::Graphic(index);
        info!("Graphic subheader {} start, {} bytes", index, data.len());
        let mut reader = FieldReader::new(data, location);
        let part_type = reader.text("SY", 2)?;
        if part_type != "SY" {
            return Err(NitfError::Structural {
                location,
                reason: format!("expected SY, found {:?}", part_type),
            });
        }

        let mut subheader = GraphicSubheader {
            id: reader.text("SID", 10)?,
            name: reader.text("SNAME", 20)?,
            classification: reader.text("SSCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            encrypted: reader.unsigned("ENCRYP", 1)?,
            format: reader.text("SFMT", 1)?,
            ..GraphicSubheader::default()
        };
        reader.take("SSTRUCT", 13)?;
        subheader.display_level = reader.unsigned("SDLVL", 3)?;
        subheader.attachment_level = reader.unsigned("SALVL", 3)?;
        subheader.location = reader.offset_pair("SLOC")?;
        subheader.first_bound = reader.offset_pair("SBND1")?;
        subheader.color = reader.text("SCOLOR", 1)?;
        subheader.second_bound = reader.offset_pair("SBND2")?;
        reader.take("SRES2", 2)?;

        let (extended, extended_overflow) = reader.extensions("SXSHDL", "SXSOFL", ctx)?;
        subheader.extended = extended;
        subheader.extended_overflow = extended_overflow;

        reader.finish("LSSH")?;
        info!("Graphic subheader {} finish", index);
        Ok(subheader)
    }

    pub(crate) fn encode(&self, index: usize) -> Result<Vec<u8>, NitfError> {
        let mut writer = FieldWriter::new(Location::Graphic(index));
        writer.text("SY", 2, "SY")?;
        writer.text("SID", 10, &self.id)?;
        writer.text("SNAME", 20, &self.name)?;
        writer.text("SSCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        writer.unsigned("ENCRYP", 1, self.encrypted)?;
        writer.text("SFMT", 1, &self.format)?;
        writer.unsigned("SSTRUCT", 13, 0)?;
        writer.unsigned("SDLVL", 3, self.display_level)?;
        writer.unsigned("SALVL", 3, self.attachment_level)?;
        writer.offset_pair("SLOC", self.location)?;
        writer.offset_pair("SBND1", self.first_bound)?;
        writer.text("SCOLOR", 1, &self.color)?;
        writer.offset_pair("SBND2", self.second_bound)?;
        writer.unsigned("SRES2", 2, 0)?;
        writer.extensions("SXSHDL", "SXSOFL", &self.extended, self.extended_overflow)?;
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tre::Registry;

    #[test]
    fn test_graphic_round_trip() {
        let subheader = GraphicSubheader {
            id: "G1".to_owned(),
            location: Offset::new(10, -20),
            second_bound: Offset::new(100, 200),
            ..GraphicSubheader::default()
        };
        let bytes = subheader.encode(0).unwrap();
        assert_eq!(bytes.len(), 258);

        let registry = Registry::new();
        let mut warnings = Vec::new();
        let mut ctx = TreContext {
            registry: &registry,
            strict: false,
            warnings: &mut warnings,
        };
        assert_eq!(
            GraphicSubheader::decode(&bytes, 0, &mut ctx).unwrap(),
            subheader
        );
    }
}
