use crate::fields::{FieldReader, FieldWriter, TreContext};
use crate::security::SecurityGroup;
use crate::{Location, NitfError};
use log::info;
use tre::Extensions;

#[derive(Debug, Clone, PartialEq)]
pub struct TextSubheader {
    // TEXTID: Text identifier.
    pub id: String,
    // TXTALVL: Text attachment level.
    pub attachment_level: u64,
    // TXTDT: Text date and time.
    pub date_time: String,
    // TXTITL: Text title.
    pub title: String,
    // TSCLAS: Text security classification.
    pub classification: String,
    pub security: SecurityGroup,
    // ENCRYP: Encryption.
    pub encrypted: u64,
    // TXTFMT: Text format, e.g. STA, MTF, UT1, U8S.
    pub format: String,
    // TXSHD: Text extended subheader data.
    pub extended: Extensions,
    // TXSOFL: Text extended subheader overflow.
    pub extended_overflow: u64,
}

impl Default for TextSubheader {
    fn default() -> Self {
        TextSubheader {
            id: String::new(),
            attachment_level: 0,
            date_time: String::new(),
            title: String::new(),
            classification: "U".to_owned(),
            security: SecurityGroup::default(),
            encrypted: 0,
            format: "STA".to_owned(),
            extended: Extensions::new(),
            extended_overflow: 0,
        }
    }
}

impl TextSubheader {
    pub(crate) fn decode(
        data: &[u8],
        index: usize,
        ctx: &mut TreContext,
    ) -> Result<TextSubheader, NitfError> {
        let location = Location::Text(index);
        info!("Text subheader {} start, {} bytes", index, data.len());
        let mut reader = FieldReader::new(data, location);
        let part_type = reader.text("TE", 2)?;
        if part_type != "TE" {
            return Err(NitfError::Structural {
                location,
                reason: format!("expected TE, found {:?}", part_type),
            });
        }

        let mut subheader = TextSubheader {
            id: reader.text("TEXTID", 7)?,
            attachment_level: reader.unsigned("TXTALVL", 3)?,
            date_time: reader.text("TXTDT", 14)?,
            title: reader.text("TXTITL", 80)?,
            classification: reader.text("TSCLAS", 1)?,
            security: SecurityGroup::read(&mut reader)?,
            encrypted: reader.unsigned("ENCRYP", 1)?,
            format: reader.text("TXTFMT", 3)?,
            ..TextSubheader::default()
        };
        let (extended, extended_overflow) = reader.extensions("TXSHDL", "TXSOFL", ctx)?;
        subheader.extended = extended;
        subheader.extended_overflow = extended_overflow;

        reader.finish("LTSH")?;
        info!("Text subheader {} finish", index);
        Ok(subheader)
    }

    pub(crate) fn encode(&self, index: usize) -> Result<Vec<u8>, NitfError> {
        let mut writer = FieldWriter::new(Location::Text(index));
        writer.text("TE", 2, "TE")?;
        writer.text("TEXTID", 7, &self.id)?;
        writer.unsigned("TXTALVL", 3, self.attachment_level)?;
        writer.text("TXTDT", 14, &self.date_time)?;
        writer.text("TXTITL", 80, &self.title)?;
        writer.text("TSCLAS", 1, &self.classification)?;
        self.security.write(&mut writer)?;
        writer.unsigned("ENCRYP", 1, self.encrypted)?;
        writer.text("TXTFMT", 3, &self.format)?;
        writer.extensions("TXSHDL", "TXSOFL", &self.extended, self.extended_overflow)?;
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tre::{Registry, Tre};

    #[test]
    fn test_text_round_trip() {
        let mut subheader = TextSubheader {
            id: "TXT0001".to_owned(),
            title: "Notes".to_owned(),
            ..TextSubheader::default()
        };
        assert_eq!(subheader.encode(0).unwrap().len(), 282);

        subheader
            .extended
            .push(Tre::raw("NOTE", b"abc".to_vec()).unwrap());
        let bytes = subheader.encode(0).unwrap();
        assert_eq!(bytes.len(), 282 + 3 + 14);

        let registry = Registry::new();
        let mut warnings = Vec::new();
        let mut ctx = TreContext {
            registry: &registry,
            strict: false,
            warnings: &mut warnings,
        };
        assert_eq!(TextSubheader::decode(&bytes, 0, &mut ctx).unwrap(), subheader);
    }
}
