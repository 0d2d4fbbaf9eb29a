use crate::{Location, NitfError, Warning};
use bcs::{Field, Kind, Value};
use log::{debug, warn};
use tre::{Extensions, Registry};

/// Width of every overflow index field (UDHOFL, XHDLOFL, UDOFL, ...).
pub(crate) const OVERFLOW_INDEX_LEN: usize = 3;

/// A row/column pair stored as two 5-character signed halves, as in ILOC,
/// SLOC and the graphic bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offset {
    pub row: i64,
    pub col: i64,
}

impl Offset {
    pub fn new(row: i64, col: i64) -> Offset {
        Offset { row, col }
    }

    /// Whether both halves fit five characters.
    pub fn is_representable(&self) -> bool {
        let range = -9_999..=99_999;
        range.contains(&self.row) && range.contains(&self.col)
    }
}

/// Registry and bookkeeping used while decoding extension sections.
pub(crate) struct TreContext<'a> {
    pub registry: &'a Registry,
    pub strict: bool,
    pub warnings: &'a mut Vec<Warning>,
}

/// Cursor over the bytes of one header or subheader.
pub(crate) struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
    location: Location,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8], location: Location) -> FieldReader<'a> {
        FieldReader {
            data,
            offset: 0,
            location,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn take(&mut self, field: &'static str, width: usize) -> Result<&'a [u8], NitfError> {
        if width > self.remaining() {
            return Err(NitfError::Truncated {
                location: self.location,
                field,
            });
        }
        let bytes = &self.data[self.offset..self.offset + width];
        self.offset += width;
        Ok(bytes)
    }

    fn decode(&mut self, field: &'static str, width: usize, kind: Kind) -> Result<Field, NitfError> {
        let location = self.location;
        let bytes = self.take(field, width)?;
        let decoded = bcs::decode(bytes, width, kind).map_err(|source| NitfError::Field {
            location,
            field,
            source,
        })?;
        debug!("{} {} = {:?}", location, field, decoded.value());
        Ok(decoded)
    }

    fn malformed(&self, field: &'static str, bytes: &[u8]) -> NitfError {
        NitfError::Field {
            location: self.location,
            field,
            source: bcs::DecodeError::Malformed {
                text: String::from_utf8_lossy(bytes).into_owned(),
            },
        }
    }

    /// BCS-A text with trailing spaces removed.
    pub fn text(&mut self, field: &'static str, width: usize) -> Result<String, NitfError> {
        let decoded = self.decode(field, width, Kind::Alphanumeric)?;
        Ok(decoded.as_str().unwrap_or_default().to_owned())
    }

    pub fn unsigned(&mut self, field: &'static str, width: usize) -> Result<u64, NitfError> {
        let start = self.offset;
        let decoded = self.decode(field, width, Kind::Numeric)?;
        match decoded.value() {
            Value::Unsigned(value) => Ok(*value),
            _ => Err(self.malformed(field, &self.data[start..self.offset])),
        }
    }

    /// Like `unsigned` but blank means zero, for counts that some producers
    /// leave empty.
    pub fn unsigned_or_blank(&mut self, field: &'static str, width: usize) -> Result<u64, NitfError> {
        let start = self.offset;
        let decoded = self.decode(field, width, Kind::Numeric)?;
        match decoded.value() {
            Value::Unsigned(value) => Ok(*value),
            Value::Undefined => Ok(0),
            _ => Err(self.malformed(field, &self.data[start..self.offset])),
        }
    }

    pub fn signed(&mut self, field: &'static str, width: usize) -> Result<i64, NitfError> {
        let start = self.offset;
        let decoded = self.decode(field, width, Kind::Numeric)?;
        match decoded.as_i64() {
            Some(value) => Ok(value),
            None => Err(self.malformed(field, &self.data[start..self.offset])),
        }
    }

    pub fn offset_pair(&mut self, field: &'static str) -> Result<Offset, NitfError> {
        let row = self.signed(field, 5)?;
        let col = self.signed(field, 5)?;
        Ok(Offset { row, col })
    }

    pub fn bytes(&mut self, field: &'static str, width: usize) -> Result<Vec<u8>, NitfError> {
        Ok(self.take(field, width)?.to_vec())
    }

    /// Reads a length-prefixed extension section: `length` digits, then
    /// when nonzero a 3-digit overflow index and the TREs.
    pub fn extensions(
        &mut self,
        length_field: &'static str,
        overflow_field: &'static str,
        ctx: &mut TreContext,
    ) -> Result<(Extensions, u64), NitfError> {
        let length = self.unsigned(length_field, 5)? as usize;
        if length == 0 {
            return Ok((Extensions::new(), 0));
        }
        if length < OVERFLOW_INDEX_LEN {
            return Err(NitfError::Structural {
                location: self.location,
                reason: format!("{} of {} cannot hold {}", length_field, length, overflow_field),
            });
        }

        let overflow = self.unsigned(overflow_field, OVERFLOW_INDEX_LEN)?;
        let location = self.location;
        let data = self.take(length_field, length - OVERFLOW_INDEX_LEN)?;
        let extensions = decode_tres(data, location, ctx)?;
        Ok((extensions, overflow))
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self, what: &str) -> Result<(), NitfError> {
        if self.remaining() != 0 {
            return Err(NitfError::Structural {
                location: self.location,
                reason: format!(
                    "{} declared {} bytes but its fields use {}",
                    what,
                    self.data.len(),
                    self.offset
                ),
            });
        }
        Ok(())
    }
}

/// Decodes a run of TREs, collecting recovered format errors as warnings.
pub(crate) fn decode_tres(
    data: &[u8],
    location: Location,
    ctx: &mut TreContext,
) -> Result<Extensions, NitfError> {
    let (extensions, errors) = Extensions::decode_section(data, ctx.registry)
        .map_err(|source| NitfError::Tre { location, source })?;
    for error in errors {
        if ctx.strict {
            return Err(NitfError::Tre {
                location,
                source: error,
            });
        }
        warn!("{}: {}", location, error);
        ctx.warnings.push(Warning { location, error });
    }
    Ok(extensions)
}

/// Accumulates the encoding of one header or subheader.
pub(crate) struct FieldWriter {
    out: Vec<u8>,
    location: Location,
}

impl FieldWriter {
    pub fn new(location: Location) -> FieldWriter {
        FieldWriter {
            out: Vec::new(),
            location,
        }
    }

    fn encode(&mut self, field: &'static str, value: &Field) -> Result<(), NitfError> {
        bcs::encode_into(value, value.width(), &mut self.out).map_err(|source| {
            NitfError::Encode {
                location: self.location,
                field,
                source,
            }
        })
    }

    pub fn text(&mut self, field: &'static str, width: usize, value: &str) -> Result<(), NitfError> {
        self.encode(field, &Field::alphanumeric(width, value))
    }

    pub fn unsigned(&mut self, field: &'static str, width: usize, value: u64) -> Result<(), NitfError> {
        self.encode(field, &Field::numeric(width, value))
    }

    /// Negative values carry a leading `-`; others are plain digits.
    pub fn signed(&mut self, field: &'static str, width: usize, value: i64) -> Result<(), NitfError> {
        let value = if value < 0 {
            Value::Signed(value)
        } else {
            Value::Unsigned(value as u64)
        };
        self.encode(field, &Field::new(Kind::Numeric, width, value))
    }

    pub fn offset_pair(&mut self, field: &'static str, value: Offset) -> Result<(), NitfError> {
        self.signed(field, 5, value.row)?;
        self.signed(field, 5, value.col)
    }

    pub fn bytes(&mut self, field: &'static str, width: usize, value: &[u8]) -> Result<(), NitfError> {
        self.encode(field, &Field::new(Kind::Binary, width, Value::Bytes(value.to_vec())))
    }

    /// Writes an extension section. Nothing but a zero length is written
    /// when there are no TREs and no overflow.
    pub fn extensions(
        &mut self,
        length_field: &'static str,
        overflow_field: &'static str,
        extensions: &Extensions,
        overflow: u64,
    ) -> Result<(), NitfError> {
        if extensions.is_empty() && overflow == 0 {
            return self.unsigned(length_field, 5, 0);
        }
        let location = self.location;
        let data = extensions
            .encode()
            .map_err(|source| NitfError::Tre { location, source })?;
        let length = data
            .len()
            .checked_add(OVERFLOW_INDEX_LEN)
            .ok_or(NitfError::SizeOverflow)?;
        self.unsigned(length_field, 5, length as u64)?;
        self.unsigned(overflow_field, OVERFLOW_INDEX_LEN, overflow)?;
        self.out.extend_from_slice(&data);
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sequence() {
        let mut reader = FieldReader::new(b"AB  0042-0010", Location::FileHeader);
        assert_eq!(reader.text("A", 4).unwrap(), "AB");
        assert_eq!(reader.unsigned("N", 4).unwrap(), 42);
        assert_eq!(reader.signed("S", 5).unwrap(), -10);
        assert!(reader.finish("test").is_ok());
        assert!(matches!(
            reader.take("X", 1),
            Err(NitfError::Truncated { field: "X", .. })
        ));
    }

    #[test]
    fn test_unsigned_rejects_sign() {
        let mut reader = FieldReader::new(b"+01", Location::Image(2));
        let error = reader.unsigned("NBANDS", 3).unwrap_err();
        assert!(matches!(
            error,
            NitfError::Field {
                location: Location::Image(2),
                field: "NBANDS",
                ..
            }
        ));
    }

    #[test]
    fn test_writer_offsets() {
        let mut writer = FieldWriter::new(Location::Image(0));
        writer.offset_pair("ILOC", Offset::new(99328, 0)).unwrap();
        writer.offset_pair("ILOC", Offset::new(-12, 7)).unwrap();
        assert_eq!(writer.finish(), b"9932800000-001200007");
    }

    #[test]
    fn test_empty_section_is_zero_length() {
        let mut writer = FieldWriter::new(Location::FileHeader);
        writer.extensions("UDHDL", "UDHOFL", &Extensions::new(), 0).unwrap();
        writer.extensions("XHDL", "XHDLOFL", &Extensions::new(), 2).unwrap();
        assert_eq!(writer.finish(), b"0000000003002");
    }

    #[test]
    fn test_short_section_length_is_structural() {
        let registry = Registry::new();
        let mut warnings = Vec::new();
        let mut ctx = TreContext {
            registry: &registry,
            strict: false,
            warnings: &mut warnings,
        };
        let mut reader = FieldReader::new(b"00002", Location::FileHeader);
        assert!(matches!(
            reader.extensions("UDHDL", "UDHOFL", &mut ctx),
            Err(NitfError::Structural { .. })
        ));
    }
}
