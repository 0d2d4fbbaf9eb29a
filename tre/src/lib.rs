use bcs::{Field, Kind, Value};
use log::{debug, info, warn};
use std::error;
use std::fmt;

mod builtin;
pub mod descriptor;
mod registry;

pub use descriptor::{Comparison, Condition, Descriptor, Expr, Item, Length, Operand};
pub use builtin::engrda;
pub use registry::{PluginLookup, Registry};

/// Width of the CETAG field.
pub const TAG_LEN: usize = 6;
/// Width of the CEL field.
pub const LENGTH_LEN: usize = 5;
/// Bytes preceding every TRE payload.
pub const HEADER_LEN: usize = TAG_LEN + LENGTH_LEN;
/// Largest payload the 5-digit CEL field can declare.
pub const MAX_LENGTH: usize = 99_999;

#[derive(Debug, Clone, PartialEq)]
pub enum TreError {
    /// The payload does not match the descriptor for its tag.
    Format { tag: String, reason: String },
    LengthMismatch {
        tag: String,
        declared: usize,
        actual: usize,
    },
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    Field {
        tag: String,
        name: String,
        source: bcs::DecodeError,
    },
    Encode {
        tag: String,
        name: String,
        source: bcs::EncodeError,
    },
    TooLong { tag: String, length: usize },
    InvalidTag { tag: String },
    UnknownField { tag: String, name: String },
    SizeOverflow,
}

impl error::Error for TreError {}
impl fmt::Display for TreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Format { tag, reason } => write!(f, "TRE {} format error: {}", tag, reason),
            Self::LengthMismatch {
                tag,
                declared,
                actual,
            } => write!(
                f,
                "TRE {} declares {} bytes but its fields encode to {}",
                tag, declared, actual
            ),
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "extension section truncated at offset {}: need {} bytes, {} available",
                offset, needed, available
            ),
            Self::Field { tag, name, source } => {
                write!(f, "TRE {} field {}: {}", tag, name, source)
            }
            Self::Encode { tag, name, source } => {
                write!(f, "TRE {} field {}: {}", tag, name, source)
            }
            Self::TooLong { tag, length } => write!(
                f,
                "TRE {} payload of {} bytes exceeds {}",
                tag, length, MAX_LENGTH
            ),
            Self::InvalidTag { tag } => write!(f, "invalid TRE tag {:?}", tag),
            Self::UnknownField { tag, name } => write!(f, "TRE {} has no field {}", tag, name),
            Self::SizeOverflow => write!(f, "size computation overflowed"),
        }
    }
}

/// A decoded field inside a descriptor-driven TRE. Loop members carry their
/// indexes in the name, e.g. `ENGLBL[2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreField {
    name: String,
    field: Field,
}

impl TreField {
    pub fn new(name: &str, field: Field) -> TreField {
        TreField {
            name: name.to_owned(),
            field,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &Field {
        &self.field
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreBody {
    /// Payload kept verbatim, either because no descriptor is known or
    /// because the payload did not match it.
    Raw(Vec<u8>),
    Fields(Vec<TreField>),
}

/// Tagged Record Extension.
#[derive(Debug, Clone, PartialEq)]
pub struct Tre {
    // CETAG: Unique extension type identifier.
    tag: String,
    // CEL: Length of the payload in bytes.
    length: usize,
    body: TreBody,
}

impl Tre {
    pub fn raw(tag: &str, data: Vec<u8>) -> Result<Tre, TreError> {
        check_tag(tag)?;
        check_length(tag, data.len())?;
        Ok(Tre {
            tag: tag.trim_end().to_owned(),
            length: data.len(),
            body: TreBody::Raw(data),
        })
    }

    // Fallback storage for payloads that failed their descriptor.
    pub(crate) fn raw_unchecked(tag: &str, data: Vec<u8>) -> Tre {
        Tre {
            tag: tag.trim_end().to_owned(),
            length: data.len(),
            body: TreBody::Raw(data),
        }
    }

    /// Builds a field TRE whose declared length is the sum of the field
    /// widths.
    pub fn from_fields(tag: &str, fields: Vec<TreField>) -> Result<Tre, TreError> {
        check_tag(tag)?;
        let length = fields
            .iter()
            .try_fold(0usize, |acc, f| acc.checked_add(f.field.width()))
            .ok_or(TreError::SizeOverflow)?;
        check_length(tag, length)?;
        Ok(Tre {
            tag: tag.trim_end().to_owned(),
            length,
            body: TreBody::Fields(fields),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn body(&self) -> &TreBody {
        &self.body
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.body, TreBody::Raw(_))
    }

    pub fn fields(&self) -> Option<&[TreField]> {
        match &self.body {
            TreBody::Fields(fields) => Some(fields),
            TreBody::Raw(_) => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()?
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.field)
    }

    /// Replaces the value of a named field. The field width is unchanged so
    /// the declared length stays valid.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), TreError> {
        let tag = self.tag.clone();
        let fields = match &mut self.body {
            TreBody::Fields(fields) => fields,
            TreBody::Raw(_) => {
                return Err(TreError::UnknownField {
                    tag,
                    name: name.to_owned(),
                })
            }
        };
        let entry = fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| TreError::UnknownField {
                tag: tag.clone(),
                name: name.to_owned(),
            })?;

        let mut candidate = entry.field.clone();
        candidate.set_value(value);
        candidate
            .to_bytes()
            .map_err(|source| TreError::Encode {
                tag,
                name: name.to_owned(),
                source,
            })?;
        entry.field = candidate;
        Ok(())
    }

    /// Size of the TRE inside an extension section, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.length
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, TreError> {
        match &self.body {
            TreBody::Raw(data) => Ok(data.clone()),
            TreBody::Fields(fields) => {
                let mut out = Vec::with_capacity(self.length);
                for entry in fields {
                    bcs::encode_into(&entry.field, entry.field.width(), &mut out).map_err(
                        |source| TreError::Encode {
                            tag: self.tag.clone(),
                            name: entry.name.clone(),
                            source,
                        },
                    )?;
                }
                if out.len() != self.length {
                    return Err(TreError::LengthMismatch {
                        tag: self.tag.clone(),
                        declared: self.length,
                        actual: out.len(),
                    });
                }
                Ok(out)
            }
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), TreError> {
        check_tag(&self.tag)?;
        check_length(&self.tag, self.length)?;
        let payload = self.encode_payload()?;
        out.extend_from_slice(self.tag.as_bytes());
        out.resize(out.len() + TAG_LEN - self.tag.len(), b' ');
        out.extend_from_slice(format!("{:05}", self.length).as_bytes());
        out.extend_from_slice(&payload);
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, TreError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

fn check_tag(tag: &str) -> Result<(), TreError> {
    let trimmed = tag.trim_end();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= TAG_LEN
        && trimmed.bytes().all(|b| (0x20..=0x7E).contains(&b));
    if valid {
        Ok(())
    } else {
        Err(TreError::InvalidTag {
            tag: tag.to_owned(),
        })
    }
}

fn check_length(tag: &str, length: usize) -> Result<(), TreError> {
    if length > MAX_LENGTH {
        return Err(TreError::TooLong {
            tag: tag.to_owned(),
            length,
        });
    }
    Ok(())
}

/// Ordered collection of TREs belonging to one extension section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    tres: Vec<Tre>,
}

impl Extensions {
    pub fn new() -> Extensions {
        Extensions::default()
    }

    pub fn len(&self) -> usize {
        self.tres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tres.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tre> {
        self.tres.iter()
    }

    pub fn as_slice(&self) -> &[Tre] {
        &self.tres
    }

    pub fn get(&self, index: usize) -> Option<&Tre> {
        self.tres.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tre> {
        self.tres.get_mut(index)
    }

    pub fn push(&mut self, tre: Tre) {
        self.tres.push(tre);
    }

    pub fn insert(&mut self, index: usize, tre: Tre) {
        self.tres.insert(index, tre);
    }

    pub fn remove(&mut self, index: usize) -> Option<Tre> {
        if index < self.tres.len() {
            Some(self.tres.remove(index))
        } else {
            None
        }
    }

    /// Removes and returns every TRE from `index` on.
    pub fn split_off(&mut self, index: usize) -> Vec<Tre> {
        if index >= self.tres.len() {
            return Vec::new();
        }
        self.tres.split_off(index)
    }

    pub fn find<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Tre> + 'a {
        self.tres.iter().filter(move |t| t.tag == tag)
    }

    pub fn clear(&mut self) {
        self.tres.clear();
    }

    pub fn into_vec(self) -> Vec<Tre> {
        self.tres
    }

    /// Total bytes of the encoded TREs, headers included.
    pub fn encoded_len(&self) -> Result<usize, TreError> {
        self.tres
            .iter()
            .try_fold(0usize, |acc, t| acc.checked_add(t.encoded_len()))
            .ok_or(TreError::SizeOverflow)
    }

    pub fn encode(&self) -> Result<Vec<u8>, TreError> {
        let mut out = Vec::with_capacity(self.encoded_len()?);
        for tre in &self.tres {
            tre.encode_into(&mut out)?;
        }
        Ok(out)
    }

    /// Decodes a run of TREs. Descriptor mismatches are recovered as raw
    /// TREs and reported in the returned warnings; structural problems with
    /// the tag/length headers are fatal.
    pub fn decode_section(
        bytes: &[u8],
        registry: &Registry,
    ) -> Result<(Extensions, Vec<TreError>), TreError> {
        info!("Extension section start, {} bytes", bytes.len());
        let mut extensions = Extensions::new();
        let mut warnings = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let available = bytes.len() - offset;
            if available < HEADER_LEN {
                return Err(TreError::Truncated {
                    offset,
                    needed: HEADER_LEN,
                    available,
                });
            }

            let tag_bytes = &bytes[offset..offset + TAG_LEN];
            let tag: String = tag_bytes.iter().map(|&b| b as char).collect();
            check_tag(&tag)?;
            let tag = tag.trim_end().to_owned();

            let length_bytes = &bytes[offset + TAG_LEN..offset + HEADER_LEN];
            let length = bcs::decode(length_bytes, LENGTH_LEN, Kind::Numeric)
                .map_err(|source| TreError::Field {
                    tag: tag.clone(),
                    name: "CEL".to_owned(),
                    source,
                })?
                .as_u64()
                .ok_or_else(|| TreError::Format {
                    tag: tag.clone(),
                    reason: "CEL is not an unsigned number".to_owned(),
                })?;
            let length = usize::try_from(length).map_err(|_| TreError::SizeOverflow)?;

            let start = offset + HEADER_LEN;
            let end = start.checked_add(length).ok_or(TreError::SizeOverflow)?;
            if end > bytes.len() {
                return Err(TreError::Truncated {
                    offset: start,
                    needed: length,
                    available: bytes.len() - start,
                });
            }

            debug!("TRE {} at offset {} with {} bytes", tag, offset, length);
            let (tre, warning) = registry.decode(&tag, &bytes[start..end]);
            if let Some(warning) = warning {
                warn!("{}", warning);
                warnings.push(warning);
            }
            extensions.push(tre);
            offset = end;
        }

        info!(
            "Extension section finish, {} TREs, {} warnings",
            extensions.len(),
            warnings.len()
        );
        Ok((extensions, warnings))
    }
}

impl FromIterator<Tre> for Extensions {
    fn from_iter<I: IntoIterator<Item = Tre>>(iter: I) -> Self {
        Extensions {
            tres: iter.into_iter().collect(),
        }
    }
}

impl Extend<Tre> for Extensions {
    fn extend<I: IntoIterator<Item = Tre>>(&mut self, iter: I) {
        self.tres.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Extensions {
    type Item = &'a Tre;
    type IntoIter = std::slice::Iter<'a, Tre>;

    fn into_iter(self) -> Self::IntoIter {
        self.tres.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_tre_encode() {
        let tre = Tre::raw("TEST", b"abc".to_vec()).unwrap();
        assert_eq!(tre.encode().unwrap(), b"TEST  00003abc");
        assert_eq!(tre.encoded_len(), 14);
    }

    #[test]
    fn test_tag_validation() {
        assert!(Tre::raw("", vec![]).is_err());
        assert!(Tre::raw("TOOLONGTAG", vec![]).is_err());
        assert!(Tre::raw("BAD\x01", vec![]).is_err());
    }

    #[test]
    fn test_payload_too_long() {
        let result = Tre::raw("BIG", vec![0; MAX_LENGTH + 1]);
        assert!(matches!(result, Err(TreError::TooLong { .. })));
    }

    #[test]
    fn test_truncated_header() {
        let registry = Registry::new();
        let result = Extensions::decode_section(b"ABC", &registry);
        assert_eq!(
            result,
            Err(TreError::Truncated {
                offset: 0,
                needed: HEADER_LEN,
                available: 3
            })
        );
    }

    #[test]
    fn test_declared_length_past_end() {
        let registry = Registry::new();
        let result = Extensions::decode_section(b"ABCDEF99999xyz", &registry);
        assert_eq!(
            result,
            Err(TreError::Truncated {
                offset: 11,
                needed: 99999,
                available: 3
            })
        );
    }

    #[test]
    fn test_non_numeric_length() {
        let registry = Registry::new();
        let result = Extensions::decode_section(b"ABCDEF00x12", &registry);
        assert!(matches!(result, Err(TreError::Field { .. })));
    }

    #[test]
    fn test_from_fields_sums_widths() {
        let tre = Tre::from_fields(
            "PAIR",
            vec![
                TreField::new("A", Field::alphanumeric(3, "X")),
                TreField::new("B", Field::numeric(2, 7)),
            ],
        )
        .unwrap();
        assert_eq!(tre.length(), 5);
        assert_eq!(tre.encode().unwrap(), b"PAIR  00005X  07");
    }

    #[test]
    fn test_set_field_keeps_width() {
        let mut tre = Tre::from_fields("ONE", vec![TreField::new("N", Field::numeric(2, 1))]).unwrap();
        tre.set_field("N", Value::Unsigned(42)).unwrap();
        assert_eq!(tre.field("N").and_then(|f| f.as_u64()), Some(42));
        assert!(tre.set_field("N", Value::Unsigned(420)).is_err());
        assert!(tre.set_field("M", Value::Unsigned(1)).is_err());
        assert_eq!(tre.field("N").and_then(|f| f.as_u64()), Some(42));
    }

    #[test]
    fn test_extensions_order_and_split() {
        let mut extensions: Extensions = (0..4)
            .map(|i| Tre::raw(&format!("T{}", i), vec![b'x'; i]).unwrap())
            .collect();
        assert_eq!(extensions.encoded_len().unwrap(), 4 * HEADER_LEN + 6);
        let tail = extensions.split_off(2);
        assert_eq!(extensions.len(), 2);
        assert_eq!(tail[0].tag(), "T2");
        assert_eq!(tail[1].tag(), "T3");
        assert!(extensions.split_off(5).is_empty());
    }
}
