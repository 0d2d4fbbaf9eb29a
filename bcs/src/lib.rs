//! Fixed-width NITF field codec.
//!
//! Every NITF header field is a fixed number of bytes drawn from one of the
//! Basic Character Sets: BCS-A (printable ASCII, space padded, left
//! justified) or BCS-N (digits, zero padded, right justified). A handful of
//! fields, mostly inside TREs, are raw binary.

use log::trace;
use std::borrow::Cow;
use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    WidthMismatch { expected: usize, actual: usize },
    InvalidCharacter { kind: Kind, byte: u8, position: usize },
    Malformed { text: String },
}

impl error::Error for DecodeError {}
impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WidthMismatch { expected, actual } => {
                write!(f, "expected {} bytes, found {}", expected, actual)
            }
            Self::InvalidCharacter {
                kind,
                byte,
                position,
            } => {
                write!(
                    f,
                    "invalid {} character 0x{:02X} at position {}",
                    kind, byte, position
                )
            }
            Self::Malformed { text } => {
                write!(f, "malformed numeric value {:?}", text)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    FieldTooWide { width: usize, required: usize },
    InvalidCharacter { kind: Kind, byte: u8, position: usize },
    KindMismatch { kind: Kind, value: &'static str },
    NotFinite,
}

impl error::Error for EncodeError {}
impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FieldTooWide { width, required } => {
                write!(
                    f,
                    "value needs {} bytes but the field is {} wide",
                    required, width
                )
            }
            Self::InvalidCharacter {
                kind,
                byte,
                position,
            } => {
                write!(
                    f,
                    "invalid {} character 0x{:02X} at position {}",
                    kind, byte, position
                )
            }
            Self::KindMismatch { kind, value } => {
                write!(f, "{} value cannot be stored in a {} field", value, kind)
            }
            Self::NotFinite => write!(f, "real value is not finite"),
        }
    }
}

/// Character set of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// BCS-A: bytes 0x20 through 0x7E.
    Alphanumeric,
    /// BCS-N: digits with an optional leading sign and decimal point.
    Numeric,
    /// Uninterpreted bytes.
    Binary,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Alphanumeric => write!(f, "BCS-A"),
            Self::Numeric => write!(f, "BCS-N"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl Kind {
    pub fn default_justify(self) -> Justify {
        match self {
            Kind::Numeric => Justify::Right,
            Kind::Alphanumeric | Kind::Binary => Justify::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// Semantic content of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// All-blank field; the format's convention for "not supplied".
    Undefined,
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Real(f64),
    Bytes(Vec<u8>),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Text(_) => "text",
            Value::Unsigned(_) => "unsigned",
            Value::Signed(_) => "signed",
            Value::Real(_) => "real",
            Value::Bytes(_) => "binary",
        }
    }
}

/// A value together with its on-disk shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    kind: Kind,
    width: usize,
    justify: Justify,
    value: Value,
    // Decoded numeric text that the value alone would not reproduce, such
    // as blank padding or trailing zeros after the point.
    original: Option<Vec<u8>>,
}

impl Field {
    pub fn new(kind: Kind, width: usize, value: Value) -> Field {
        Field {
            kind,
            width,
            justify: kind.default_justify(),
            value,
            original: None,
        }
    }

    pub fn alphanumeric(width: usize, text: &str) -> Field {
        Field::new(Kind::Alphanumeric, width, Value::Text(text.to_owned()))
    }

    pub fn numeric(width: usize, value: u64) -> Field {
        Field::new(Kind::Numeric, width, Value::Unsigned(value))
    }

    pub fn binary(bytes: Vec<u8>) -> Field {
        Field::new(Kind::Binary, bytes.len(), Value::Bytes(bytes))
    }

    pub fn undefined(kind: Kind, width: usize) -> Field {
        Field::new(kind, width, Value::Undefined)
    }

    pub fn justified(mut self, justify: Justify) -> Field {
        self.justify = justify;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn justify(&self) -> Justify {
        self.justify
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replaces the value. Validation happens when the field is encoded.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.original = None;
    }

    /// Whether encoding reproduces decoded bytes that differ from the
    /// canonical form of the value.
    pub fn keeps_original(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_undefined(&self) -> bool {
        self.value == Value::Undefined
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            Value::Unsigned(value) => Some(value),
            Value::Signed(value) if value >= 0 => Some(value as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Value::Unsigned(value) if value <= i64::MAX as u64 => Some(value as i64),
            Value::Signed(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Value::Real(value) => Some(value),
            Value::Unsigned(value) => Some(value as f64),
            Value::Signed(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Encodes the field at its own width.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        encode(self, self.width)
    }
}

/// Decodes `bytes` as a field of the given width and kind, using the
/// default justification of the kind.
pub fn decode(bytes: &[u8], width: usize, kind: Kind) -> Result<Field, DecodeError> {
    decode_justified(bytes, width, kind, kind.default_justify())
}

pub fn decode_justified(
    bytes: &[u8],
    width: usize,
    kind: Kind,
    justify: Justify,
) -> Result<Field, DecodeError> {
    if bytes.len() != width {
        return Err(DecodeError::WidthMismatch {
            expected: width,
            actual: bytes.len(),
        });
    }

    let value = match kind {
        Kind::Alphanumeric => decode_alphanumeric(bytes, justify)?,
        Kind::Numeric => decode_numeric(bytes)?,
        Kind::Binary => Value::Bytes(bytes.to_vec()),
    };
    trace!("decoded {} field of width {}: {:?}", kind, width, value);

    let mut field = Field {
        kind,
        width,
        justify,
        value,
        original: None,
    };
    if kind == Kind::Numeric && field.to_bytes().ok().as_deref() != Some(bytes) {
        trace!("keeping non-canonical numeric text {:?}", String::from_utf8_lossy(bytes));
        field.original = Some(bytes.to_vec());
    }
    Ok(field)
}

fn decode_alphanumeric(bytes: &[u8], justify: Justify) -> Result<Value, DecodeError> {
    if let Some((position, byte)) = find_unprintable(bytes) {
        return Err(DecodeError::InvalidCharacter {
            kind: Kind::Alphanumeric,
            byte,
            position,
        });
    }

    // Printable ASCII maps one byte to one char.
    let text: String = bytes.iter().map(|&b| b as char).collect();
    let trimmed = match justify {
        Justify::Left => text.trim_end_matches(' '),
        Justify::Right => text.trim_start_matches(' '),
    };
    Ok(Value::Text(trimmed.to_owned()))
}

fn decode_numeric(bytes: &[u8]) -> Result<Value, DecodeError> {
    let start = match bytes.iter().position(|&b| b != b' ') {
        Some(start) => start,
        None => return Ok(Value::Undefined),
    };
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(bytes.len(), |p| p + 1);
    let body = &bytes[start..end];

    let (signed, digits_start) = match body[0] {
        b'+' | b'-' => (true, 1),
        _ => (false, 0),
    };
    if body.len() == digits_start {
        return Err(DecodeError::InvalidCharacter {
            kind: Kind::Numeric,
            byte: body[0],
            position: start,
        });
    }

    let mut has_point = false;
    for (i, &b) in body[digits_start..].iter().enumerate() {
        match b {
            b'0'..=b'9' => {}
            b'.' if !has_point => has_point = true,
            _ => {
                return Err(DecodeError::InvalidCharacter {
                    kind: Kind::Numeric,
                    byte: b,
                    position: start + digits_start + i,
                })
            }
        }
    }

    let text: String = body.iter().map(|&b| b as char).collect();
    let malformed = || DecodeError::Malformed { text: text.clone() };
    if has_point {
        text.parse::<f64>().map(Value::Real).map_err(|_| malformed())
    } else if signed {
        text.parse::<i64>().map(Value::Signed).map_err(|_| malformed())
    } else {
        text.parse::<u64>().map(Value::Unsigned).map_err(|_| malformed())
    }
}

/// Encodes `field` into exactly `width` bytes.
pub fn encode(field: &Field, width: usize) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(width);
    encode_into(field, width, &mut out)?;
    Ok(out)
}

/// Appends the encoding of `field` to `out`. On error nothing is appended.
pub fn encode_into(field: &Field, width: usize, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    if let Some(original) = &field.original {
        if original.len() == width {
            out.extend_from_slice(original);
            return Ok(());
        }
    }
    match field.kind {
        Kind::Binary => {
            let bytes: &[u8] = match &field.value {
                Value::Bytes(bytes) => bytes,
                Value::Undefined => &[],
                other => {
                    return Err(EncodeError::KindMismatch {
                        kind: Kind::Binary,
                        value: other.describe(),
                    })
                }
            };
            if bytes.len() > width {
                return Err(EncodeError::FieldTooWide {
                    width,
                    required: bytes.len(),
                });
            }
            out.extend_from_slice(bytes);
            out.resize(out.len() + width - bytes.len(), 0);
        }
        Kind::Alphanumeric => {
            let text = alphanumeric_text(&field.value)?;
            if let Some((position, byte)) = find_unprintable(text.as_bytes()) {
                return Err(EncodeError::InvalidCharacter {
                    kind: Kind::Alphanumeric,
                    byte,
                    position,
                });
            }
            pad(out, text.as_bytes(), width, field.justify, b' ')?;
        }
        Kind::Numeric => {
            if field.value == Value::Undefined {
                out.resize(out.len() + width, b' ');
                return Ok(());
            }
            let text = numeric_text(&field.value)?;
            let bytes = text.as_bytes();
            match field.justify {
                Justify::Left => pad(out, bytes, width, Justify::Left, b' ')?,
                Justify::Right => {
                    if bytes.len() > width {
                        return Err(EncodeError::FieldTooWide {
                            width,
                            required: bytes.len(),
                        });
                    }
                    // The sign stays in front of the zero fill.
                    let (sign, digits) = match bytes.first() {
                        Some(b'+') | Some(b'-') => (&bytes[..1], &bytes[1..]),
                        _ => (&bytes[..0], bytes),
                    };
                    out.extend_from_slice(sign);
                    out.resize(out.len() + width - bytes.len(), b'0');
                    out.extend_from_slice(digits);
                }
            }
        }
    }
    Ok(())
}

fn pad(
    out: &mut Vec<u8>,
    bytes: &[u8],
    width: usize,
    justify: Justify,
    fill: u8,
) -> Result<(), EncodeError> {
    if bytes.len() > width {
        return Err(EncodeError::FieldTooWide {
            width,
            required: bytes.len(),
        });
    }
    let padding = width - bytes.len();
    match justify {
        Justify::Left => {
            out.extend_from_slice(bytes);
            out.resize(out.len() + padding, fill);
        }
        Justify::Right => {
            out.resize(out.len() + padding, fill);
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}

fn alphanumeric_text(value: &Value) -> Result<Cow<'_, str>, EncodeError> {
    match value {
        Value::Undefined => Ok(Cow::Borrowed("")),
        Value::Text(text) => Ok(Cow::Borrowed(text)),
        Value::Unsigned(v) => Ok(Cow::Owned(v.to_string())),
        Value::Signed(v) => Ok(Cow::Owned(v.to_string())),
        Value::Real(v) => Ok(Cow::Owned(format_real(*v)?)),
        Value::Bytes(_) => Err(EncodeError::KindMismatch {
            kind: Kind::Alphanumeric,
            value: "binary",
        }),
    }
}

fn numeric_text(value: &Value) -> Result<String, EncodeError> {
    match value {
        Value::Text(text) => {
            // Text must already look like a number; reuse the decode rules.
            decode_numeric(text.as_bytes()).map_err(|e| match e {
                DecodeError::InvalidCharacter { byte, position, .. } => {
                    EncodeError::InvalidCharacter {
                        kind: Kind::Numeric,
                        byte,
                        position,
                    }
                }
                _ => EncodeError::KindMismatch {
                    kind: Kind::Numeric,
                    value: "text",
                },
            })?;
            Ok(text.trim().to_owned())
        }
        Value::Unsigned(v) => Ok(v.to_string()),
        Value::Signed(v) if *v < 0 => Ok(v.to_string()),
        Value::Signed(v) => Ok(format!("+{}", v)),
        Value::Real(v) => format_real(*v),
        Value::Undefined => Ok(String::new()),
        Value::Bytes(_) => Err(EncodeError::KindMismatch {
            kind: Kind::Numeric,
            value: "binary",
        }),
    }
}

// Always carries a decimal point so the value decodes back as a real.
fn format_real(value: f64) -> Result<String, EncodeError> {
    if !value.is_finite() {
        return Err(EncodeError::NotFinite);
    }
    let mut text = format!("{}", value);
    if !text.contains('.') {
        text.push_str(".0");
    }
    Ok(text)
}

fn find_unprintable(bytes: &[u8]) -> Option<(usize, u8)> {
    bytes
        .iter()
        .enumerate()
        .find(|(_, &b)| !(0x20..=0x7E).contains(&b))
        .map(|(i, &b)| (i, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumeric_strips_trailing_pad() {
        let field = decode(b"NITF      ", 10, Kind::Alphanumeric).unwrap();
        assert_eq!(field.as_str(), Some("NITF"));
        assert_eq!(field.width(), 10);
    }

    #[test]
    fn test_alphanumeric_keeps_leading_spaces() {
        let field = decode(b"  A B ", 6, Kind::Alphanumeric).unwrap();
        assert_eq!(field.as_str(), Some("  A B"));
    }

    #[test]
    fn test_alphanumeric_right_justified() {
        let field = decode_justified(b"   1.0", 6, Kind::Alphanumeric, Justify::Right).unwrap();
        assert_eq!(field.as_str(), Some("1.0"));
        assert_eq!(field.to_bytes().unwrap(), b"   1.0");
    }

    #[test]
    fn test_alphanumeric_rejects_control_bytes() {
        let result = decode(b"AB\x07D", 4, Kind::Alphanumeric);
        assert_eq!(
            result,
            Err(DecodeError::InvalidCharacter {
                kind: Kind::Alphanumeric,
                byte: 7,
                position: 2
            })
        );
    }

    #[test]
    fn test_numeric_strips_zero_padding() {
        let field = decode(b"000042", 6, Kind::Numeric).unwrap();
        assert_eq!(field.value(), &Value::Unsigned(42));
    }

    #[test]
    fn test_numeric_blank_is_undefined() {
        let field = decode(b"     ", 5, Kind::Numeric).unwrap();
        assert!(field.is_undefined());
        assert_eq!(field.to_bytes().unwrap(), b"     ");
    }

    #[test]
    fn test_numeric_signed_and_real() {
        assert_eq!(
            decode(b"-0012", 5, Kind::Numeric).unwrap().value(),
            &Value::Signed(-12)
        );
        assert_eq!(
            decode(b"+0012", 5, Kind::Numeric).unwrap().value(),
            &Value::Signed(12)
        );
        assert_eq!(
            decode(b"0001.25", 7, Kind::Numeric).unwrap().value(),
            &Value::Real(1.25)
        );
    }

    #[test]
    fn test_numeric_keeps_non_canonical_text() {
        let field = decode(b"  12", 4, Kind::Numeric).unwrap();
        assert_eq!(field.value(), &Value::Unsigned(12));
        assert!(field.keeps_original());
        assert_eq!(field.to_bytes().unwrap(), b"  12");

        let field = decode(b"1.50", 4, Kind::Numeric).unwrap();
        assert_eq!(field.value(), &Value::Real(1.5));
        assert_eq!(field.to_bytes().unwrap(), b"1.50");

        let mut field = decode(b"  12", 4, Kind::Numeric).unwrap();
        field.set_value(Value::Unsigned(12));
        assert!(!field.keeps_original());
        assert_eq!(field.to_bytes().unwrap(), b"0012");
    }

    #[test]
    fn test_numeric_canonical_text_decodes_plain() {
        let field = decode(b"0012", 4, Kind::Numeric).unwrap();
        assert!(!field.keeps_original());
        assert_eq!(field, Field::numeric(4, 12));
    }

    #[test]
    fn test_numeric_rejects_letters() {
        let result = decode(b"00A1", 4, Kind::Numeric);
        assert_eq!(
            result,
            Err(DecodeError::InvalidCharacter {
                kind: Kind::Numeric,
                byte: b'A',
                position: 2
            })
        );
    }

    #[test]
    fn test_numeric_rejects_lonely_sign() {
        assert!(decode(b"  - ", 4, Kind::Numeric).is_err());
    }

    #[test]
    fn test_numeric_overflow_is_malformed() {
        let result = decode(b"99999999999999999999999", 23, Kind::Numeric);
        assert!(matches!(result, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn test_width_mismatch() {
        assert_eq!(
            decode(b"123", 4, Kind::Numeric),
            Err(DecodeError::WidthMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_encode_zero_fill_keeps_sign_first() {
        let field = Field::new(Kind::Numeric, 5, Value::Signed(-12));
        assert_eq!(field.to_bytes().unwrap(), b"-0012");
        let field = Field::new(Kind::Numeric, 5, Value::Signed(7));
        assert_eq!(field.to_bytes().unwrap(), b"+0007");
    }

    #[test]
    fn test_encode_too_wide() {
        let field = Field::numeric(3, 1000);
        assert_eq!(
            field.to_bytes(),
            Err(EncodeError::FieldTooWide {
                width: 3,
                required: 4
            })
        );
        let field = Field::alphanumeric(2, "abc");
        assert!(matches!(
            field.to_bytes(),
            Err(EncodeError::FieldTooWide { .. })
        ));
    }

    #[test]
    fn test_encode_numeric_text_is_validated() {
        let field = Field::new(Kind::Numeric, 4, Value::Text("12".to_owned()));
        assert_eq!(field.to_bytes().unwrap(), b"0012");
        let field = Field::new(Kind::Numeric, 4, Value::Text("1x".to_owned()));
        assert!(matches!(
            field.to_bytes(),
            Err(EncodeError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_encode_real_keeps_point() {
        let field = Field::new(Kind::Numeric, 6, Value::Real(2.0));
        assert_eq!(field.to_bytes().unwrap(), b"0002.0");
        let field = Field::new(Kind::Numeric, 6, Value::Real(f64::NAN));
        assert_eq!(field.to_bytes(), Err(EncodeError::NotFinite));
    }

    #[test]
    fn test_binary_is_zero_padded() {
        let field = Field::new(Kind::Binary, 4, Value::Bytes(vec![1, 2]));
        assert_eq!(field.to_bytes().unwrap(), vec![1, 2, 0, 0]);
        let decoded = decode(&[0xff, 0x00, 0x7f], 3, Kind::Binary).unwrap();
        assert_eq!(decoded.as_bytes(), Some(&[0xff, 0x00, 0x7f][..]));
    }

    #[test]
    fn test_kind_mismatch() {
        let field = Field::new(Kind::Numeric, 4, Value::Bytes(vec![1]));
        assert_eq!(
            field.to_bytes(),
            Err(EncodeError::KindMismatch {
                kind: Kind::Numeric,
                value: "binary"
            })
        );
    }

    #[test]
    fn test_encode_into_leaves_buffer_on_error() {
        let mut out = b"XX".to_vec();
        assert!(encode_into(&Field::numeric(2, 123), 2, &mut out).is_err());
        assert_eq!(out, b"XX");
    }
}
