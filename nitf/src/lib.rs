//! NITF 2.1 / NSIF 1.0 records: decoding, in-memory editing and encoding.

use std::error;
use std::fmt;
use std::io;

mod band;
mod clevel;
mod des;
mod fields;
mod graphic;
mod header;
mod image;
mod image_io;
pub mod overflow;
mod reader;
mod record;
mod res;
mod security;
mod text;
mod window;
mod writer;

pub use band::{BandSink, BandSource, FileSource, MemorySink, MemorySource, PixelSkipSource};
pub use clevel::complexity_level;
pub use des::{DataExtensionSubheader, OverflowSection, OverflowTarget, OVERFLOW_DESID};
pub use fields::Offset;
pub use graphic::GraphicSubheader;
pub use header::{ComponentInfo, FileHeader};
pub use image::{BandInfo, ImageMode, ImageSubheader, LookupTable};
pub use image_io::{BlockCache, ImageLayout};
pub use reader::{ImageReader, Reader, ReaderOptions, ReaderState};
pub use record::{Payload, Record, Segment};
pub use res::ReservedExtensionSubheader;
pub use security::SecurityGroup;
pub use text::TextSubheader;
pub use window::{PixelSkip, SubWindow};
pub use writer::{ImageSource, Writer, WriterOptions};

pub use tre::{Extensions, Registry, Tre};

/// Where in a record something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    FileHeader,
    Image(usize),
    Graphic(usize),
    Text(usize),
    DataExtension(usize),
    ReservedExtension(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FileHeader => write!(f, "file header"),
            Self::Image(i) => write!(f, "image segment {}", i),
            Self::Graphic(i) => write!(f, "graphic segment {}", i),
            Self::Text(i) => write!(f, "text segment {}", i),
            Self::DataExtension(i) => write!(f, "data extension segment {}", i),
            Self::ReservedExtension(i) => write!(f, "reserved extension segment {}", i),
        }
    }
}

#[derive(Debug)]
pub enum NitfError {
    Io(io::Error),
    NotNitf { signature: String },
    UnsupportedVersion { version: String },
    Field {
        location: Location,
        field: &'static str,
        source: bcs::DecodeError,
    },
    Encode {
        location: Location,
        field: &'static str,
        source: bcs::EncodeError,
    },
    Truncated {
        location: Location,
        field: &'static str,
    },
    Structural { location: Location, reason: String },
    Tre {
        location: Location,
        source: tre::TreError,
    },
    TreNotRepresentable {
        location: Location,
        tag: String,
        length: usize,
    },
    Segmentation(imseg::SegmentationError),
    Blocking(imseg::BlockingError),
    ToWrite { location: Location, reason: String },
    Unsupported { location: Location, reason: String },
    InvalidWindow { reason: String },
    InvalidState {
        expected: ReaderState,
        actual: ReaderState,
    },
    SizeOverflow,
    /// A relocation loop stopped making progress.
    Internal { location: Location, reason: String },
}

impl error::Error for NitfError {}
impl fmt::Display for NitfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::NotNitf { signature } => {
                write!(f, "not a NITF or NSIF file (signature {:?})", signature)
            }
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported version {:?}", version)
            }
            Self::Field {
                location,
                field,
                source,
            } => write!(f, "{} field {}: {}", location, field, source),
            Self::Encode {
                location,
                field,
                source,
            } => write!(f, "{} field {}: {}", location, field, source),
            Self::Truncated { location, field } => {
                write!(f, "{} ends before field {}", location, field)
            }
            Self::Structural { location, reason } => write!(f, "{}: {}", location, reason),
            Self::Tre { location, source } => write!(f, "{}: {}", location, source),
            Self::TreNotRepresentable {
                location,
                tag,
                length,
            } => write!(
                f,
                "{}: TRE {} of {} bytes cannot be stored in any extension section",
                location, tag, length
            ),
            Self::Segmentation(e) => write!(f, "{}", e),
            Self::Blocking(e) => write!(f, "{}", e),
            Self::ToWrite { location, reason } => {
                write!(f, "cannot write {}: {}", location, reason)
            }
            Self::Unsupported { location, reason } => {
                write!(f, "{}: unsupported {}", location, reason)
            }
            Self::InvalidWindow { reason } => write!(f, "invalid window: {}", reason),
            Self::InvalidState { expected, actual } => write!(
                f,
                "reader is {:?} but the operation needs {:?}",
                actual, expected
            ),
            Self::SizeOverflow => write!(f, "size computation overflowed"),
            Self::Internal { location, reason } => {
                write!(f, "internal error at {}: {}", location, reason)
            }
        }
    }
}

impl From<io::Error> for NitfError {
    fn from(e: io::Error) -> Self {
        NitfError::Io(e)
    }
}

impl From<imseg::SegmentationError> for NitfError {
    fn from(e: imseg::SegmentationError) -> Self {
        NitfError::Segmentation(e)
    }
}

impl From<imseg::BlockingError> for NitfError {
    fn from(e: imseg::BlockingError) -> Self {
        match e {
            imseg::BlockingError::SizeOverflow => NitfError::SizeOverflow,
            other => NitfError::Blocking(other),
        }
    }
}

/// A recovered problem: the TRE was kept raw and reading continued.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub location: Location,
    pub error: tre::TreError,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// Reads the header, every subheader and every extension section of a
/// stream. Payloads are left in the stream.
pub fn read_record<R: io::Read + io::Seek>(
    stream: R,
    registry: Registry,
) -> Result<(Record, Vec<Warning>), NitfError> {
    let mut reader = Reader::new(stream, registry, ReaderOptions::default());
    reader.read()?;
    let warnings = reader.warnings().to_vec();
    let record = reader.take_record()?;
    Ok((record, warnings))
}

/// Writes a record whose payloads are all held in memory.
pub fn write_record<W: io::Write>(stream: W, record: &mut Record) -> Result<W, NitfError> {
    let mut writer = Writer::new(stream, WriterOptions::default());
    writer.write(record)?;
    Ok(writer.into_inner())
}
