use nitf::{
    BandSource, ImageSource, MemorySource, NitfError, Payload, Reader, ReaderOptions,
    ReaderState, Record, Registry, Tre, Writer, WriterOptions,
};
use std::io::Cursor;

// Offsets in a file header without TREs or extra fields.
const HL: std::ops::Range<usize> = 354..360;
const LISH: std::ops::Range<usize> = 363..369;
const LI: std::ops::Range<usize> = 369..379;

fn small_file() -> Vec<u8> {
    let mut record = Record::new();
    let image = record.new_image_segment();
    image.subheader.num_rows = 4;
    image.subheader.num_cols = 4;
    image.subheader.set_blocking(0, 0);
    record.new_text_segment().payload = Payload::Bytes(b"text".to_vec());

    let mut writer = Writer::new(Vec::new(), WriterOptions::default());
    let bands: Vec<Box<dyn BandSource>> = vec![Box::new(MemorySource::new((0..16).collect()))];
    writer.attach_image(0..1, ImageSource::new(bands));
    writer.write(&mut record).unwrap();
    writer.into_inner()
}

fn read(bytes: Vec<u8>) -> Result<(), NitfError> {
    let mut reader = Reader::new(Cursor::new(bytes), Registry::new(), ReaderOptions::default());
    reader.read().map(|_| ())
}

#[test]
fn test_valid_file_reads() {
    let bytes = small_file();
    // 388 plus one image and one text length pair.
    assert_eq!(&bytes[HL], b"000413");
    assert!(read(bytes).is_ok());
}

#[test]
fn test_not_nitf() {
    let mut bytes = small_file();
    bytes[..4].copy_from_slice(b"JUNK");
    assert!(matches!(read(bytes), Err(NitfError::NotNitf { .. })));
    assert!(matches!(read(b"NI".to_vec()), Err(NitfError::NotNitf { .. })));
}

#[test]
fn test_unsupported_version() {
    let mut bytes = small_file();
    bytes[4..9].copy_from_slice(b"02.00");
    assert!(matches!(
        read(bytes),
        Err(NitfError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_header_length_out_of_range() {
    let mut bytes = small_file();
    bytes[HL].copy_from_slice(b"999999");
    assert!(matches!(read(bytes), Err(NitfError::Structural { .. })));

    let mut bytes = small_file();
    bytes[HL].copy_from_slice(b"000100");
    assert!(matches!(read(bytes), Err(NitfError::Structural { .. })));
}

#[test]
fn test_lengths_past_end_of_stream() {
    let mut bytes = small_file();
    bytes[LISH].copy_from_slice(b"999999");
    assert!(matches!(read(bytes), Err(NitfError::Structural { .. })));

    let mut bytes = small_file();
    bytes[LI].copy_from_slice(b"9999999999");
    assert!(matches!(read(bytes), Err(NitfError::Structural { .. })));

    let mut bytes = small_file();
    bytes.truncate(bytes.len() - 2);
    assert!(matches!(read(bytes), Err(NitfError::Structural { .. })));
}

#[test]
fn test_non_numeric_length() {
    let mut bytes = small_file();
    bytes[LI.start] = b'x';
    assert!(matches!(read(bytes), Err(NitfError::Field { .. })));
}

#[test]
fn test_stage_order() {
    let mut reader = Reader::new(
        Cursor::new(small_file()),
        Registry::new(),
        ReaderOptions::default(),
    );
    assert!(matches!(
        reader.read_text(0),
        Err(NitfError::InvalidState {
            expected: ReaderState::DataAccessible,
            actual: ReaderState::Unopened,
        })
    ));
    reader.read_header().unwrap();
    assert!(matches!(
        reader.read_header(),
        Err(NitfError::InvalidState { .. })
    ));
    reader.index_segments().unwrap();
    reader.validate().unwrap();
    assert_eq!(reader.read_text(0).unwrap(), b"text".to_vec());

    reader.close();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert!(reader.read_text(0).is_err());
}

#[test]
fn test_strict_tres() {
    // ENGRDA claiming one record but holding none.
    let mut record = Record::new();
    let mut payload = format!("{:<20}", "SOURCE").into_bytes();
    payload.extend_from_slice(b"001");
    record.header.user_defined.push(Tre::raw("ENGRDA", payload).unwrap());
    let bytes = nitf::write_record(Vec::new(), &mut record).unwrap();

    let mut lenient = Reader::new(
        Cursor::new(bytes.clone()),
        Registry::with_builtins(),
        ReaderOptions::default(),
    );
    let header = lenient.read_header().unwrap();
    assert!(header.user_defined.get(0).unwrap().is_raw());
    assert_eq!(lenient.warnings().len(), 1);

    let mut strict = Reader::new(
        Cursor::new(bytes),
        Registry::with_builtins(),
        ReaderOptions { strict_tres: true },
    );
    assert!(matches!(strict.read_header(), Err(NitfError::Tre { .. })));
}

#[test]
fn test_count_limit() {
    let mut record = Record::new();
    for _ in 0..1000 {
        record.new_text_segment().payload = Payload::Bytes(Vec::new());
    }
    assert!(matches!(
        nitf::write_record(Vec::new(), &mut record),
        Err(NitfError::Structural { .. })
    ));
}
