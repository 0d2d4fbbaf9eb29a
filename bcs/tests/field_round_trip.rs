use bcs::{decode, encode, Field, Kind, Value};

#[test]
fn test_header_fields_round_trip() {
    let fields = vec![
        Field::alphanumeric(4, "NITF"),
        Field::alphanumeric(80, "Sample image title"),
        Field::numeric(12, 1_234_567),
        Field::new(Kind::Numeric, 5, Value::Signed(-42)),
        Field::new(Kind::Numeric, 8, Value::Real(-3.5)),
        Field::undefined(Kind::Numeric, 3),
        Field::undefined(Kind::Alphanumeric, 10),
        Field::binary(vec![0, 0, 0xff]),
    ];

    for field in fields {
        let bytes = encode(&field, field.width()).unwrap();
        assert_eq!(bytes.len(), field.width());
        let decoded = decode(&bytes, field.width(), field.kind()).unwrap();
        println!("{:?} -> {:?}", field.value(), decoded.value());
        match (field.value(), decoded.value()) {
            // Blank text decodes as the empty string.
            (Value::Undefined, Value::Text(text)) => assert!(text.is_empty()),
            (expected, actual) => assert_eq!(expected, actual),
        }
    }
}

#[test]
fn test_maximum_widths() {
    let field = Field::numeric(10, 9_999_999_999);
    assert_eq!(field.to_bytes().unwrap(), b"9999999999");
    assert!(Field::numeric(10, 10_000_000_000).to_bytes().is_err());
}
