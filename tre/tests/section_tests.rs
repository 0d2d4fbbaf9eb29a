use tre::{Extensions, Registry, Tre, TreError};

fn engrda_payload() -> Vec<u8> {
    let mut payload = b"SENSOR              001".to_vec();
    payload.extend_from_slice(b"03ABC00010001I1  00000003");
    payload.extend_from_slice(&[7, 8, 9]);
    payload
}

fn section(tres: &[(&str, &[u8])]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (tag, payload) in tres {
        bytes.extend_from_slice(format!("{:<6}{:05}", tag, payload.len()).as_bytes());
        bytes.extend_from_slice(payload);
    }
    bytes
}

#[test]
fn test_unknown_tres_round_trip_byte_identical() {
    let binary: Vec<u8> = (0..=255).collect();
    let bytes = section(&[("ZZTOP", b"hello world"), ("BLOB", &binary), ("EMPTY", b"")]);
    let registry = Registry::with_builtins();

    let (extensions, warnings) = Extensions::decode_section(&bytes, &registry).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(extensions.len(), 3);
    assert!(extensions.iter().all(Tre::is_raw));
    assert_eq!(extensions.encode().unwrap(), bytes);
}

#[test]
fn test_builtin_engrda_in_section() {
    let payload = engrda_payload();
    let bytes = section(&[("ENGRDA", &payload), ("OTHER", b"x")]);
    let registry = Registry::with_builtins();

    let (extensions, warnings) = Extensions::decode_section(&bytes, &registry).unwrap();
    assert!(warnings.is_empty());
    let engrda = extensions.find("ENGRDA").next().unwrap();
    assert!(!engrda.is_raw());
    assert_eq!(
        engrda.field("ENGDATA[0]").and_then(|f| f.as_bytes()),
        Some(&[7, 8, 9][..])
    );
    assert_eq!(extensions.encode().unwrap(), bytes);
}

#[test]
fn test_malformed_engrda_kept_raw_with_warning() {
    let mut payload = engrda_payload();
    // One data byte short of what ENGDATC * ENGDTS promises.
    payload.pop();
    let bytes = section(&[("ENGRDA", &payload)]);
    let registry = Registry::with_builtins();

    let (extensions, warnings) = Extensions::decode_section(&bytes, &registry).unwrap();
    assert_eq!(warnings.len(), 1);
    println!("{}", warnings[0]);
    assert!(matches!(warnings[0], TreError::Format { .. }));
    assert!(extensions.get(0).unwrap().is_raw());
    assert_eq!(extensions.encode().unwrap(), bytes);
}

#[test]
fn test_strict_decoding_rejects_malformed() {
    let mut payload = engrda_payload();
    payload.push(0);
    let registry = Registry::with_builtins();
    assert!(registry.decode_strict("ENGRDA", &payload).is_err());
}
