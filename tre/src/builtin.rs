use crate::descriptor::{Descriptor, Expr, Item};
use bcs::Kind;

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![engrda()]
}

/// ENGRDA: engineering data, a counted list of labelled matrices.
pub fn engrda() -> Descriptor {
    Descriptor::new(
        "ENGRDA",
        vec![
            // RESRC: Unique source system name.
            Item::field("RESRC", Kind::Alphanumeric, 20),
            // RECNT: Record entry count.
            Item::field("RECNT", Kind::Numeric, 3),
            Item::repeat(
                Expr::field("RECNT"),
                vec![
                    Item::field("ENGLN", Kind::Numeric, 2),
                    Item::computed("ENGLBL", Kind::Alphanumeric, Expr::field("ENGLN")),
                    Item::field("ENGMTXC", Kind::Numeric, 4),
                    Item::field("ENGMTXR", Kind::Numeric, 4),
                    Item::field("ENGTYP", Kind::Alphanumeric, 1),
                    // ENGDTS: Element size in bytes.
                    Item::field("ENGDTS", Kind::Numeric, 1),
                    Item::field("ENGDATU", Kind::Alphanumeric, 2),
                    // ENGDATC: Element count.
                    Item::field("ENGDATC", Kind::Numeric, 8),
                    Item::computed(
                        "ENGDATA",
                        Kind::Binary,
                        Expr::field("ENGDATC").mul(Expr::field("ENGDTS")),
                    ),
                ],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engrda_two_records() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"SOURCE              002");
        payload.extend_from_slice(b"04TEMP00010001I2tC00000001");
        payload.extend_from_slice(&[0x01, 0x2c]);
        payload.extend_from_slice(b"01X00020001R4m 00000002");
        payload.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2]);

        let tre = engrda().decode("ENGRDA", &payload).unwrap();
        assert_eq!(tre.field("RESRC").and_then(|f| f.as_str()), Some("SOURCE"));
        assert_eq!(tre.field("ENGLBL[0]").and_then(|f| f.as_str()), Some("TEMP"));
        assert_eq!(
            tre.field("ENGDATA[0]").and_then(|f| f.as_bytes()),
            Some(&[0x01, 0x2c][..])
        );
        assert_eq!(tre.field("ENGLBL[1]").and_then(|f| f.as_str()), Some("X"));
        assert_eq!(tre.field("ENGDATA[1]").map(|f| f.width()), Some(8));
        assert_eq!(tre.encode_payload().unwrap(), payload);
    }
}
