use super::record;
use crate::protocol::daap::{
    ContentCode, DecodeError, DmapDecoder, DmapValue, FieldAnomaly, FieldCatalog, FieldDescriptor,
    MAX_DEPTH, ValueKind, codes, decode_integer, guess_payload,
};

#[test]
fn test_decode_four_byte_integer() {
    let data = record(b"mstt", &[0, 0, 0, 4]);
    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_int(&[codes::MSTT]), Some(4));
    assert_eq!(tree.leaf(codes::MSTT), Some(&DmapValue::unsigned(4, 4)));
}

#[test]
fn test_decode_signed_single_byte() {
    let rows = [FieldDescriptor::named(b"tsig", "test.signed", ValueKind::I8)];
    let catalog = FieldCatalog::from_descriptors(&rows).unwrap();
    let data = record(b"tsig", &[0xFF]);

    let tree = DmapDecoder::with_catalog(&catalog).decode(&data).unwrap();
    let code = ContentCode::new(b"tsig");
    assert_eq!(tree.get_int(&[code]), Some(-1));
    assert_eq!(tree.get_hex_identifier(&[code]).as_deref(), Some("FF"));
}

#[test]
fn test_integer_width_follows_payload_not_declared_kind() {
    // caps is declared 1 byte; a server sending 4 still decodes
    let data = record(b"caps", &[0, 0, 0, 4]);
    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_int(&[codes::CAPS]), Some(4));
}

#[test]
fn test_decode_nested_and_repeated_containers() {
    let first = record(b"mlit", &record(b"minm", b"Library"));
    let second = record(b"mlit", &record(b"minm", b"Podcasts"));
    let listing = record(b"mlcl", &[first, second].concat());
    let body = [record(b"mstt", &200u32.to_be_bytes()), listing].concat();
    let data = record(b"avdb", &body);

    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_int(&[codes::AVDB, codes::MSTT]), Some(200));

    let items = tree.get_multi_branch(&[codes::AVDB, codes::MLCL, codes::MLIT]);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].get_string(&[codes::MINM]).as_deref(), Some("Library"));
    assert_eq!(items[1].get_string(&[codes::MINM]).as_deref(), Some("Podcasts"));
}

#[test]
fn test_repeated_single_container_keeps_last() {
    let data = [
        record(b"cmst", &record(b"cmsr", &1u32.to_be_bytes())),
        record(b"cmst", &record(b"cmsr", &2u32.to_be_bytes())),
    ]
    .concat();
    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_int(&[codes::CMST, codes::CMSR]), Some(2));
}

#[test]
fn test_now_playing_derives_item_id() {
    let canp = [0, 0, 0, 0x21, 0, 0, 0, 0x22, 0, 0, 0, 0x23, 0, 0, 1, 0x2C];
    let data = record(b"cmst", &record(b"canp", &canp));

    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_int(&[codes::CMST, codes::MIID]), Some(300));
    assert_eq!(
        tree.get_leaf(&[codes::CMST, codes::CANP]),
        Some(&DmapValue::Raw(canp.to_vec()))
    );
}

#[test]
fn test_now_playing_with_bad_length_skips_derived_id() {
    let data = record(b"cmst", &record(b"canp", &[0, 0, 1, 0x2C]));
    let decoded = DmapDecoder::new().decode_with_diagnostics(&data).unwrap();

    assert!(decoded.tree.get_leaf(&[codes::CMST, codes::MIID]).is_none());
    assert_eq!(
        decoded.anomalies,
        vec![FieldAnomaly::BadSpecialLength {
            code: codes::CANP,
            expected: 16,
            actual: 4,
        }]
    );
}

#[test]
fn test_unknown_field_is_skipped() {
    let data = [
        record(b"zzzz", &[1, 2, 3]),
        record(b"minm", b"after unknown"),
    ]
    .concat();
    let decoded = DmapDecoder::new().decode_with_diagnostics(&data).unwrap();

    assert_eq!(
        decoded.tree.get_string(&[codes::MINM]).as_deref(),
        Some("after unknown")
    );
    assert!(matches!(
        &decoded.anomalies[..],
        [FieldAnomaly::UnknownField { code, length: 3, .. }] if *code == ContentCode::new(b"zzzz")
    ));
}

#[test]
fn test_bad_integer_length_skips_only_that_field() {
    let data = [
        record(b"mstt", &[0, 0, 1]),
        record(b"minm", b"sibling"),
    ]
    .concat();
    let decoded = DmapDecoder::new().decode_with_diagnostics(&data).unwrap();

    assert!(!decoded.tree.contains_leaf(codes::MSTT));
    assert_eq!(
        decoded.tree.get_string(&[codes::MINM]).as_deref(),
        Some("sibling")
    );
    assert_eq!(
        decoded.anomalies,
        vec![FieldAnomaly::BadIntegerLength {
            code: codes::MSTT,
            length: 3
        }]
    );
}

#[test]
fn test_fixed_size_fields() {
    let data = [
        record(b"mslr", &[1]),
        record(b"mstm", &1_700_000_000u32.to_be_bytes()),
        record(b"mpro", &[0, 2, 0, 10]),
    ]
    .concat();
    let tree = DmapDecoder::new().decode(&data).unwrap();

    assert_eq!(
        tree.leaf(ContentCode::new(b"mslr")),
        Some(&DmapValue::Boolean(true))
    );
    assert_eq!(
        tree.leaf(ContentCode::new(b"mpro")),
        Some(&DmapValue::Version { major: 2, minor: 10 })
    );
}

#[test]
fn test_boolean_with_wrong_length_is_an_anomaly() {
    let data = record(b"mslr", &[0, 1]);
    let decoded = DmapDecoder::new().decode_with_diagnostics(&data).unwrap();
    assert!(decoded.tree.is_empty());
    assert_eq!(
        decoded.anomalies,
        vec![FieldAnomaly::BadFixedLength {
            code: ContentCode::new(b"mslr"),
            expected: 1,
            actual: 2,
        }]
    );
}

#[test]
fn test_truncated_payload_is_fatal() {
    let mut data = record(b"minm", b"hello");
    data.truncate(data.len() - 2);

    let err = DmapDecoder::new().decode(&data).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::Truncated {
            code: Some(code),
            needed: 5,
            available: 3,
        } if code == codes::MINM
    ));
}

#[test]
fn test_truncated_header_is_fatal() {
    let err = DmapDecoder::new().decode(b"mst").unwrap_err();
    assert!(matches!(
        err,
        DecodeError::Truncated {
            code: None,
            needed: 8,
            available: 3
        }
    ));
}

#[test]
fn test_truncation_inside_container_is_fatal() {
    // inner record claims 10 bytes but the container only holds 2
    let mut inner = b"minm".to_vec();
    inner.extend_from_slice(&10u32.to_be_bytes());
    inner.extend_from_slice(b"hi");
    let data = record(b"cmst", &inner);

    assert!(DmapDecoder::new().decode(&data).is_err());
}

#[test]
fn test_empty_message_decodes_to_empty_tree() {
    let tree = DmapDecoder::new().decode(&[]).unwrap();
    assert!(tree.is_empty());
}

#[test]
fn test_nesting_limit() {
    let mut data = record(b"minm", b"deep");
    for _ in 0..=MAX_DEPTH {
        data = record(b"cmst", &data);
    }
    assert!(matches!(
        DmapDecoder::new().decode(&data),
        Err(DecodeError::TooDeep(_))
    ));
}

#[test]
fn test_decode_reader() {
    let data = record(b"minm", b"streamed");
    let tree = DmapDecoder::new()
        .decode_reader(data.as_slice(), data.len())
        .unwrap();
    assert_eq!(tree.get_string(&[codes::MINM]).as_deref(), Some("streamed"));

    let err = DmapDecoder::new()
        .decode_reader(data.as_slice(), data.len() + 4)
        .unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { code: None, .. }));
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let data = record(b"minm", &[0x66, 0xFF, 0x6F]);
    let tree = DmapDecoder::new().decode(&data).unwrap();
    assert_eq!(tree.get_string(&[codes::MINM]).as_deref(), Some("f\u{FFFD}o"));
}

#[test]
fn test_decode_integer_widths() {
    assert_eq!(decode_integer(&[0x01, 0x00], false), Some(DmapValue::unsigned(256, 2)));
    assert_eq!(decode_integer(&[0xFF, 0xFE], true), Some(DmapValue::signed(-2, 2)));
    assert_eq!(
        decode_integer(&[0xFF; 8], false),
        Some(DmapValue::unsigned(u64::MAX, 8))
    );
    assert_eq!(decode_integer(&[0; 3], false), None);
    assert_eq!(decode_integer(&[], true), None);
}

#[test]
fn test_guess_payload() {
    assert_eq!(guess_payload(&[0, 0, 0, 7]), "int 7");
    assert_eq!(guess_payload(b"abc"), "text \"abc\"");
    assert_eq!(guess_payload(&[0xFF, 0xFE, 0xFD]), "3 opaque bytes");
}
