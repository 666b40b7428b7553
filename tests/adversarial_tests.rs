//! Malformed and hostile input: every case must fail cleanly, never panic.

use btoon::{
    btoon, decode, decode_with_options, encode, encode_with_options, DecodeErrorKind, DecodeOptions,
    Decimal, EncodeOptions, Error, Timestamp, Value,
};

fn nested_lists(depth: usize) -> Value {
    let mut value = Value::Null;
    for _ in 0..depth {
        value = Value::List(vec![value]);
    }
    value
}

fn crafted_nested_lists(depth: usize) -> Vec<u8> {
    let mut bytes = b"BTN\x01\x00".to_vec();
    for _ in 0..depth {
        bytes.push(0x10);
        bytes.extend_from_slice(&1u32.to_le_bytes());
    }
    bytes.push(0x00);
    bytes
}

fn assert_every_prefix_truncated(bytes: &[u8]) {
    for len in 0..bytes.len() {
        match decode(&bytes[..len]) {
            Err(err) => assert!(err.is_truncated(), "prefix of {} bytes gave {:?}", len, err),
            Ok(value) => panic!("prefix of {} bytes decoded to {}", len, value),
        }
    }
}

#[test]
fn test_truncation_safety_plain() {
    let price = Value::from(Decimal::new(-995, 2));
    let stamp = Value::from(Timestamp::new(1_234_567_890, Some(60)).unwrap());
    let value = btoon!({
        "name": "sensor",
        "blob": null,
        "readings": [1, 2000, 70000],
        "price": price,
        "at": stamp,
        "rows": [{"k": 1, "v": "a"}, {"k": 2, "v": null}]
    });
    assert_every_prefix_truncated(&encode(&value).unwrap());
}

#[test]
fn test_truncation_safety_compressed() {
    let value = Value::from("compress me ".repeat(100));
    let bytes = encode_with_options(&value, &EncodeOptions::new().with_compression(true)).unwrap();
    assert_eq!(bytes[4] & 0x01, 0x01);
    assert_every_prefix_truncated(&bytes);
}

#[test]
fn test_encode_depth_limit() {
    let err = encode(&nested_lists(200)).unwrap_err();
    assert!(err.is_depth_exceeded());
    assert!(encode(&nested_lists(128)).is_ok());
}

#[test]
fn test_decode_depth_limit() {
    let err = decode(&crafted_nested_lists(200)).unwrap_err();
    assert!(err.is_depth_exceeded());
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::DepthExceeded { limit: 128 }));

    assert_eq!(decode(&crafted_nested_lists(128)).unwrap(), nested_lists(128));
}

#[test]
fn test_custom_depth_limit() {
    let options = DecodeOptions::new().with_max_depth(4);
    assert!(decode_with_options(&crafted_nested_lists(4), &options).is_ok());
    assert!(decode_with_options(&crafted_nested_lists(5), &options)
        .unwrap_err()
        .is_depth_exceeded());
}

#[test]
fn test_bad_magic() {
    let err = decode(b"XYZ\x01\x00\x00").unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::BadMagic { found: *b"XYZ" }));
}

#[test]
fn test_unsupported_version() {
    let err = decode(b"BTN\x02\x00\x00").unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::UnsupportedVersion { found: 2 }));
}

#[test]
fn test_reserved_flag_bits() {
    let err = decode(b"BTN\x01\x80\x00").unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::InvalidFlags { flags: 0x80 }));
}

#[test]
fn test_tabular_flag_must_match_root() {
    let err = decode(b"BTN\x01\x02\x00").unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::InvalidFlags { flags: 0x02 }));
}

#[test]
fn test_huge_length_fields() {
    assert!(decode(b"BTN\x01\x00\x07\xff\xff\xff\xff").unwrap_err().is_truncated());
    assert!(decode(b"BTN\x01\x00\x10\xff\xff\xff\xff\x00").unwrap_err().is_truncated());
    assert!(decode(b"BTN\x01\x00\x11\xff\xff\xff\xff\x00").unwrap_err().is_truncated());
}

#[test]
fn test_trailing_bytes() {
    let err = decode(b"BTN\x01\x00\x00\x00").unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::TrailingBytes { remaining: 1 }));
}

#[test]
fn test_corrupt_compressed_payload() {
    let value = Value::from("compress me ".repeat(100));
    let mut bytes = encode_with_options(&value, &EncodeOptions::new().with_compression(true)).unwrap();
    let last = bytes.len() - 6;
    bytes[last] ^= 0xff;
    bytes[13] ^= 0xff;
    assert!(matches!(decode(&bytes), Err(Error::Compression(_))));
}

#[test]
fn test_tabular_column_count_mismatch() {
    // Declares two rows but the single Int8 column holds only one payload.
    let mut bytes = b"BTN\x01\x02\x40".to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(b'a');
    bytes.push(0x02);
    bytes.push(0x00);
    bytes.push(0x07);
    assert!(decode(&bytes).unwrap_err().is_truncated());

    bytes.push(0x08);
    assert_eq!(decode(&bytes).unwrap(), btoon!([{"a": 7}, {"a": 8}]));
}

fn tabular_header(rows: u32, columns: &[(&str, u8, u8)]) -> Vec<u8> {
    let mut bytes = b"BTN\x01\x02\x40".to_vec();
    bytes.extend_from_slice(&(columns.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&rows.to_le_bytes());
    for (name, kind, flags) in columns {
        bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(*kind);
        bytes.push(*flags);
    }
    bytes
}

#[test]
fn test_all_null_tabular_block_is_rejected() {
    for rows in [2, 5_000_000, u32::MAX] {
        let bytes = tabular_header(rows, &[("a", 0x00, 0)]);
        assert!(
            matches!(decode(&bytes).unwrap_err().decode_kind(), Some(DecodeErrorKind::MalformedTable(_))),
            "{} rows",
            rows
        );
    }
}

#[test]
fn test_tabular_row_count_bounded_by_input() {
    // A typed column without a bitmap needs a byte per row.
    let bytes = tabular_header(u32::MAX, &[("a", 0x00, 0), ("b", 0x02, 0)]);
    assert!(decode(&bytes).unwrap_err().is_truncated());

    // With a bitmap, one bit per row.
    let mut bytes = tabular_header(u32::MAX, &[("a", 0x02, 1)]);
    bytes.extend_from_slice(&[0u8; 64]);
    assert!(decode(&bytes).unwrap_err().is_truncated());

    let mut bytes = tabular_header(16, &[("n", 0x00, 0), ("b", 0x02, 1)]);
    bytes.extend_from_slice(&[0u8; 2]);
    let rows = decode(&bytes).unwrap();
    assert_eq!(rows.as_list().map(|r| r.len()), Some(16));
}

#[test]
fn test_all_null_rows_encode_row_major() {
    let rows = btoon!([{"a": null}, {"a": null}, {"a": null}]);
    let bytes = encode(&rows).unwrap();
    assert_eq!(bytes[4], 0x00);
    assert_eq!(bytes[5], 0x10);
    assert_eq!(decode(&bytes).unwrap(), rows);
}

#[test]
fn test_random_garbage_never_panics() {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    for _ in 0..2000 {
        let mut bytes = b"BTN\x01".to_vec();
        let len = (state % 40) as usize;
        for _ in 0..len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            bytes.push(state as u8);
        }
        let _ = decode(&bytes);
    }
}
