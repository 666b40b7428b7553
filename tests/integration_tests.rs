use btoon::{
    btoon, decode, decode_with_options, encode, encode_with_options, from_slice, to_vec, BtoonMap,
    Currency, DecodeOptions, Decimal, EncodeOptions, ExtendedScalar, Percentage, TabularBlock,
    Timestamp, Value,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct User {
    id: u32,
    name: String,
    active: bool,
    tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Product {
    sku: String,
    price: f64,
    quantity: u32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Order {
    order_id: u32,
    customer: User,
    items: Vec<Product>,
    total: Decimal,
    placed_at: Timestamp,
}

fn roundtrip(value: &Value) -> Value {
    decode(&encode(value).unwrap()).unwrap()
}

fn sample_rows() -> Value {
    btoon!([
        {"id": 1, "name": "Alice", "score": 9.5, "admin": true},
        {"id": 2, "name": "Bob", "score": 7.25, "admin": false},
        {"id": 300, "name": "Carol", "score": 8.0, "admin": false}
    ])
}

#[test]
fn test_scalar_roundtrip() {
    let values = vec![
        Value::Null,
        Value::from(true),
        Value::from(false),
        Value::from(0),
        Value::from(-1),
        Value::from(i64::MIN),
        Value::from(i64::MAX),
        Value::from(3.25),
        Value::from(f64::INFINITY),
        Value::from("hello"),
        Value::bytes(vec![0u8, 255, 7]),
    ];
    for value in values {
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_nan_survives_as_nan() {
    let back = roundtrip(&Value::from(f64::NAN));
    assert!(back.as_f64().is_some_and(f64::is_nan));
}

#[test]
fn test_empty_containers_roundtrip() {
    let values = vec![
        Value::List(Vec::new()),
        Value::Map(BtoonMap::new()),
        Value::from(""),
        Value::bytes(Vec::new()),
    ];
    for value in values {
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_integer_widths_on_the_wire() {
    assert_eq!(encode(&Value::from(127)).unwrap()[5..], [0x02u8, 0x7f]);
    assert_eq!(encode(&Value::from(128)).unwrap()[5..], [0x03u8, 0x80, 0x00]);
    assert_eq!(encode(&Value::from(-32769)).unwrap()[5], 0x04);
    assert_eq!(encode(&Value::from(1i64 << 40)).unwrap()[5], 0x05);
}

#[test]
fn test_map_preserves_insertion_order() {
    let value = btoon!({"zeta": 1, "alpha": 2, "mid": 3});
    let back = roundtrip(&value);
    let keys: Vec<&String> = back.as_map().unwrap().keys().collect();
    assert_eq!(keys, ["zeta", "alpha", "mid"]);
    assert_eq!(back, value);
    assert_ne!(back, btoon!({"alpha": 2, "mid": 3, "zeta": 1}));
}

#[test]
fn test_nested_struct_roundtrip() {
    let order = Order {
        order_id: 12345,
        customer: User {
            id: 123,
            name: "Alice".to_string(),
            active: true,
            tags: vec!["vip".to_string()],
        },
        items: vec![
            Product {
                sku: "WIDGET-001".to_string(),
                price: 29.99,
                quantity: 2,
            },
            Product {
                sku: "GADGET-002".to_string(),
                price: 49.99,
                quantity: 1,
            },
        ],
        total: Decimal::new(10997, 2),
        placed_at: Timestamp::new(1_700_000_000_123_456_789, Some(-300)).unwrap(),
    };

    let bytes = to_vec(&order).unwrap();
    let back: Order = from_slice(&bytes).unwrap();
    assert_eq!(order, back);
}

#[test]
fn test_tabular_transparency() {
    let rows = sample_rows();
    let columnar = encode(&rows).unwrap();
    let row_major = encode_with_options(&rows, &EncodeOptions::new().with_auto_tabular(false)).unwrap();

    assert_eq!(columnar[4], 0x02);
    assert_eq!(columnar[5], 0x40);
    assert_eq!(row_major[4], 0x00);
    assert_eq!(row_major[5], 0x10);
    assert_eq!(decode(&columnar).unwrap(), decode(&row_major).unwrap());
    assert_eq!(decode(&columnar).unwrap(), rows);
}

#[test]
fn test_tabular_with_nulls_and_extended_columns() {
    let price = Value::from(Decimal::new(1999, 2));
    let rows = btoon!([
        {"sku": "A", "price": price, "note": null},
        {"sku": "B", "price": null, "note": null},
        {"sku": "C", "price": price, "note": null}
    ]);
    let bytes = encode(&rows).unwrap();
    assert_eq!(bytes[5], 0x40);
    assert_eq!(decode(&bytes).unwrap(), rows);
}

#[test]
fn test_single_row_never_tabularizes() {
    let rows = btoon!([{"id": 1, "name": "only"}]);
    let bytes = encode(&rows).unwrap();
    assert_eq!(bytes[5], 0x10);
    assert_eq!(decode(&bytes).unwrap(), rows);
}

#[test]
fn test_mismatched_keys_never_tabularize() {
    let rows = btoon!([{"id": 1, "name": "a"}, {"id": 2, "title": "b"}]);
    let bytes = encode(&rows).unwrap();
    assert_eq!(bytes[5], 0x10);
    assert_eq!(decode(&bytes).unwrap(), rows);

    let reordered = btoon!([{"id": 1, "name": "a"}, {"name": "b", "id": 2}]);
    let bytes = encode(&reordered).unwrap();
    assert_eq!(bytes[5], 0x10);
    assert_eq!(decode(&bytes).unwrap(), reordered);
    assert_ne!(decode(&bytes).unwrap(), btoon!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]));
}

#[test]
fn test_mixed_kind_column_never_tabularizes() {
    let rows = btoon!([{"v": 1}, {"v": "one"}]);
    assert_eq!(encode(&rows).unwrap()[5], 0x10);
    assert_eq!(roundtrip(&rows), rows);
}

#[test]
fn test_nested_tabular_inside_map() {
    let rows = sample_rows();
    let value = btoon!({"report": "weekly", "rows": rows});
    let bytes = encode(&value).unwrap();
    assert_eq!(bytes[4], 0x00);
    assert_eq!(decode(&bytes).unwrap(), value);
}

#[test]
fn test_typed_column_view() {
    let rows = sample_rows();
    let block = TabularBlock::from_rows(rows.as_list().unwrap()).unwrap();
    assert_eq!(block.row_count(), 3);
    let names: Vec<&str> = block.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "score", "admin"]);
    assert_eq!(block.column("id").unwrap().data.get(2), Some(Value::from(300)));
    assert_eq!(block.into_value(), rows);
}

#[test]
fn test_decimal_exactness() {
    let decimal = Decimal::new(12345, 2);
    let back = roundtrip(&Value::from(decimal));
    assert_eq!(back.as_decimal(), Some(decimal));
    assert_eq!(back.to_string(), "123.45");

    let currency = Currency::new(Decimal::new(-50, 2), "EUR").unwrap();
    let back = roundtrip(&Value::from(currency));
    assert_eq!(back, Value::from(currency));
    assert_eq!(back.as_extended(), Some(&ExtendedScalar::Currency(currency)));

    let percentage = Percentage::from_ratio(Decimal::new(125, 3));
    assert_eq!(roundtrip(&Value::from(percentage)), Value::from(percentage));
}

#[test]
fn test_decimal_payload_layout() {
    let bytes = encode(&Value::from(Decimal::new(12345, 2))).unwrap();
    let mut expected = vec![0x20, 0x02];
    expected.extend_from_slice(&12345i64.to_le_bytes());
    expected.extend_from_slice(&2i32.to_le_bytes());
    assert_eq!(bytes[5..], expected[..]);
}

#[test]
fn test_timestamp_offset_roundtrip() {
    let with_offset = Timestamp::new(-1, Some(1440)).unwrap();
    let without = Timestamp::from_nanos(86_400_000_000_000);
    assert_eq!(roundtrip(&Value::from(with_offset)).as_timestamp(), Some(with_offset));
    assert_eq!(roundtrip(&Value::from(without)).as_timestamp(), Some(without));
    assert!(Timestamp::new(0, Some(1441)).is_err());
}

#[test]
fn test_compression_idempotence() {
    let rows: Vec<Value> = (0..200)
        .map(|i| {
            let mut row = BtoonMap::new();
            row.insert("id".to_string(), Value::from(i));
            row.insert("label".to_string(), Value::from("repetitive label text"));
            Value::Map(row)
        })
        .collect();
    let value = Value::List(rows);

    let plain = encode(&value).unwrap();
    let packed = encode_with_options(&value, &EncodeOptions::new().with_compression(true)).unwrap();
    assert_eq!(packed[4] & 0x01, 0x01);
    assert!(packed.len() < plain.len());

    let decompress = DecodeOptions::new().with_decompress(true);
    assert_eq!(decode_with_options(&packed, &decompress).unwrap(), decode(&plain).unwrap());
}

#[test]
fn test_compression_never_expands() {
    let value = Value::from(7);
    let plain = encode(&value).unwrap();
    let packed = encode_with_options(&value, &EncodeOptions::new().with_compression(true)).unwrap();
    assert_eq!(packed, plain);
    assert_eq!(packed[4] & 0x01, 0);
}

#[test]
fn test_wire_flag_is_authoritative() {
    let value = Value::from("x".repeat(500));
    let packed = encode_with_options(&value, &EncodeOptions::new().with_compression(true)).unwrap();
    assert_eq!(packed[4] & 0x01, 0x01);

    let no_hint = DecodeOptions::new().with_decompress(false);
    assert_eq!(decode_with_options(&packed, &no_hint).unwrap(), value);

    let plain = encode(&value).unwrap();
    let hint = DecodeOptions::new().with_decompress(true);
    assert_eq!(decode_with_options(&plain, &hint).unwrap(), value);
}

#[test]
fn test_error_reports_offset() {
    let err = decode(b"BTN\x01\x00\x10\x01\x00\x00\x00\x7f").unwrap_err();
    let decode_err = match err {
        btoon::Error::Decode(ref e) => e.clone(),
        other => panic!("unexpected error {other:?}"),
    };
    assert_eq!(decode_err.kind, btoon::DecodeErrorKind::UnknownTag { tag: 0x7f });
    assert_eq!(decode_err.offset, 10);
}

#[test]
fn test_huge_decimal_scale_prints_compactly() {
    let mut bytes = b"BTN\x01\x00\x20\x02".to_vec();
    bytes.extend_from_slice(&1i64.to_le_bytes());
    bytes.extend_from_slice(&50_000_000i32.to_le_bytes());
    let value = decode(&bytes).unwrap();
    assert_eq!(value.as_decimal(), Some(Decimal::new(1, 50_000_000)));

    let text: String = btoon::from_value(value.clone()).unwrap();
    assert_eq!(text, "1e-50000000");
    assert_eq!(btoon::from_value::<Decimal>(value).unwrap(), Decimal::new(1, 50_000_000));
}
