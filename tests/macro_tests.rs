use btoon::{btoon, encode, BtoonMap, Decimal, Value};

#[test]
fn test_btoon_macro_null() {
    assert_eq!(btoon!(null), Value::Null);
}

#[test]
fn test_btoon_macro_numbers() {
    assert_eq!(btoon!(42), Value::Int(42));
    assert_eq!(btoon!(-123), Value::Int(-123));
    assert_eq!(btoon!(3.5), Value::Float(3.5));
}

#[test]
fn test_btoon_macro_lists() {
    assert_eq!(btoon!([]), Value::List(vec![]));
    assert_eq!(
        btoon!([1, "two", null, [true]]),
        Value::List(vec![
            Value::Int(1),
            Value::String("two".to_string()),
            Value::Null,
            Value::List(vec![Value::Bool(true)]),
        ])
    );
}

#[test]
fn test_btoon_macro_maps_keep_order() {
    let value = btoon!({"b": 1, "a": {"inner": []}});
    let mut inner = BtoonMap::new();
    inner.insert("inner".to_string(), Value::List(vec![]));
    let mut expected = BtoonMap::new();
    expected.insert("b".to_string(), Value::Int(1));
    expected.insert("a".to_string(), Value::Map(inner));
    assert_eq!(value, Value::Map(expected));
}

#[test]
fn test_btoon_macro_embeds_expressions() {
    let price = Decimal::new(250, 2);
    let name = String::from("tea");
    let value = btoon!({"name": name, "price": price});
    assert_eq!(value.get("price").and_then(Value::as_decimal), Some(price));
    assert_eq!(value.get("name").and_then(Value::as_str), Some("tea"));
}

#[test]
fn test_btoon_macro_unrepresentable_becomes_null() {
    let too_big = u64::MAX;
    assert_eq!(btoon!(too_big), Value::Null);
}

#[test]
fn test_btoon_macro_output_encodes() {
    let value = btoon!([{"x": 1, "y": 2}, {"x": 3, "y": 4}]);
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..4], b"BTN\x01");
}
