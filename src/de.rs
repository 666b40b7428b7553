//! [`Value`] → host values through serde.
//!
//! [`ValueDeserializer`] drives any `Deserialize` implementation from an owned
//! value. Integers arrive as `i64`, byte buffers as `byte_buf`, enums in the
//! externally tagged layout produced by [`crate::ser::ValueSerializer`].
//! Extended scalars hand their textual form to typed targets such as
//! [`Decimal`](crate::Decimal) and appear as strings to untyped ones.

use serde::de::{self, IntoDeserializer};
use serde::forward_to_deserialize_any;

use crate::extended::tag_for_token;
use crate::{BtoonMap, Error, Result, Value};

/// Deserializer reading from an owned [`Value`].
///
/// # Examples
///
/// ```rust
/// use btoon::de::ValueDeserializer;
/// use btoon::{btoon, Decimal};
/// use serde::Deserialize;
///
/// #[derive(Deserialize, Debug, PartialEq)]
/// struct Order {
///     id: u32,
///     total: Decimal,
/// }
///
/// let value = btoon!({"id": 7, "total": "19.99"});
/// let order = Order::deserialize(ValueDeserializer::new(value)).unwrap();
/// assert_eq!(order, Order { id: 7, total: Decimal::new(1999, 2) });
/// ```
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    #[must_use]
    pub fn new(value: Value) -> Self {
        ValueDeserializer { value }
    }
}

fn unexpected(value: &Value, expected: &str) -> Error {
    Error::custom(format!("expected {}, found {}", expected, value.kind()))
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::List(items) => visitor.visit_seq(SeqDeserializer::new(items)),
            Value::Map(map) => visitor.visit_map(MapDeserializer::new(map)),
            Value::Extended(ext) => visitor.visit_string(ext.to_string()),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            value => visitor.visit_some(ValueDeserializer::new(value)),
        }
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if tag_for_token(name).is_none() {
            return visitor.visit_newtype_struct(self);
        }
        // Extended targets parse their textual form.
        let text = match self.value {
            Value::Extended(ext) => ext.to_string(),
            Value::String(s) => s,
            other => return Err(unexpected(&other, name.trim_start_matches("$btoon::"))),
        };
        visitor.visit_newtype_struct(ValueDeserializer::new(Value::String(text)))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::String(s) => visitor.visit_enum(s.into_deserializer()),
            Value::Map(map) if map.len() == 1 => {
                let mut entries = map.into_iter();
                match entries.next() {
                    Some((variant, value)) => visitor.visit_enum(EnumDeserializer::new(variant, value)),
                    None => Err(Error::custom("expected enum variant")),
                }
            }
            other => Err(unexpected(&other, "enum variant")),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer::new(self)
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl SeqDeserializer {
    fn new(vec: Vec<Value>) -> Self {
        SeqDeserializer {
            iter: vec.into_iter(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: indexmap::map::IntoIter<String, Value>,
    value: Option<Value>,
}

impl MapDeserializer {
    fn new(map: BtoonMap) -> Self {
        MapDeserializer {
            iter: map.into_iter(),
            value: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(MapKeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        match self.value.take() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)),
            None => Err(Error::custom("next_value_seed called before next_key_seed")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Map keys are always strings on the wire; integer and bool keys are parsed back.
struct MapKeyDeserializer {
    key: String,
}

macro_rules! deserialize_parsed_key {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: de::Visitor<'de>,
            {
                match self.key.parse::<$ty>() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => visitor.visit_string(self.key),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for MapKeyDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_string(self.key)
    }

    deserialize_parsed_key! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i64: i64,
        deserialize_i16 => visit_i64: i64,
        deserialize_i32 => visit_i64: i64,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u64: u64,
        deserialize_u16 => visit_u64: u64,
        deserialize_u32 => visit_u64: u64,
        deserialize_u64 => visit_u64: u64,
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.key.into_deserializer())
    }

    forward_to_deserialize_any! {
        i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct EnumDeserializer {
    variant: String,
    value: Value,
}

impl EnumDeserializer {
    fn new(variant: String, value: Value) -> Self {
        EnumDeserializer { variant, value }
    }
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: de::DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(ValueDeserializer::new(Value::String(self.variant)))?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Value,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            Value::Null => Ok(()),
            other => Err(unexpected(&other, "unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        seed.deserialize(ValueDeserializer::new(self.value))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::List(items) => visitor.visit_seq(SeqDeserializer::new(items)),
            other => Err(unexpected(&other, "tuple variant")),
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Map(map) => visitor.visit_map(MapDeserializer::new(map)),
            other => Err(unexpected(&other, "struct variant")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{btoon, Currency, Decimal, Timestamp};
    use serde::Deserialize;
    use std::collections::HashMap;

    fn from<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
        T::deserialize(ValueDeserializer::new(value))
    }

    #[derive(Deserialize, Debug, PartialEq)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect(u32, u32),
        Named { label: String },
    }

    #[test]
    fn test_enum_layouts() {
        assert_eq!(from::<Shape>(btoon!("Empty")).unwrap(), Shape::Empty);
        assert_eq!(from::<Shape>(btoon!({"Circle": 1.5})).unwrap(), Shape::Circle(1.5));
        assert_eq!(from::<Shape>(btoon!({"Rect": [2, 3]})).unwrap(), Shape::Rect(2, 3));
        assert_eq!(
            from::<Shape>(btoon!({"Named": {"label": "x"}})).unwrap(),
            Shape::Named { label: "x".into() }
        );
        assert!(from::<Shape>(btoon!({"Rect": 1, "Circle": 2})).is_err());
    }

    #[test]
    fn test_integer_map_keys() {
        let map: HashMap<u32, String> = from(btoon!({"1": "one", "2": "two"})).unwrap();
        assert_eq!(map.get(&2).map(String::as_str), Some("two"));
        assert!(from::<HashMap<u32, String>>(btoon!({"x": "one"})).is_err());
    }

    #[test]
    fn test_extended_targets() {
        let d = Decimal::new(-5, 1);
        assert_eq!(from::<Decimal>(Value::from(d)).unwrap(), d);
        assert_eq!(from::<Decimal>(btoon!("-0.5")).unwrap(), d);

        let c = Currency::new(Decimal::new(12345, 2), "EUR").unwrap();
        assert_eq!(from::<Currency>(Value::from(c)).unwrap(), c);

        let ts = Timestamp::from_nanos(86_400_000_000_000);
        assert_eq!(from::<Timestamp>(Value::from(ts)).unwrap(), ts);

        assert!(from::<Decimal>(Value::Int(3)).is_err());
        assert!(from::<Decimal>(Value::from(ts)).is_err());
    }

    #[test]
    fn test_untyped_targets_see_text() {
        let s: String = from(Value::from(Decimal::new(150, 2))).unwrap();
        assert_eq!(s, "1.50");
    }

    #[test]
    fn test_options_and_bytes() {
        assert_eq!(from::<Option<i64>>(Value::Null).unwrap(), None);
        assert_eq!(from::<Option<i64>>(Value::Int(4)).unwrap(), Some(4));
        assert_eq!(from::<Vec<u8>>(btoon!([1, 2])).unwrap(), vec![1, 2]);
        assert!(from::<u8>(Value::Int(300)).is_err());
    }
}
