//! # btoon
//!
//! An encoder/decoder for BTOON, the Binary Tree Object Notation: a compact,
//! self-describing binary format for tree-shaped data.
//!
//! ## Key Features
//!
//! - **Tagged binary codec**: every value starts with a one-byte tag; integers
//!   use the narrowest little-endian width that holds them
//! - **Tabular blocks**: lists of uniform maps are written column by column and
//!   come back as the exact same list of maps
//! - **Extended scalars**: timestamps with offsets, exact decimals, currency
//!   amounts and percentages survive a round trip bit for bit
//! - **Optional compression**: zlib, used only when it actually shrinks the payload
//! - **Streaming**: length-prefixed frames over `std::io` (and tokio with the
//!   `async` feature), with cancellable reads
//! - **Serde compatible**: `to_vec`/`from_slice` work with any
//!   `#[derive(Serialize, Deserialize)]` type
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use btoon::{from_slice, to_vec};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u32,
//!     name: String,
//!     active: bool,
//! }
//!
//! let user = User { id: 123, name: "Alice".to_string(), active: true };
//!
//! let bytes = to_vec(&user).unwrap();
//! assert_eq!(&bytes[..4], b"BTN\x01");
//!
//! let back: User = from_slice(&bytes).unwrap();
//! assert_eq!(user, back);
//! ```
//!
//! ### Working with values directly
//!
//! ```rust
//! use btoon::{btoon, decode, encode, Value};
//!
//! let rows = btoon!([
//!     {"id": 1, "name": "Widget", "price": 9.99},
//!     {"id": 2, "name": "Gadget", "price": 14.99}
//! ]);
//!
//! let bytes = encode(&rows).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), rows);
//! ```
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code
//! - Every length field is checked against the remaining input before anything
//!   is allocated
//! - Nesting is bounded on both sides (128 levels by default)
//! - Decoding never panics on malformed input; it returns an error with the
//!   byte offset where it stopped
//!
//! ## Wire Format
//!
//! See the [`format`] module for the byte layout.
//!
//! ## Examples
//!
//! The `demos/` directory has runnable programs:
//!
//! - **`simple.rs`** - encode and decode a struct
//! - **`tabular.rs`** - columnar blocks and the typed column view
//! - **`streaming.rs`** - framed streams over a file
//! - **`extended_types.rs`** - timestamps, decimals, currency and percentages
//!
//! Run any of them with: `cargo run --example <name>`

pub mod codec;
pub mod compression;
pub mod de;
pub mod error;
pub mod extended;
pub mod format;
pub mod macros;
pub mod map;
pub mod options;
pub mod ser;
pub mod stream;
pub mod tabular;
pub mod tags;
pub mod value;

#[cfg(feature = "async")]
pub mod async_stream;

pub use de::ValueDeserializer;
pub use error::{DecodeError, DecodeErrorKind, EncodeError, Error, Result};
pub use extended::{Currency, Decimal, ExtendedScalar, Percentage, Timestamp};
pub use map::BtoonMap;
pub use options::{DecodeOptions, EncodeOptions};
pub use ser::ValueSerializer;
pub use stream::{CancelHandle, StreamReader, StreamState, StreamWriter};
pub use tabular::TabularBlock;
pub use value::{Value, ValueKind};

use serde::{de::DeserializeOwned, Serialize};
use std::io;
use tracing::debug;

/// Encodes a value with the default options.
///
/// # Examples
///
/// ```rust
/// use btoon::{encode, Value};
///
/// let bytes = encode(&Value::from(true)).unwrap();
/// assert_eq!(bytes, b"BTN\x01\x00\x01\x01");
/// ```
///
/// # Errors
///
/// Fails if a length does not fit the format or nesting exceeds the default limit.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with_options(value, &EncodeOptions::default())
}

/// Encodes a value with custom options.
///
/// # Errors
///
/// Fails if a length does not fit the format, nesting exceeds `max_depth`, or
/// compression fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode_with_options(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    let bytes = codec::encode(value, options)?;
    debug!(
        kind = %value.kind(),
        len = bytes.len(),
        compressed = bytes.get(codec::PREAMBLE_LEN - 1).is_some_and(|f| f & tags::FLAG_COMPRESSED != 0),
        "encoded value"
    );
    Ok(bytes)
}

/// Decodes a buffer produced by [`encode`].
///
/// # Examples
///
/// ```rust
/// use btoon::{decode, Value};
///
/// assert_eq!(decode(b"BTN\x01\x00\x02\x2a").unwrap(), Value::from(42));
/// assert!(decode(b"BTN\x01\x00\x02").unwrap_err().is_truncated());
/// ```
///
/// # Errors
///
/// Fails on a bad header, unknown tags, truncated or trailing input, malformed
/// tabular blocks, invalid UTF-8, duplicate map keys, or excessive nesting.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn decode(bytes: &[u8]) -> Result<Value> {
    decode_with_options(bytes, &DecodeOptions::default())
}

/// Decodes a buffer with custom options.
///
/// # Errors
///
/// See [`decode`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn decode_with_options(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
    let value = codec::decode(bytes, options)?;
    debug!(kind = %value.kind(), len = bytes.len(), "decoded value");
    Ok(value)
}

/// Converts any `T: Serialize` into a [`Value`].
///
/// # Examples
///
/// ```rust
/// use btoon::{to_value, Value};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Point { x: i32, y: i32 }
///
/// let value = to_value(&Point { x: 1, y: 2 }).unwrap();
/// assert_eq!(value.get("y"), Some(&Value::from(2)));
/// ```
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] for values BTOON cannot represent, such
/// as `u64` above `i64::MAX` or 128-bit integers.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: ?Sized + Serialize,
{
    value.serialize(ValueSerializer)
}

/// Converts a [`Value`] into any `T: Deserialize`.
///
/// # Examples
///
/// ```rust
/// use btoon::{btoon, from_value};
/// use serde::Deserialize;
///
/// #[derive(Deserialize, PartialEq, Debug)]
/// struct Point { x: i32, y: i32 }
///
/// let point: Point = from_value(btoon!({"x": 1, "y": 2})).unwrap();
/// assert_eq!(point, Point { x: 1, y: 2 });
/// ```
///
/// # Errors
///
/// Fails if the value's shape does not match `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_value<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(value))
}

/// Serializes any `T: Serialize` into a BTOON buffer.
///
/// # Errors
///
/// Fails if `T` has no BTOON representation or encoding fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    to_vec_with_options(value, &EncodeOptions::default())
}

/// Serializes any `T: Serialize` into a BTOON buffer with custom options.
///
/// # Examples
///
/// ```rust
/// use btoon::{from_slice, to_vec_with_options, EncodeOptions};
///
/// let data = vec!["repeat me"; 200];
/// let options = EncodeOptions::new().with_compression(true);
/// let bytes = to_vec_with_options(&data, &options).unwrap();
/// assert!(bytes.len() < 200);
///
/// let back: Vec<String> = from_slice(&bytes).unwrap();
/// assert_eq!(back.len(), 200);
/// ```
///
/// # Errors
///
/// Fails if `T` has no BTOON representation or encoding fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec_with_options<T>(value: &T, options: &EncodeOptions) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    encode_with_options(&to_value(value)?, options)
}

/// Serializes any `T: Serialize` into a writer as one BTOON buffer.
///
/// # Examples
///
/// ```rust
/// use btoon::to_writer;
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &[1, 2, 3]).unwrap();
/// assert_eq!(&buffer[..3], b"BTN");
/// ```
///
/// # Errors
///
/// Fails if serialization fails or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, T>(mut writer: W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    let bytes = to_vec(value)?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Deserializes an instance of `T` from a BTOON buffer.
///
/// # Errors
///
/// Fails if the buffer does not decode or its value does not match `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    from_value(decode(bytes)?)
}

/// Deserializes an instance of `T` from a reader holding one BTOON buffer.
///
/// The reader is consumed to its end; use [`StreamReader`] for multiple values.
///
/// # Examples
///
/// ```rust
/// use btoon::{from_reader, to_vec};
/// use std::io::Cursor;
///
/// let bytes = to_vec(&("a", 1)).unwrap();
/// let back: (String, i64) = from_reader(Cursor::new(bytes)).unwrap();
/// assert_eq!(back, ("a".to_string(), 1));
/// ```
///
/// # Errors
///
/// Fails if reading fails, the bytes do not decode, or the value does not match `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R, T>(mut reader: R) -> Result<T>
where
    R: io::Read,
    T: DeserializeOwned,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        id: u32,
        name: String,
        active: bool,
        tags: Vec<String>,
        balance: Decimal,
    }

    #[test]
    fn test_struct_roundtrip() {
        let user = User {
            id: 1,
            name: "Alice".to_string(),
            active: true,
            tags: vec!["admin".to_string(), "ops".to_string()],
            balance: Decimal::new(-1050, 2),
        };
        let bytes = to_vec(&user).unwrap();
        let back: User = from_slice(&bytes).unwrap();
        assert_eq!(user, back);
    }

    #[test]
    fn test_struct_list_is_tabular() {
        let points = vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }];
        let bytes = to_vec(&points).unwrap();
        assert_eq!(bytes[4], tags::FLAG_TABULAR);
        let back: Vec<Point> = from_slice(&bytes).unwrap();
        assert_eq!(back, points);
    }

    #[test]
    fn test_writer_and_reader() {
        let mut buffer = Vec::new();
        to_writer(&mut buffer, &Point { x: -5, y: 9 }).unwrap();
        let back: Point = from_reader(buffer.as_slice()).unwrap();
        assert_eq!(back, Point { x: -5, y: 9 });
    }

    #[test]
    fn test_unsupported_host_value() {
        assert!(matches!(to_vec(&u64::MAX), Err(Error::UnsupportedType(_))));
    }

    #[test]
    fn test_shape_mismatch() {
        let bytes = to_vec(&"not a point").unwrap();
        assert!(from_slice::<Point>(&bytes).is_err());
    }
}
