//! BTOON wire format.
//!
//! This module only documents the byte layout written by [`crate::encode`] and
//! [`crate::StreamWriter`]. All multi-byte integers are little-endian.
//!
//! # Buffer
//!
//! ```text
//! "BTN" 0x01 | flags | body
//! "BTN" 0x01 | flags | orig_len:u32 | comp_len:u32 | zlib(body)   (flags & 0x01)
//! ```
//!
//! | Flag | Meaning |
//! |------|---------|
//! | `0x01` | body is zlib-compressed |
//! | `0x02` | root value is a tabular block |
//!
//! Any other flag bit is rejected. Compression is only applied when the
//! compressed form, including the two length fields, is strictly smaller than
//! the plain body.
//!
//! # Values
//!
//! Every value starts with a one-byte tag.
//!
//! | Tag | Type | Payload |
//! |-----|------|---------|
//! | `0x00` | null | none |
//! | `0x01` | bool | `u8` 0 or 1 |
//! | `0x02` | int | `i8` |
//! | `0x03` | int | `i16` |
//! | `0x04` | int | `i32` |
//! | `0x05` | int | `i64` |
//! | `0x06` | float | `f64` |
//! | `0x07` | string | `u32` length, UTF-8 bytes |
//! | `0x08` | bytes | `u32` length, raw bytes |
//! | `0x10` | list | `u32` count, tagged values |
//! | `0x11` | map | `u32` count, then per entry `u32` key length, key, tagged value |
//! | `0x20` | extended | sub-tag, payload |
//! | `0x40` | tabular | see below |
//!
//! Integers always use the narrowest width that holds the value. Map entries
//! keep their insertion order and keys must be unique.
//!
//! ## Extended scalars
//!
//! | Sub-tag | Type | Payload |
//! |---------|------|---------|
//! | `0x01` | timestamp | `i64` nanoseconds since the Unix epoch, `u8` has-offset, optional `i16` offset minutes |
//! | `0x02` | decimal | `i64` unscaled, `i32` scale |
//! | `0x03` | currency | decimal payload, 3 ASCII code bytes |
//! | `0x04` | percentage | decimal payload (the ratio) |
//!
//! # Tabular blocks
//!
//! A list of at least two maps sharing the same keys in the same order, where
//! each key holds one scalar type (or null), is written column by column:
//!
//! ```text
//! 0x40 | ncols:u32 | nrows:u32
//! ncols x ( name_len:u32 | name | kind tag [| sub-tag] | col_flags:u8 )
//! ncols x ( [presence bitmap] | payloads of present cells )
//! ```
//!
//! - `col_flags` bit 0 set means the column has a presence bitmap of
//!   `ceil(nrows / 8)` bytes, least significant bit first, a set bit marking a
//!   present cell. Unused trailing bits must be zero.
//! - Cells are written without their tag. An integer column uses one width for
//!   every cell: the widest any of its values needs.
//! - A column where every cell is null has kind `0x00`, no bitmap and no payload.
//!
//! A tabular block decodes to the list of maps it was built from.
//!
//! # Streams
//!
//! ```text
//! "BTN" 0x01 | frame*
//! frame = payload_len:u32 | flags | payload
//! ```
//!
//! A frame payload is a body as above. When the frame's compressed flag is set
//! the payload is `orig_len:u32` followed by the zlib data. A stream may end
//! only on a frame boundary.
//!
//! # Limits
//!
//! Nesting depth counts the root container as level 1; a tabular block counts
//! as two levels (its list and its rows). The default limit is 128.
