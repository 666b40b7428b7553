//! The binary codec and the buffer envelope around it.
//!
//! A whole-buffer encoding is laid out as
//!
//! ```text
//! "BTN" 0x01 | flags | body
//! "BTN" 0x01 | flags | original_len:u32 | compressed_len:u32 | zlib(body)   (FLAG_COMPRESSED)
//! ```
//!
//! where `body` is the tagged root value written by [`Encoder`]. Stream frames
//! reuse the same flag byte and body, see [`crate::stream`].

pub mod decoder;
pub mod encoder;

pub use decoder::{read_value, Decoder};
pub use encoder::{write_value, Encoder};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::compression::{self, Packed};
use crate::error::{DecodeErrorKind, EncodeError};
use crate::tags::{ExtendedTag, FLAG_COMPRESSED, FLAG_MASK, FLAG_TABULAR, FORMAT_VERSION, HEADER, MAGIC, TAG_TABULAR};
use crate::{DecodeOptions, EncodeOptions, Error, Result, Value, ValueKind};

/// Header plus the flag byte.
pub(crate) const PREAMBLE_LEN: usize = HEADER.len() + 1;
/// `original_len` and `compressed_len` in front of a compressed buffer body.
const COMPRESSED_BUFFER_OVERHEAD: usize = 8;
/// `original_len` in front of a compressed frame body.
pub(crate) const COMPRESSED_FRAME_OVERHEAD: usize = 4;

pub(crate) fn extended_tag_for(kind: ValueKind) -> Option<ExtendedTag> {
    match kind {
        ValueKind::Timestamp => Some(ExtendedTag::Timestamp),
        ValueKind::Decimal => Some(ExtendedTag::Decimal),
        ValueKind::Currency => Some(ExtendedTag::Currency),
        ValueKind::Percentage => Some(ExtendedTag::Percentage),
        _ => None,
    }
}

pub(crate) fn kind_for_extended(tag: ExtendedTag) -> ValueKind {
    match tag {
        ExtendedTag::Timestamp => ValueKind::Timestamp,
        ExtendedTag::Decimal => ValueKind::Decimal,
        ExtendedTag::Currency => ValueKind::Currency,
        ExtendedTag::Percentage => ValueKind::Percentage,
    }
}

/// An encoded body, possibly compressed, with the flag byte that describes it.
pub(crate) struct Payload {
    pub flags: u8,
    pub original_len: usize,
    pub bytes: Vec<u8>,
}

impl Payload {
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Encodes `value` and compresses the body when asked to and when that pays off.
pub(crate) fn encode_payload(value: &Value, options: &EncodeOptions, overhead: usize) -> Result<Payload> {
    let mut encoder = Encoder::new(options);
    encoder.write_value(value)?;
    let body = encoder.into_inner();

    let mut flags = 0;
    if body.first() == Some(&TAG_TABULAR) {
        flags |= FLAG_TABULAR;
    }

    if options.compress && u32::try_from(body.len()).is_ok() {
        if let Packed::Compressed(bytes) = compression::pack(&body, options.compression_level, overhead)? {
            return Ok(Payload {
                flags: flags | FLAG_COMPRESSED,
                original_len: body.len(),
                bytes,
            });
        }
    }

    Ok(Payload {
        flags,
        original_len: body.len(),
        bytes: body,
    })
}

pub(crate) fn checked_u32(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        EncodeError::LengthOverflow {
            what,
            len,
            max: u32::MAX as u64,
        }
        .into()
    })
}

/// Encodes a complete buffer: header, flag byte and body.
pub fn encode(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    let payload = encode_payload(value, options, COMPRESSED_BUFFER_OVERHEAD)?;

    let mut out = Vec::with_capacity(PREAMBLE_LEN + COMPRESSED_BUFFER_OVERHEAD + payload.bytes.len());
    out.extend_from_slice(&HEADER);
    out.push(payload.flags);
    if payload.is_compressed() {
        out.write_u32::<LittleEndian>(checked_u32("payload", payload.original_len)?)?;
        out.write_u32::<LittleEndian>(checked_u32("compressed payload", payload.bytes.len())?)?;
    }
    out.extend_from_slice(&payload.bytes);
    Ok(out)
}

/// Validates as much of the 4-byte header as `prefix` holds.
///
/// A prefix that matches so far but is too short fails as truncated.
pub(crate) fn check_header(prefix: &[u8]) -> Result<()> {
    let magic_len = prefix.len().min(MAGIC.len());
    if prefix[..magic_len] != MAGIC[..magic_len] {
        let mut found = [0u8; 3];
        found[..magic_len].copy_from_slice(&prefix[..magic_len]);
        return Err(Error::decode(DecodeErrorKind::BadMagic { found }, 0));
    }
    if prefix.len() < HEADER.len() {
        return Err(Error::decode(
            DecodeErrorKind::Truncated {
                needed: HEADER.len() - prefix.len(),
                available: 0,
            },
            prefix.len(),
        ));
    }
    if prefix[3] != FORMAT_VERSION {
        return Err(Error::decode(
            DecodeErrorKind::UnsupportedVersion { found: prefix[3] },
            3,
        ));
    }
    Ok(())
}

pub(crate) fn check_flags(flags: u8, offset: usize) -> Result<()> {
    if flags & !FLAG_MASK != 0 {
        return Err(Error::decode(DecodeErrorKind::InvalidFlags { flags }, offset));
    }
    Ok(())
}

/// Decodes a complete body and requires that nothing follows the root value.
///
/// The tabular flag must agree with the root tag.
pub(crate) fn decode_body(body: &[u8], base_offset: usize, flags: u8, flag_offset: usize, max_depth: usize) -> Result<Value> {
    let root_is_tabular = body.first() == Some(&TAG_TABULAR);
    if (flags & FLAG_TABULAR != 0) != root_is_tabular && !body.is_empty() {
        return Err(Error::decode(DecodeErrorKind::InvalidFlags { flags }, flag_offset));
    }

    let mut decoder = Decoder::new(body, max_depth).with_base_offset(base_offset);
    let value = decoder.read_value()?;
    decoder.finish()?;
    Ok(value)
}

/// Reads `original_len:u32` followed by a zlib stream that fills the rest of `data`.
pub(crate) fn inflate_frame(data: &[u8], base_offset: usize) -> Result<Vec<u8>> {
    if data.len() < COMPRESSED_FRAME_OVERHEAD {
        return Err(Error::decode(
            DecodeErrorKind::Truncated {
                needed: COMPRESSED_FRAME_OVERHEAD,
                available: data.len(),
            },
            base_offset,
        ));
    }
    let original_len = LittleEndian::read_u32(&data[..4]) as usize;
    compression::decompress(&data[4..], original_len)
}

/// Decodes a complete buffer produced by [`encode`].
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
    check_header(bytes)?;
    let flags_offset = HEADER.len();
    let flags = *bytes.get(flags_offset).ok_or_else(|| {
        Error::decode(
            DecodeErrorKind::Truncated {
                needed: 1,
                available: 0,
            },
            flags_offset,
        )
    })?;
    check_flags(flags, flags_offset)?;

    let rest = &bytes[PREAMBLE_LEN..];
    if flags & FLAG_COMPRESSED == 0 {
        if options.decompress {
            debug!("decompression requested but payload is stored uncompressed");
        }
        return decode_body(rest, PREAMBLE_LEN, flags, flags_offset, options.max_depth);
    }

    if rest.len() < COMPRESSED_BUFFER_OVERHEAD {
        return Err(Error::decode(
            DecodeErrorKind::Truncated {
                needed: COMPRESSED_BUFFER_OVERHEAD,
                available: rest.len(),
            },
            PREAMBLE_LEN,
        ));
    }
    let original_len = LittleEndian::read_u32(&rest[0..4]) as usize;
    let compressed_len = LittleEndian::read_u32(&rest[4..8]) as usize;
    let data_offset = PREAMBLE_LEN + COMPRESSED_BUFFER_OVERHEAD;
    let data = &rest[COMPRESSED_BUFFER_OVERHEAD..];
    if compressed_len > data.len() {
        return Err(Error::decode(
            DecodeErrorKind::Truncated {
                needed: compressed_len,
                available: data.len(),
            },
            data_offset,
        ));
    }
    if compressed_len < data.len() {
        return Err(Error::decode(
            DecodeErrorKind::TrailingBytes {
                remaining: data.len() - compressed_len,
            },
            data_offset + compressed_len,
        ));
    }

    let body = compression::decompress(data, original_len)?;
    debug!(compressed = compressed_len, original = original_len, "inflated payload");
    // Offsets inside an inflated body are relative to the body itself.
    decode_body(&body, 0, flags, flags_offset, options.max_depth)
}
