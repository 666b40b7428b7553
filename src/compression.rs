//! zlib compression around encoded payloads.
//!
//! Compression is always attempted when requested, but a payload is only
//! stored compressed when that actually makes it smaller; otherwise the caller
//! stores the original bytes and leaves the compressed flag clear.
//!
//! Decompression is bounded by the original length recorded next to the
//! compressed bytes, so a corrupt or hostile payload cannot inflate without
//! limit.

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::debug;

/// Largest up-front allocation made on the strength of a declared length.
const MAX_PREALLOC: usize = 1 << 20;

/// Outcome of [`pack`].
#[derive(Debug, Clone, PartialEq)]
pub enum Packed {
    /// The zlib stream, strictly smaller than the input plus overhead.
    Compressed(Vec<u8>),
    /// Compression did not pay off; store the input as is.
    Stored,
}

/// Compresses `data` with zlib at `level` (0-9).
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates a zlib stream that must produce exactly `expected_len` bytes and
/// consume all of `data`.
///
/// # Examples
///
/// ```rust
/// use btoon::compression::{compress, decompress};
///
/// let data = b"abcabcabcabcabcabc".repeat(10);
/// let packed = compress(&data, 6).unwrap();
/// assert_eq!(decompress(&packed, data.len()).unwrap(), data);
/// assert!(decompress(&packed, data.len() - 1).is_err());
/// ```
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len.min(MAX_PREALLOC));
    (&mut decoder)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(format!("corrupt zlib payload: {}", e)))?;

    if out.len() != expected_len {
        return Err(Error::Compression(format!(
            "inflated {} bytes, header declared {}",
            out.len(),
            expected_len
        )));
    }
    if decoder.total_in() != data.len() as u64 {
        return Err(Error::Compression(format!(
            "{} bytes left after the zlib stream",
            data.len() as u64 - decoder.total_in()
        )));
    }
    Ok(out)
}

/// Compresses `data` and keeps the result only if it is smaller than the
/// input once `overhead` bytes of framing are added.
pub fn pack(data: &[u8], level: u32, overhead: usize) -> Result<Packed> {
    let compressed = compress(data, level)?;
    if compressed.len() + overhead < data.len() {
        debug!(
            original = data.len(),
            compressed = compressed.len(),
            "payload compressed"
        );
        Ok(Packed::Compressed(compressed))
    } else {
        debug!(
            original = data.len(),
            compressed = compressed.len(),
            "compression would not shrink payload, storing uncompressed"
        );
        Ok(Packed::Stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_large() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 7) as u8).collect();
        let packed = compress(&data, 6).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_pack_refuses_expansion() {
        let tiny = b"abc";
        assert_eq!(pack(tiny, 6, 4).unwrap(), Packed::Stored);

        let repetitive = vec![b'z'; 1000];
        assert!(matches!(pack(&repetitive, 6, 4).unwrap(), Packed::Compressed(_)));
    }

    #[test]
    fn test_decompress_invalid_data() {
        let bad = vec![0u8; 10];
        assert!(matches!(decompress(&bad, 10), Err(Error::Compression(_))));
    }

    #[test]
    fn test_decompress_rejects_trailing_bytes() {
        let data = vec![b'q'; 256];
        let mut packed = compress(&data, 6).unwrap();
        packed.push(0);
        assert!(matches!(decompress(&packed, data.len()), Err(Error::Compression(_))));
    }

    #[test]
    fn test_decompress_is_bounded() {
        let data = vec![0u8; 100_000];
        let packed = compress(&data, 9).unwrap();
        assert!(matches!(decompress(&packed, 10), Err(Error::Compression(_))));
    }
}
