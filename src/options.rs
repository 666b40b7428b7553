//! Configuration options for BTOON encoding and decoding.
//!
//! - [`EncodeOptions`]: compression, auto-tabular detection and nesting limits
//! - [`DecodeOptions`]: nesting limits and the advisory `decompress` hint
//!
//! ## Examples
//!
//! ```rust
//! use btoon::{decode_with_options, encode_with_options, DecodeOptions, EncodeOptions, Value};
//!
//! let value = Value::from(vec![Value::from("x"); 64]);
//!
//! let options = EncodeOptions::new().with_compression(true).with_auto_tabular(false);
//! let bytes = encode_with_options(&value, &options).unwrap();
//!
//! let back = decode_with_options(&bytes, &DecodeOptions::new().with_decompress(true)).unwrap();
//! assert_eq!(back, value);
//! ```

/// Default nesting limit for containers on both the encode and decode side.
pub const DEFAULT_MAX_DEPTH: usize = 128;
/// Default minimum number of rows before a list of maps becomes a tabular block.
pub const DEFAULT_MIN_TABULAR_ROWS: usize = 2;
/// Default zlib compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Configuration for encoding.
///
/// # Examples
///
/// ```rust
/// use btoon::EncodeOptions;
///
/// let options = EncodeOptions::new();
/// assert!(!options.compress);
/// assert!(options.auto_tabular);
///
/// let options = EncodeOptions::new()
///     .with_compression(true)
///     .with_compression_level(9)
///     .with_min_tabular_rows(3)
///     .with_max_depth(32);
/// assert_eq!(options.min_tabular_rows, 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOptions {
    /// Try to compress the payload. Stored uncompressed when that would not shrink it.
    pub compress: bool,
    /// Rewrite eligible lists of maps into tabular blocks.
    pub auto_tabular: bool,
    pub min_tabular_rows: usize,
    pub max_depth: usize,
    /// zlib level, 0 (store) to 9 (best).
    pub compression_level: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            compress: false,
            auto_tabular: true,
            min_tabular_rows: DEFAULT_MIN_TABULAR_ROWS,
            max_depth: DEFAULT_MAX_DEPTH,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl EncodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Enables or disables the tabular analyzer. Disabled means pure row-major output.
    #[must_use]
    pub fn with_auto_tabular(mut self, auto_tabular: bool) -> Self {
        self.auto_tabular = auto_tabular;
        self
    }

    /// Sets the minimum row count for tabular blocks. Values below 2 are raised to 2.
    #[must_use]
    pub fn with_min_tabular_rows(mut self, rows: usize) -> Self {
        self.min_tabular_rows = rows.max(DEFAULT_MIN_TABULAR_ROWS);
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the zlib level; clamped to 9.
    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// Configuration for decoding.
///
/// `decompress` is a hint only: whether a payload is inflated is decided by the
/// flag byte on the wire, never by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    pub decompress: bool,
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            decompress: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_rows_floor() {
        assert_eq!(EncodeOptions::new().with_min_tabular_rows(0).min_tabular_rows, 2);
        assert_eq!(EncodeOptions::new().with_min_tabular_rows(10).min_tabular_rows, 10);
    }

    #[test]
    fn test_compression_level_clamped() {
        assert_eq!(EncodeOptions::new().with_compression_level(42).compression_level, 9);
    }
}
