//! Error types for BTOON encoding and decoding.
//!
//! Every failure is terminal for the call that raised it; the engine never
//! substitutes a default for malformed input.
//!
//! ## Error Categories
//!
//! - **Encode errors**: oversized lengths, excessive nesting, invalid extended scalars
//! - **Decode errors**: bad header, unknown tags, truncated input, malformed tables,
//!   always with the byte offset where decoding stopped
//! - **Compression errors**: corrupt compressed payloads
//! - **Unsupported types**: host values with no BTOON mapping
//! - **Stream errors**: I/O failures, cancelled reads, misuse of a closed handle
//!
//! ## Examples
//!
//! ```rust
//! use btoon::{decode, Error};
//!
//! let err = decode(b"BTN").unwrap_err();
//! assert!(err.is_truncated());
//! assert!(err.to_string().contains("offset"));
//! ```

use std::fmt;
use thiserror::Error;

/// Failures raised while writing a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// A string, byte sequence or container is longer than a `u32` length field allows.
    #[error("{what} length {len} exceeds the format maximum of {max}")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: u64,
    },

    /// Containers are nested deeper than the configured limit.
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },

    /// An extended scalar violates its invariants.
    #[error("invalid extended scalar: {0}")]
    InvalidExtended(String),
}

/// What went wrong while reading BTOON input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The buffer does not start with the BTOON magic bytes.
    BadMagic { found: [u8; 3] },
    /// The header names a format version this build cannot read.
    UnsupportedVersion { found: u8 },
    /// The flag byte has reserved bits set or contradicts the payload.
    InvalidFlags { flags: u8 },
    /// A tag byte is not in the registry.
    UnknownTag { tag: u8 },
    /// An extended-scalar sub-tag is not in the registry.
    UnknownExtended { sub_tag: u8 },
    /// The input ends (or a length field points) past the available bytes.
    Truncated { needed: usize, available: usize },
    /// A byte stream ended in the middle of a frame.
    TruncatedStream { needed: usize, available: usize },
    /// Containers are nested deeper than the configured limit.
    DepthExceeded { limit: usize },
    /// A string or map key is not valid UTF-8.
    InvalidUtf8,
    /// A boolean payload byte is neither 0 nor 1.
    InvalidBool { byte: u8 },
    /// A map repeats a key.
    DuplicateKey { key: String },
    /// An extended scalar payload violates its invariants.
    InvalidExtended(String),
    /// A tabular block is internally inconsistent.
    MalformedTable(String),
    /// Bytes remain after the root value.
    TrailingBytes { remaining: usize },
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::BadMagic { found } => {
                write!(f, "bad magic: expected \"BTN\", found {:02x?}", found)
            }
            DecodeErrorKind::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {}", found)
            }
            DecodeErrorKind::InvalidFlags { flags } => write!(f, "invalid flag byte 0x{:02x}", flags),
            DecodeErrorKind::UnknownTag { tag } => write!(f, "unknown tag 0x{:02x}", tag),
            DecodeErrorKind::UnknownExtended { sub_tag } => {
                write!(f, "unknown extended sub-tag 0x{:02x}", sub_tag)
            }
            DecodeErrorKind::Truncated { needed, available } => write!(
                f,
                "truncated input: expected {} more bytes, found {}",
                needed, available
            ),
            DecodeErrorKind::TruncatedStream { needed, available } => write!(
                f,
                "truncated stream: frame needs {} bytes, stream ended after {}",
                needed, available
            ),
            DecodeErrorKind::DepthExceeded { limit } => {
                write!(f, "nesting depth exceeds the limit of {}", limit)
            }
            DecodeErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8 in string"),
            DecodeErrorKind::InvalidBool { byte } => {
                write!(f, "invalid bool byte 0x{:02x}, expected 0x00 or 0x01", byte)
            }
            DecodeErrorKind::DuplicateKey { key } => write!(f, "duplicate map key {:?}", key),
            DecodeErrorKind::InvalidExtended(msg) => write!(f, "invalid extended scalar: {}", msg),
            DecodeErrorKind::MalformedTable(msg) => write!(f, "malformed tabular block: {}", msg),
            DecodeErrorKind::TrailingBytes { remaining } => {
                write!(f, "{} trailing bytes after the root value", remaining)
            }
        }
    }
}

/// A decode failure together with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte offset {offset}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        DecodeError { kind, offset }
    }
}

/// Represents every error the BTOON engine can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Writing a value failed.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Reading a value failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A compressed payload could not be inflated.
    #[error("compression error: {0}")]
    Compression(String),

    /// A host value has no BTOON representation.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The underlying sink or source failed.
    #[error("IO error: {0}")]
    Io(String),

    /// A pending stream read was cancelled by the caller.
    #[error("stream read cancelled")]
    Cancelled,

    /// A stream handle was used after it was closed.
    #[error("invalid stream state: {0}")]
    InvalidState(String),

    /// Custom error raised through serde.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Creates a decode error of the given kind at `offset`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use btoon::{DecodeErrorKind, Error};
    ///
    /// let err = Error::decode(DecodeErrorKind::UnknownTag { tag: 0x7f }, 5);
    /// assert_eq!(err.to_string(), "decode error: unknown tag 0x7f at byte offset 5");
    /// ```
    pub fn decode(kind: DecodeErrorKind, offset: usize) -> Self {
        Error::Decode(DecodeError::new(kind, offset))
    }

    pub fn unsupported_type(msg: &str) -> Self {
        Error::UnsupportedType(msg.to_string())
    }

    pub fn compression(msg: &str) -> Self {
        Error::Compression(msg.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns the decode error kind, if this is a decode error.
    #[must_use]
    pub fn decode_kind(&self) -> Option<&DecodeErrorKind> {
        match self {
            Error::Decode(err) => Some(&err.kind),
            _ => None,
        }
    }

    /// Returns `true` for truncated buffers and streams.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(
            self.decode_kind(),
            Some(DecodeErrorKind::Truncated { .. }) | Some(DecodeErrorKind::TruncatedStream { .. })
        )
    }

    /// Returns `true` when either side hit the nesting limit.
    #[must_use]
    pub fn is_depth_exceeded(&self) -> bool {
        matches!(
            self,
            Error::Encode(EncodeError::DepthExceeded { .. })
                | Error::Decode(DecodeError {
                    kind: DecodeErrorKind::DepthExceeded { .. },
                    ..
                })
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
