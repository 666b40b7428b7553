//! The process-wide tag registry.
//!
//! Every encoded value begins with one tag byte. The byte space is partitioned
//! into ranges:
//!
//! | range | class |
//! |-------|-------|
//! | `0x00..=0x0F` | primitives |
//! | `0x10..=0x1F` | containers |
//! | `0x20..=0x3F` | extended scalars (followed by a sub-tag) |
//! | `0x40` | tabular block |
//!
//! The table is built at compile time and never changes, so lookups need no
//! synchronization. There is no runtime registration.

/// Magic bytes opening every BTOON buffer and stream.
pub const MAGIC: [u8; 3] = *b"BTN";
/// Wire format version written after the magic bytes.
pub const FORMAT_VERSION: u8 = 1;
/// The complete 4-byte header.
pub const HEADER: [u8; 4] = [MAGIC[0], MAGIC[1], MAGIC[2], FORMAT_VERSION];

/// Flag bit: the payload is zlib-compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;
/// Flag bit: the root value is a tabular block.
pub const FLAG_TABULAR: u8 = 0x02;
/// Every flag bit this version understands.
pub const FLAG_MASK: u8 = FLAG_COMPRESSED | FLAG_TABULAR;

pub const TAG_NULL: u8 = 0x00;
pub const TAG_BOOL: u8 = 0x01;
pub const TAG_INT8: u8 = 0x02;
pub const TAG_INT16: u8 = 0x03;
pub const TAG_INT32: u8 = 0x04;
pub const TAG_INT64: u8 = 0x05;
pub const TAG_FLOAT64: u8 = 0x06;
pub const TAG_STRING: u8 = 0x07;
pub const TAG_BYTES: u8 = 0x08;
pub const TAG_LIST: u8 = 0x10;
pub const TAG_MAP: u8 = 0x11;
pub const TAG_EXTENDED: u8 = 0x20;
pub const TAG_TABULAR: u8 = 0x40;

pub const SUB_TIMESTAMP: u8 = 0x01;
pub const SUB_DECIMAL: u8 = 0x02;
pub const SUB_CURRENCY: u8 = 0x03;
pub const SUB_PERCENTAGE: u8 = 0x04;

/// Which part of the tag space a tag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagClass {
    Primitive,
    Container,
    Extended,
    Tabular,
}

/// Every tag understood by this version of the format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float64,
    String,
    Bytes,
    List,
    Map,
    Extended,
    Tabular,
}

impl Tag {
    /// Returns the wire byte for this tag.
    #[inline]
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Tag::Null => TAG_NULL,
            Tag::Bool => TAG_BOOL,
            Tag::Int8 => TAG_INT8,
            Tag::Int16 => TAG_INT16,
            Tag::Int32 => TAG_INT32,
            Tag::Int64 => TAG_INT64,
            Tag::Float64 => TAG_FLOAT64,
            Tag::String => TAG_STRING,
            Tag::Bytes => TAG_BYTES,
            Tag::List => TAG_LIST,
            Tag::Map => TAG_MAP,
            Tag::Extended => TAG_EXTENDED,
            Tag::Tabular => TAG_TABULAR,
        }
    }

    /// Looks up a wire byte in the registry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use btoon::tags::Tag;
    ///
    /// assert_eq!(Tag::from_byte(0x11), Some(Tag::Map));
    /// assert_eq!(Tag::from_byte(0x21), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Tag> {
        REGISTRY[byte as usize].map(|info| info.tag)
    }

    #[must_use]
    pub fn info(self) -> &'static TagInfo {
        match &REGISTRY[self.byte() as usize] {
            Some(info) => info,
            None => unreachable!("every Tag variant is registered"),
        }
    }

    /// Smallest integer tag whose width holds `value`.
    #[inline]
    #[must_use]
    pub const fn for_int(value: i64) -> Tag {
        if value >= i8::MIN as i64 && value <= i8::MAX as i64 {
            Tag::Int8
        } else if value >= i16::MIN as i64 && value <= i16::MAX as i64 {
            Tag::Int16
        } else if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
            Tag::Int32
        } else {
            Tag::Int64
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(self, Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64)
    }
}

/// Registry entry describing how a tag is laid out on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagInfo {
    pub tag: Tag,
    pub name: &'static str,
    pub class: TagClass,
    /// Payload width in bytes after the tag, when it does not depend on the value.
    pub fixed_width: Option<usize>,
}

/// Extended-scalar sub-tags, nested under [`TAG_EXTENDED`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtendedTag {
    Timestamp,
    Decimal,
    Currency,
    Percentage,
}

impl ExtendedTag {
    #[inline]
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            ExtendedTag::Timestamp => SUB_TIMESTAMP,
            ExtendedTag::Decimal => SUB_DECIMAL,
            ExtendedTag::Currency => SUB_CURRENCY,
            ExtendedTag::Percentage => SUB_PERCENTAGE,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<ExtendedTag> {
        match byte {
            SUB_TIMESTAMP => Some(ExtendedTag::Timestamp),
            SUB_DECIMAL => Some(ExtendedTag::Decimal),
            SUB_CURRENCY => Some(ExtendedTag::Currency),
            SUB_PERCENTAGE => Some(ExtendedTag::Percentage),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ExtendedTag::Timestamp => "timestamp",
            ExtendedTag::Decimal => "decimal",
            ExtendedTag::Currency => "currency",
            ExtendedTag::Percentage => "percentage",
        }
    }
}

const fn entry(tag: Tag, name: &'static str, class: TagClass, fixed_width: Option<usize>) -> Option<TagInfo> {
    Some(TagInfo {
        tag,
        name,
        class,
        fixed_width,
    })
}

const fn build_registry() -> [Option<TagInfo>; 256] {
    let mut table: [Option<TagInfo>; 256] = [None; 256];
    table[TAG_NULL as usize] = entry(Tag::Null, "null", TagClass::Primitive, Some(0));
    table[TAG_BOOL as usize] = entry(Tag::Bool, "bool", TagClass::Primitive, Some(1));
    table[TAG_INT8 as usize] = entry(Tag::Int8, "int8", TagClass::Primitive, Some(1));
    table[TAG_INT16 as usize] = entry(Tag::Int16, "int16", TagClass::Primitive, Some(2));
    table[TAG_INT32 as usize] = entry(Tag::Int32, "int32", TagClass::Primitive, Some(4));
    table[TAG_INT64 as usize] = entry(Tag::Int64, "int64", TagClass::Primitive, Some(8));
    table[TAG_FLOAT64 as usize] = entry(Tag::Float64, "float64", TagClass::Primitive, Some(8));
    table[TAG_STRING as usize] = entry(Tag::String, "string", TagClass::Primitive, None);
    table[TAG_BYTES as usize] = entry(Tag::Bytes, "bytes", TagClass::Primitive, None);
    table[TAG_LIST as usize] = entry(Tag::List, "list", TagClass::Container, None);
    table[TAG_MAP as usize] = entry(Tag::Map, "map", TagClass::Container, None);
    table[TAG_EXTENDED as usize] = entry(Tag::Extended, "extended", TagClass::Extended, None);
    table[TAG_TABULAR as usize] = entry(Tag::Tabular, "tabular", TagClass::Tabular, None);
    table
}

/// Tag byte → descriptor. Immutable for the life of the process.
pub static REGISTRY: [Option<TagInfo>; 256] = build_registry();

/// Returns the registry entry for a wire byte.
#[inline]
#[must_use]
pub fn lookup(byte: u8) -> Option<&'static TagInfo> {
    REGISTRY[byte as usize].as_ref()
}
