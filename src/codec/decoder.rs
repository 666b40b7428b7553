//! Bytes → value.
//!
//! A single forward pass over a borrowed slice. Every read is bounds-checked
//! against the remaining input before anything is allocated, and every error
//! carries the absolute offset where it was detected.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeErrorKind;
use crate::extended::{Currency, Decimal, ExtendedScalar, Percentage, Timestamp};
use crate::options::DEFAULT_MAX_DEPTH;
use crate::tabular::{Column, ColumnData, TabularBlock};
use crate::tags::{ExtendedTag, Tag};
use crate::{BtoonMap, Error, Result, Value, ValueKind};

/// Smallest encoding of a map entry: a 4-byte key length and a tag.
const MIN_MAP_ENTRY: usize = 5;

/// How the cells of one tabular column are laid out.
#[derive(Clone, Copy, Debug, PartialEq)]
enum CellLayout {
    Null,
    Bool,
    Int(Tag),
    Float,
    String,
    Bytes,
    Extended(ExtendedTag),
}

impl CellLayout {
    fn kind(self) -> ValueKind {
        match self {
            CellLayout::Null => ValueKind::Null,
            CellLayout::Bool => ValueKind::Bool,
            CellLayout::Int(_) => ValueKind::Int,
            CellLayout::Float => ValueKind::Float,
            CellLayout::String => ValueKind::String,
            CellLayout::Bytes => ValueKind::Bytes,
            CellLayout::Extended(sub) => super::kind_for_extended(sub),
        }
    }
}

/// Cursor over an encoded value body.
///
/// # Examples
///
/// ```rust
/// use btoon::codec::Decoder;
/// use btoon::Value;
///
/// let mut decoder = Decoder::new(&[0x02, 0x07, 0x00], 128);
/// assert_eq!(decoder.read_value().unwrap(), Value::from(7));
/// assert_eq!(decoder.read_value().unwrap(), Value::Null);
/// assert!(decoder.is_at_end());
/// ```
pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
    base_offset: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Decoder<'a> {
    #[must_use]
    pub fn new(input: &'a [u8], max_depth: usize) -> Self {
        Decoder {
            input,
            position: 0,
            base_offset: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Reports error offsets relative to an enclosing buffer that `input` starts at.
    #[must_use]
    pub fn with_base_offset(mut self, base_offset: usize) -> Self {
        self.base_offset = base_offset;
        self
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len() - self.position
    }

    #[inline]
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.position == self.input.len()
    }

    /// Fails with `TrailingBytes` unless the whole input was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(DecodeErrorKind::TrailingBytes {
                remaining: self.remaining(),
            }))
        }
    }

    pub fn read_value(&mut self) -> Result<Value> {
        let tag_offset = self.position;
        let byte = self.read_u8()?;
        let tag = Tag::from_byte(byte)
            .ok_or_else(|| self.error_at(DecodeErrorKind::UnknownTag { tag: byte }, tag_offset))?;

        match tag {
            Tag::Null => Ok(Value::Null),
            Tag::Bool => self.read_bool().map(Value::Bool),
            Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64 => self.read_int(tag).map(Value::Int),
            Tag::Float64 => self.read_f64().map(Value::Float),
            Tag::String => self.read_string().map(Value::String),
            Tag::Bytes => self.read_blob().map(|b| Value::Bytes(b.to_vec())),
            Tag::List => self.read_list(),
            Tag::Map => self.read_map(),
            Tag::Extended => {
                let sub = self.read_extended_tag()?;
                self.read_extended(sub).map(Value::Extended)
            }
            Tag::Tabular => self.read_tabular(),
        }
    }

    fn error(&self, kind: DecodeErrorKind) -> Error {
        self.error_at(kind, self.position)
    }

    fn error_at(&self, kind: DecodeErrorKind, position: usize) -> Error {
        Error::decode(kind, self.base_offset + position)
    }

    fn malformed(&self, msg: String) -> Error {
        self.error(DecodeErrorKind::MalformedTable(msg))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(self.error(DecodeErrorKind::Truncated {
                needed: len,
                available,
            }));
        }
        let bytes = &self.input[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Fails as truncated unless `count` items of at least `min_size` bytes could fit.
    fn ensure_fits(&self, count: usize, min_size: usize) -> Result<()> {
        let needed = count.saturating_mul(min_size);
        let available = self.remaining();
        if needed > available {
            return Err(self.error(DecodeErrorKind::Truncated { needed, available }));
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(self.error(DecodeErrorKind::DepthExceeded {
                limit: self.max_depth,
            }));
        }
        self.depth += 1;
        Ok(())
    }

    #[inline]
    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    fn read_bool(&mut self) -> Result<bool> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(self.error_at(DecodeErrorKind::InvalidBool { byte }, offset)),
        }
    }

    fn read_int(&mut self, width: Tag) -> Result<i64> {
        Ok(match width {
            Tag::Int8 => self.take(1)?[0] as i8 as i64,
            Tag::Int16 => LittleEndian::read_i16(self.take(2)?) as i64,
            Tag::Int32 => self.read_i32()? as i64,
            _ => self.read_i64()?,
        })
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    fn read_string(&mut self) -> Result<String> {
        let offset = self.position;
        let bytes = self.read_blob()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| self.error_at(DecodeErrorKind::InvalidUtf8, offset))
    }

    fn read_extended_tag(&mut self) -> Result<ExtendedTag> {
        let offset = self.position;
        let sub_tag = self.read_u8()?;
        ExtendedTag::from_byte(sub_tag)
            .ok_or_else(|| self.error_at(DecodeErrorKind::UnknownExtended { sub_tag }, offset))
    }

    fn read_decimal(&mut self) -> Result<Decimal> {
        let unscaled = self.read_i64()?;
        let scale = self.read_i32()?;
        Ok(Decimal::new(unscaled, scale))
    }

    fn read_extended(&mut self, sub: ExtendedTag) -> Result<ExtendedScalar> {
        let offset = self.position;
        let invalid = |this: &Self, msg: String| this.error_at(DecodeErrorKind::InvalidExtended(msg), offset);

        Ok(match sub {
            ExtendedTag::Timestamp => {
                let nanos = self.read_i64()?;
                let offset_minutes = match self.read_u8()? {
                    0 => None,
                    1 => Some(LittleEndian::read_i16(self.take(2)?)),
                    other => return Err(invalid(self, format!("timestamp offset marker 0x{:02x}", other))),
                };
                let ts = Timestamp::new(nanos, offset_minutes).map_err(|e| invalid(self, e.to_string()))?;
                ExtendedScalar::Timestamp(ts)
            }
            ExtendedTag::Decimal => ExtendedScalar::Decimal(self.read_decimal()?),
            ExtendedTag::Currency => {
                let amount = self.read_decimal()?;
                let mut code = [0u8; 3];
                code.copy_from_slice(self.take(3)?);
                let currency = Currency::from_code_bytes(amount, code)
                    .ok_or_else(|| invalid(self, format!("currency code {:02x?}", code)))?;
                ExtendedScalar::Currency(currency)
            }
            ExtendedTag::Percentage => ExtendedScalar::Percentage(Percentage::from_ratio(self.read_decimal()?)),
        })
    }

    fn read_list(&mut self) -> Result<Value> {
        self.enter()?;
        let count = self.read_len()?;
        self.ensure_fits(count, 1)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_value()?);
        }
        self.leave();
        Ok(Value::List(items))
    }

    fn read_map(&mut self) -> Result<Value> {
        self.enter()?;
        let count = self.read_len()?;
        self.ensure_fits(count, MIN_MAP_ENTRY)?;
        let mut map = BtoonMap::with_capacity(count);
        for _ in 0..count {
            let key_offset = self.position;
            let key = self.read_string()?;
            if map.contains_key(&key) {
                return Err(self.error_at(DecodeErrorKind::DuplicateKey { key }, key_offset));
            }
            let value = self.read_value()?;
            map.insert(key, value);
        }
        self.leave();
        Ok(Value::Map(map))
    }

    fn read_cell_layout(&mut self) -> Result<CellLayout> {
        let offset = self.position;
        let byte = self.read_u8()?;
        let tag = Tag::from_byte(byte)
            .ok_or_else(|| self.error_at(DecodeErrorKind::UnknownTag { tag: byte }, offset))?;
        Ok(match tag {
            Tag::Null => CellLayout::Null,
            Tag::Bool => CellLayout::Bool,
            Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64 => CellLayout::Int(tag),
            Tag::Float64 => CellLayout::Float,
            Tag::String => CellLayout::String,
            Tag::Bytes => CellLayout::Bytes,
            Tag::Extended => CellLayout::Extended(self.read_extended_tag()?),
            Tag::List | Tag::Map | Tag::Tabular => {
                return Err(self.error_at(
                    DecodeErrorKind::MalformedTable(format!("column kind {} is not a scalar", tag.info().name)),
                    offset,
                ))
            }
        })
    }

    fn read_cell(&mut self, layout: CellLayout) -> Result<Value> {
        match layout {
            CellLayout::Null => Ok(Value::Null),
            CellLayout::Bool => self.read_bool().map(Value::Bool),
            CellLayout::Int(width) => self.read_int(width).map(Value::Int),
            CellLayout::Float => self.read_f64().map(Value::Float),
            CellLayout::String => self.read_string().map(Value::String),
            CellLayout::Bytes => self.read_blob().map(|b| Value::Bytes(b.to_vec())),
            CellLayout::Extended(sub) => self.read_extended(sub).map(Value::Extended),
        }
    }

    fn read_bitmap(&mut self, rows: usize) -> Result<&'a [u8]> {
        let bitmap = self.take(rows.div_ceil(8))?;
        let spare_bits = bitmap.len() * 8 - rows;
        if spare_bits > 0 {
            let last = bitmap[bitmap.len() - 1];
            if last >> (8 - spare_bits) != 0 {
                return Err(self.malformed("presence bits set past the last row".to_string()));
            }
        }
        Ok(bitmap)
    }

    fn read_tabular(&mut self) -> Result<Value> {
        self.enter()?;
        self.enter()?;

        let column_count = self.read_len()?;
        let rows = self.read_len()?;
        if column_count == 0 {
            return Err(self.malformed("block declares no columns".to_string()));
        }
        // name length, kind and flags
        self.ensure_fits(column_count, 6)?;

        let mut headers: Vec<(String, CellLayout, bool)> = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let name_offset = self.position;
            let name = self.read_string()?;
            if headers.iter().any(|(existing, _, _)| *existing == name) {
                return Err(self.error_at(
                    DecodeErrorKind::MalformedTable(format!("duplicate column {:?}", name)),
                    name_offset,
                ));
            }
            let layout = self.read_cell_layout()?;
            let flags = self.read_u8()?;
            if flags & !1 != 0 {
                return Err(self.malformed(format!("column flags 0x{:02x}", flags)));
            }
            let has_bitmap = flags & 1 == 1;
            if has_bitmap && layout == CellLayout::Null {
                return Err(self.malformed(format!("all-null column {:?} carries a bitmap", name)));
            }
            headers.push((name, layout, has_bitmap));
        }

        if headers.iter().all(|(_, layout, _)| *layout == CellLayout::Null) {
            return Err(self.malformed("every column is all-null".to_string()));
        }
        // A present cell takes at least one byte, a bitmap one bit per row.
        let body_floor = headers.iter().fold(0usize, |acc, (_, layout, has_bitmap)| {
            let column = match (*layout, *has_bitmap) {
                (_, true) => rows.div_ceil(8),
                (CellLayout::Null, false) => 0,
                (_, false) => rows,
            };
            acc.saturating_add(column)
        });
        self.ensure_fits(body_floor, 1)?;

        let mut columns = Vec::with_capacity(column_count);
        for (name, layout, has_bitmap) in headers {
            let bitmap = if has_bitmap { Some(self.read_bitmap(rows)?) } else { None };
            let capacity = rows.min(self.remaining());
            let mut data = ColumnData::with_capacity(layout.kind(), capacity)
                .ok_or_else(|| self.malformed(format!("column {:?} is not scalar", name)))?;

            for row in 0..rows {
                let present = bitmap.map_or(true, |bits| bits[row / 8] & (1 << (row % 8)) != 0);
                let cell = if present { self.read_cell(layout)? } else { Value::Null };
                if let Err(cell) = data.push(cell) {
                    return Err(self.malformed(format!("{} cell in {} column {:?}", cell.kind(), data.kind(), name)));
                }
            }
            columns.push(Column { name, data });
        }

        let block = TabularBlock::from_columns(columns, rows).map_err(|e| self.malformed(e.to_string()))?;
        self.leave();
        self.leave();
        Ok(block.into_value())
    }
}

/// Reads one value body starting at `cursor` in `buffer`.
///
/// Returns the value and the cursor just past it.
pub fn read_value(buffer: &[u8], cursor: usize) -> Result<(Value, usize)> {
    let input = buffer.get(cursor..).ok_or_else(|| {
        Error::decode(
            DecodeErrorKind::Truncated {
                needed: cursor,
                available: buffer.len(),
            },
            buffer.len(),
        )
    })?;
    let mut decoder = Decoder::new(input, DEFAULT_MAX_DEPTH).with_base_offset(cursor);
    let value = decoder.read_value()?;
    Ok((value, cursor + decoder.position()))
}
