//! Value → bytes.
//!
//! The encoder writes the tagged body of a value (no header, no flag byte) into
//! a growable buffer. Lists are handed to the tabular analyzer first when
//! `auto_tabular` is enabled; everything else is written row-major.

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::error::EncodeError;
use crate::extended::ExtendedScalar;
use crate::tabular::{self, ColumnSpec, TabularShape};
use crate::tags::{Tag, TAG_EXTENDED, TAG_LIST, TAG_MAP, TAG_TABULAR};
use crate::{BtoonMap, EncodeOptions, Result, Value, ValueKind};

const MAX_LEN: u64 = u32::MAX as u64;

/// Streaming writer for a single value body.
///
/// # Examples
///
/// ```rust
/// use btoon::codec::Encoder;
/// use btoon::{EncodeOptions, Value};
///
/// let options = EncodeOptions::default();
/// let mut encoder = Encoder::new(&options);
/// encoder.write_value(&Value::from(7)).unwrap();
/// assert_eq!(encoder.into_inner(), vec![0x02, 0x07]);
/// ```
pub struct Encoder<'o> {
    out: Vec<u8>,
    options: &'o EncodeOptions,
    depth: usize,
}

impl<'o> Encoder<'o> {
    #[must_use]
    pub fn new(options: &'o EncodeOptions) -> Self {
        Self::with_buffer(Vec::new(), options)
    }

    /// Appends to an existing buffer instead of a fresh one.
    #[must_use]
    pub fn with_buffer(out: Vec<u8>, options: &'o EncodeOptions) -> Self {
        Encoder {
            out,
            options,
            depth: 0,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }

    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_tag(Tag::Null),
            Value::Bool(b) => {
                self.write_tag(Tag::Bool);
                self.out.push(u8::from(*b));
            }
            Value::Int(i) => {
                let tag = Tag::for_int(*i);
                self.write_tag(tag);
                self.write_int(tag, *i)?;
            }
            Value::Float(f) => {
                self.write_tag(Tag::Float64);
                self.out.write_f64::<LittleEndian>(*f)?;
            }
            Value::String(s) => {
                self.write_tag(Tag::String);
                self.write_blob("string", s.as_bytes())?;
            }
            Value::Bytes(b) => {
                self.write_tag(Tag::Bytes);
                self.write_blob("bytes", b)?;
            }
            Value::List(items) => self.write_list(items)?,
            Value::Map(map) => self.write_map(map)?,
            Value::Extended(ext) => {
                self.out.push(TAG_EXTENDED);
                self.out.push(ext.tag().byte());
                self.write_extended_payload(ext)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn write_tag(&mut self, tag: Tag) {
        self.out.push(tag.byte());
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(EncodeError::DepthExceeded {
                limit: self.options.max_depth,
            }
            .into());
        }
        self.depth += 1;
        Ok(())
    }

    #[inline]
    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn write_len(&mut self, what: &'static str, len: usize) -> Result<()> {
        let len32 = u32::try_from(len).map_err(|_| EncodeError::LengthOverflow {
            what,
            len,
            max: MAX_LEN,
        })?;
        self.out.write_u32::<LittleEndian>(len32)?;
        Ok(())
    }

    fn write_blob(&mut self, what: &'static str, bytes: &[u8]) -> Result<()> {
        self.write_len(what, bytes.len())?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn write_int(&mut self, width: Tag, value: i64) -> Result<()> {
        match width {
            Tag::Int8 => self.out.write_i8(value as i8)?,
            Tag::Int16 => self.out.write_i16::<LittleEndian>(value as i16)?,
            Tag::Int32 => self.out.write_i32::<LittleEndian>(value as i32)?,
            _ => self.out.write_i64::<LittleEndian>(value)?,
        }
        Ok(())
    }

    fn write_extended_payload(&mut self, ext: &ExtendedScalar) -> Result<()> {
        match ext {
            ExtendedScalar::Timestamp(ts) => {
                self.out.write_i64::<LittleEndian>(ts.nanos())?;
                match ts.offset_minutes() {
                    Some(offset) => {
                        self.out.push(1);
                        self.out.write_i16::<LittleEndian>(offset)?;
                    }
                    None => self.out.push(0),
                }
            }
            ExtendedScalar::Decimal(d) => {
                self.out.write_i64::<LittleEndian>(d.unscaled())?;
                self.out.write_i32::<LittleEndian>(d.scale())?;
            }
            ExtendedScalar::Currency(c) => {
                let amount = c.amount();
                self.out.write_i64::<LittleEndian>(amount.unscaled())?;
                self.out.write_i32::<LittleEndian>(amount.scale())?;
                self.out.extend_from_slice(&c.code_bytes());
            }
            ExtendedScalar::Percentage(p) => {
                let ratio = p.ratio();
                self.out.write_i64::<LittleEndian>(ratio.unscaled())?;
                self.out.write_i32::<LittleEndian>(ratio.scale())?;
            }
        }
        Ok(())
    }

    fn write_list(&mut self, items: &[Value]) -> Result<()> {
        self.enter()?;
        let shape = if self.options.auto_tabular {
            tabular::analyze(items, self.options.min_tabular_rows)
        } else {
            None
        };

        match shape {
            Some(shape) => {
                debug!(rows = shape.rows, columns = shape.columns.len(), "writing tabular block");
                // Rows are maps one level below the block.
                self.enter()?;
                self.write_tabular(items, &shape)?;
                self.leave();
            }
            None => {
                self.out.push(TAG_LIST);
                self.write_len("list", items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
            }
        }
        self.leave();
        Ok(())
    }

    fn write_map(&mut self, map: &BtoonMap) -> Result<()> {
        self.enter()?;
        self.out.push(TAG_MAP);
        self.write_len("map", map.len())?;
        for (key, value) in map {
            self.write_blob("map key", key.as_bytes())?;
            self.write_value(value)?;
        }
        self.leave();
        Ok(())
    }

    fn write_tabular(&mut self, items: &[Value], shape: &TabularShape<'_>) -> Result<()> {
        let rows: Vec<&BtoonMap> = items.iter().filter_map(Value::as_map).collect();
        let columns: Vec<Vec<&Value>> = (0..shape.columns.len())
            .map(|index| {
                rows.iter()
                    .filter_map(|row| row.get_index(index).map(|(_, v)| v))
                    .collect()
            })
            .collect();

        self.out.push(TAG_TABULAR);
        self.write_len("tabular columns", shape.columns.len())?;
        self.write_len("tabular rows", shape.rows)?;

        let mut int_widths = Vec::with_capacity(shape.columns.len());
        for (spec, cells) in shape.columns.iter().zip(&columns) {
            self.write_blob("column name", spec.name.as_bytes())?;
            let width = column_int_width(cells);
            int_widths.push(width);
            self.write_column_kind(spec, width);
            self.out.push(u8::from(spec.needs_bitmap()));
        }

        for ((spec, cells), width) in shape.columns.iter().zip(&columns).zip(int_widths) {
            if spec.needs_bitmap() {
                self.out.extend(presence_bitmap(cells));
            }
            for cell in cells.iter().filter(|c| !c.is_null()) {
                self.write_cell(cell, width)?;
            }
        }
        Ok(())
    }

    fn write_column_kind(&mut self, spec: &ColumnSpec<'_>, int_width: Tag) {
        let tag = match spec.kind {
            ValueKind::Null => Tag::Null,
            ValueKind::Bool => Tag::Bool,
            ValueKind::Int => int_width,
            ValueKind::Float => Tag::Float64,
            ValueKind::String => Tag::String,
            ValueKind::Bytes => Tag::Bytes,
            ValueKind::Timestamp
            | ValueKind::Decimal
            | ValueKind::Currency
            | ValueKind::Percentage => Tag::Extended,
            ValueKind::List | ValueKind::Map => unreachable!("analyze admits scalar columns only"),
        };
        self.write_tag(tag);
        if let Some(sub) = super::extended_tag_for(spec.kind) {
            self.out.push(sub.byte());
        }
    }

    /// Writes one non-null cell without its tag.
    fn write_cell(&mut self, cell: &Value, int_width: Tag) -> Result<()> {
        match cell {
            Value::Bool(b) => self.out.push(u8::from(*b)),
            Value::Int(i) => self.write_int(int_width, *i)?,
            Value::Float(f) => self.out.write_f64::<LittleEndian>(*f)?,
            Value::String(s) => self.write_blob("string", s.as_bytes())?,
            Value::Bytes(b) => self.write_blob("bytes", b)?,
            Value::Extended(ext) => self.write_extended_payload(ext)?,
            Value::Null | Value::List(_) | Value::Map(_) => {}
        }
        Ok(())
    }
}

/// Narrowest integer tag holding every int cell of a column.
fn column_int_width(cells: &[&Value]) -> Tag {
    cells
        .iter()
        .filter_map(|c| c.as_i64())
        .map(Tag::for_int)
        .max_by_key(|tag| tag.byte())
        .unwrap_or(Tag::Int8)
}

/// One bit per row, least significant bit first; set means present.
fn presence_bitmap(cells: &[&Value]) -> Vec<u8> {
    let mut bitmap = vec![0u8; cells.len().div_ceil(8)];
    for (row, cell) in cells.iter().enumerate() {
        if !cell.is_null() {
            bitmap[row / 8] |= 1 << (row % 8);
        }
    }
    bitmap
}

/// Appends the body of `value` to `buf`.
///
/// On failure `buf` is restored to its length before the call, so a caller
/// never observes a half-written value.
pub fn write_value(buf: &mut Vec<u8>, value: &Value, options: &EncodeOptions) -> Result<()> {
    let start = buf.len();
    let mut encoder = Encoder::with_buffer(std::mem::take(buf), options);
    let result = encoder.write_value(value);
    *buf = encoder.into_inner();
    if result.is_err() {
        buf.truncate(start);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btoon;
    use crate::tags::{TAG_BOOL, TAG_INT16, TAG_INT8, TAG_NULL, TAG_STRING};

    fn body(value: &Value) -> Vec<u8> {
        let options = EncodeOptions::default();
        let mut encoder = Encoder::new(&options);
        encoder.write_value(value).unwrap();
        encoder.into_inner()
    }

    #[test]
    fn test_scalar_layouts() {
        assert_eq!(body(&Value::Null), vec![TAG_NULL]);
        assert_eq!(body(&Value::Bool(true)), vec![TAG_BOOL, 1]);
        assert_eq!(body(&Value::Int(300)), vec![TAG_INT16, 0x2c, 0x01]);
        assert_eq!(body(&Value::from("hi")), vec![TAG_STRING, 2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_tabular_layout() {
        let rows = btoon!([{"a": 1}, {"a": null}, {"a": 2}]);
        let bytes = body(&rows);
        let expected = vec![
            TAG_TABULAR,
            1, 0, 0, 0, // columns
            3, 0, 0, 0, // rows
            1, 0, 0, 0, b'a', // name
            TAG_INT8, // kind
            1,    // bitmap present
            0b101, // rows 0 and 2
            1, 2,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_auto_tabular_off_is_row_major() {
        let rows = btoon!([{"a": 1}, {"a": 2}]);
        let options = EncodeOptions::default().with_auto_tabular(false);
        let mut encoder = Encoder::new(&options);
        encoder.write_value(&rows).unwrap();
        assert_eq!(encoder.into_inner()[0], TAG_LIST);
    }

    #[test]
    fn test_depth_limit() {
        let options = EncodeOptions::default().with_max_depth(2);
        let ok = btoon!([[1]]);
        let too_deep = btoon!([[[1]]]);
        assert!(Encoder::new(&options).write_value(&ok).is_ok());
        let err = Encoder::new(&options).write_value(&too_deep).unwrap_err();
        assert!(err.is_depth_exceeded());
    }

    #[test]
    fn test_failed_write_leaves_buffer_untouched() {
        let options = EncodeOptions::default().with_max_depth(1);
        let mut buf = vec![0xAA];
        let err = write_value(&mut buf, &btoon!([[1]]), &options);
        assert!(err.is_err());
        assert_eq!(buf, vec![0xAA]);
    }

    #[test]
    fn test_int_column_uses_widest_cell() {
        let cells = [Value::Int(1), Value::Null, Value::Int(70_000)];
        let refs: Vec<&Value> = cells.iter().collect();
        assert_eq!(column_int_width(&refs), Tag::Int32);
        assert_eq!(presence_bitmap(&refs), vec![0b101]);
    }
}
