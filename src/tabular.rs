//! Tabular analysis and the columnar [`TabularBlock`].
//!
//! A list of maps that all share the same keys (in the same order) and whose
//! columns each hold a single scalar kind can be written column-major instead
//! of row by row. This is purely a physical optimization: decoding a block
//! yields exactly the list of maps it was built from.
//!
//! [`analyze`] is the eligibility test. It is a pure function over the
//! candidate rows and never fails; a `None` simply means "write row-major".
//!
//! ```rust
//! use btoon::{btoon, tabular, Value};
//!
//! let rows = btoon!([
//!     {"id": 1, "name": "Widget", "price": 9.99},
//!     {"id": 2, "name": "Gadget", "price": null}
//! ]);
//! let items = rows.as_list().unwrap();
//!
//! let shape = tabular::analyze(items, 2).unwrap();
//! assert_eq!(shape.column_names().collect::<Vec<_>>(), vec!["id", "name", "price"]);
//!
//! // One row is below the minimum.
//! assert!(tabular::analyze(&items[..1], 2).is_none());
//! ```

use crate::extended::{Currency, Decimal, ExtendedScalar, Percentage, Timestamp};
use crate::options::DEFAULT_MIN_TABULAR_ROWS;
use crate::{BtoonMap, Value, ValueKind};

/// The logical layout of a tabular-eligible list.
#[derive(Clone, Debug, PartialEq)]
pub struct TabularShape<'a> {
    pub columns: Vec<ColumnSpec<'a>>,
    pub rows: usize,
}

impl<'a> TabularShape<'a> {
    pub fn column_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// One column of a [`TabularShape`].
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec<'a> {
    pub name: &'a str,
    /// Kind shared by every non-null cell; `Null` when all cells are null.
    pub kind: ValueKind,
    /// At least one cell is null.
    pub nullable: bool,
}

impl ColumnSpec<'_> {
    /// A presence bitmap is written when a typed column has null cells.
    #[inline]
    #[must_use]
    pub fn needs_bitmap(&self) -> bool {
        self.nullable && self.kind != ValueKind::Null
    }
}

/// Decides whether `items` can be written as a tabular block.
///
/// Eligible when there are at least `min_rows` rows, every row is a non-empty
/// map with exactly the first row's keys in the same order, every column's
/// non-null cells share one scalar kind, and at least one column has a
/// non-null cell. Kinds are taken from the values as
/// given; an integer column is never reinterpreted as a decimal one.
#[must_use]
pub fn analyze(items: &[Value], min_rows: usize) -> Option<TabularShape<'_>> {
    if items.is_empty() || items.len() < min_rows {
        return None;
    }

    let first = items[0].as_map()?;
    if first.is_empty() {
        return None;
    }

    let mut columns: Vec<ColumnSpec<'_>> = first
        .keys()
        .map(|name| ColumnSpec {
            name: name.as_str(),
            kind: ValueKind::Null,
            nullable: false,
        })
        .collect();

    for item in items {
        let row = item.as_map()?;
        if !row.same_keys(first) {
            return None;
        }
        for (spec, cell) in columns.iter_mut().zip(row.values()) {
            match cell.kind() {
                ValueKind::Null => spec.nullable = true,
                kind if !kind.is_scalar() => return None,
                kind if spec.kind == ValueKind::Null => spec.kind = kind,
                kind if spec.kind != kind => return None,
                _ => {}
            }
        }
    }

    // Nothing but nulls would store no bytes per row.
    if columns.iter().all(|c| c.kind == ValueKind::Null) {
        return None;
    }

    Some(TabularShape {
        columns,
        rows: items.len(),
    })
}

/// Typed, column-major cell storage. `None` marks a null cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    /// Every cell is null; only the count is stored.
    Null(usize),
    Bool(Vec<Option<bool>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Bytes(Vec<Option<Vec<u8>>>),
    Timestamp(Vec<Option<Timestamp>>),
    Decimal(Vec<Option<Decimal>>),
    Currency(Vec<Option<Currency>>),
    Percentage(Vec<Option<Percentage>>),
}

macro_rules! push_cell {
    ($cells:expr, $value:expr, $pattern:pat => $inner:expr) => {
        match $value {
            Value::Null => {
                $cells.push(None);
                Ok(())
            }
            $pattern => {
                $cells.push(Some($inner));
                Ok(())
            }
            other => Err(other),
        }
    };
}

fn into_values<T>(cells: Vec<Option<T>>, wrap: impl Fn(T) -> Value) -> Vec<Value> {
    cells.into_iter().map(|c| c.map_or(Value::Null, &wrap)).collect()
}

fn cell_at<T: Clone>(cells: &[Option<T>], row: usize, wrap: impl Fn(T) -> Value) -> Option<Value> {
    cells.get(row).map(|c| c.clone().map_or(Value::Null, wrap))
}

impl ColumnData {
    /// Empty storage for a scalar kind; `None` for lists and maps.
    #[must_use]
    pub fn with_capacity(kind: ValueKind, capacity: usize) -> Option<Self> {
        Some(match kind {
            ValueKind::Null => ColumnData::Null(0),
            ValueKind::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            ValueKind::Int => ColumnData::Int(Vec::with_capacity(capacity)),
            ValueKind::Float => ColumnData::Float(Vec::with_capacity(capacity)),
            ValueKind::String => ColumnData::String(Vec::with_capacity(capacity)),
            ValueKind::Bytes => ColumnData::Bytes(Vec::with_capacity(capacity)),
            ValueKind::Timestamp => ColumnData::Timestamp(Vec::with_capacity(capacity)),
            ValueKind::Decimal => ColumnData::Decimal(Vec::with_capacity(capacity)),
            ValueKind::Currency => ColumnData::Currency(Vec::with_capacity(capacity)),
            ValueKind::Percentage => ColumnData::Percentage(Vec::with_capacity(capacity)),
            ValueKind::List | ValueKind::Map => return None,
        })
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            ColumnData::Null(_) => ValueKind::Null,
            ColumnData::Bool(_) => ValueKind::Bool,
            ColumnData::Int(_) => ValueKind::Int,
            ColumnData::Float(_) => ValueKind::Float,
            ColumnData::String(_) => ValueKind::String,
            ColumnData::Bytes(_) => ValueKind::Bytes,
            ColumnData::Timestamp(_) => ValueKind::Timestamp,
            ColumnData::Decimal(_) => ValueKind::Decimal,
            ColumnData::Currency(_) => ValueKind::Currency,
            ColumnData::Percentage(_) => ValueKind::Percentage,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Null(n) => *n,
            ColumnData::Bool(c) => c.len(),
            ColumnData::Int(c) => c.len(),
            ColumnData::Float(c) => c.len(),
            ColumnData::String(c) => c.len(),
            ColumnData::Bytes(c) => c.len(),
            ColumnData::Timestamp(c) => c.len(),
            ColumnData::Decimal(c) => c.len(),
            ColumnData::Currency(c) => c.len(),
            ColumnData::Percentage(c) => c.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a cell. A value of the wrong kind is handed back unchanged.
    pub fn push(&mut self, value: Value) -> Result<(), Value> {
        match self {
            ColumnData::Null(n) => match value {
                Value::Null => {
                    *n += 1;
                    Ok(())
                }
                other => Err(other),
            },
            ColumnData::Bool(c) => push_cell!(c, value, Value::Bool(b) => b),
            ColumnData::Int(c) => push_cell!(c, value, Value::Int(i) => i),
            ColumnData::Float(c) => push_cell!(c, value, Value::Float(f) => f),
            ColumnData::String(c) => push_cell!(c, value, Value::String(s) => s),
            ColumnData::Bytes(c) => push_cell!(c, value, Value::Bytes(b) => b),
            ColumnData::Timestamp(c) => {
                push_cell!(c, value, Value::Extended(ExtendedScalar::Timestamp(t)) => t)
            }
            ColumnData::Decimal(c) => {
                push_cell!(c, value, Value::Extended(ExtendedScalar::Decimal(d)) => d)
            }
            ColumnData::Currency(c) => {
                push_cell!(c, value, Value::Extended(ExtendedScalar::Currency(m)) => m)
            }
            ColumnData::Percentage(c) => {
                push_cell!(c, value, Value::Extended(ExtendedScalar::Percentage(p)) => p)
            }
        }
    }

    /// Returns a copy of the cell at `row`.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Null(n) => (row < *n).then_some(Value::Null),
            ColumnData::Bool(c) => cell_at(c, row, Value::Bool),
            ColumnData::Int(c) => cell_at(c, row, Value::Int),
            ColumnData::Float(c) => cell_at(c, row, Value::Float),
            ColumnData::String(c) => cell_at(c, row, Value::String),
            ColumnData::Bytes(c) => cell_at(c, row, Value::Bytes),
            ColumnData::Timestamp(c) => cell_at(c, row, Value::from),
            ColumnData::Decimal(c) => cell_at(c, row, Value::from),
            ColumnData::Currency(c) => cell_at(c, row, Value::from),
            ColumnData::Percentage(c) => cell_at(c, row, Value::from),
        }
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        (0..self.len())
            .filter(|&row| matches!(self.get(row), Some(Value::Null)))
            .count()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        match self {
            ColumnData::Null(n) => vec![Value::Null; n],
            ColumnData::Bool(c) => into_values(c, Value::Bool),
            ColumnData::Int(c) => into_values(c, Value::Int),
            ColumnData::Float(c) => into_values(c, Value::Float),
            ColumnData::String(c) => into_values(c, Value::String),
            ColumnData::Bytes(c) => into_values(c, Value::Bytes),
            ColumnData::Timestamp(c) => into_values(c, Value::from),
            ColumnData::Decimal(c) => into_values(c, Value::from),
            ColumnData::Currency(c) => into_values(c, Value::from),
            ColumnData::Percentage(c) => into_values(c, Value::from),
        }
    }
}

/// A named column of a [`TabularBlock`].
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A list of uniform maps stored column by column.
///
/// This is the typed view host table adapters work with: numeric columns stay
/// `i64`/`f64`/[`Decimal`] and are never down-cast.
///
/// # Examples
///
/// ```rust
/// use btoon::tabular::{ColumnData, TabularBlock};
/// use btoon::btoon;
///
/// let rows = btoon!([
///     {"sym": "AAPL", "qty": 10},
///     {"sym": "MSFT", "qty": null}
/// ]);
/// let block = TabularBlock::from_rows(rows.as_list().unwrap()).unwrap();
///
/// assert_eq!(block.row_count(), 2);
/// assert_eq!(block.column("qty").unwrap().data, ColumnData::Int(vec![Some(10), None]));
/// assert_eq!(block.into_value(), rows);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TabularBlock {
    columns: Vec<Column>,
    rows: usize,
}

impl TabularBlock {
    /// Builds a block if `items` is tabular-eligible with the default minimum row count.
    #[must_use]
    pub fn from_rows(items: &[Value]) -> Option<Self> {
        Self::from_rows_with_min(items, DEFAULT_MIN_TABULAR_ROWS)
    }

    #[must_use]
    pub fn from_rows_with_min(items: &[Value], min_rows: usize) -> Option<Self> {
        let shape = analyze(items, min_rows)?;
        let mut columns = Vec::with_capacity(shape.columns.len());

        for (index, spec) in shape.columns.iter().enumerate() {
            let mut data = ColumnData::with_capacity(spec.kind, shape.rows)?;
            for item in items {
                let (_, cell) = item.as_map()?.get_index(index)?;
                data.push(cell.clone()).ok()?;
            }
            columns.push(Column {
                name: spec.name.to_string(),
                data,
            });
        }

        Some(TabularBlock {
            columns,
            rows: shape.rows,
        })
    }

    /// Assembles a block from columns, which must be non-empty, uniquely named
    /// and all of length `rows`.
    pub fn from_columns(columns: Vec<Column>, rows: usize) -> crate::Result<Self> {
        if columns.is_empty() {
            return Err(crate::Error::custom("a tabular block needs at least one column"));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.data.len() != rows {
                return Err(crate::Error::custom(format!(
                    "column {:?} has {} cells, expected {}",
                    column.name,
                    column.data.len(),
                    rows
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(crate::Error::custom(format!("duplicate column {:?}", column.name)));
            }
        }
        Ok(TabularBlock { columns, rows })
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Rebuilds the row maps, keys in column order.
    #[must_use]
    pub fn into_rows(self) -> Vec<Value> {
        let names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let mut cells: Vec<std::vec::IntoIter<Value>> = self
            .columns
            .into_iter()
            .map(|c| c.data.into_values().into_iter())
            .collect();

        (0..self.rows)
            .map(|_| {
                let mut row = BtoonMap::with_capacity(names.len());
                for (name, column) in names.iter().zip(cells.iter_mut()) {
                    row.insert(name.clone(), column.next().unwrap_or(Value::Null));
                }
                Value::Map(row)
            })
            .collect()
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::List(self.into_rows())
    }
}
