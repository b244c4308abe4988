// Tables backed by polars data frames.
//
// Upstream providers disagree about which columns exist, so a table is a
// frame whose column set is only known at run time. Consumers ask whether a
// column is present (and numeric) before using it and degrade when it is
// not. Output tables serialize as JSON arrays of records.

use polars::prelude::*;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table operation failed: {0}")]
    Polars(#[from] PolarsError),
}

pub type TableResult<T> = Result<T, TableError>;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// An owned copy of a single cell, for reading and serializing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used for identifier lookups (player ids, team codes).
    /// Null, blank text and non-finite floats have no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bool(_) => None,
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if !f.is_finite() => None,
            Value::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
        }
    }
}

impl From<AnyValue<'_>> for Value {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Boolean(b) => Value::Bool(b),
            AnyValue::Int8(i) => Value::Int(i64::from(i)),
            AnyValue::Int16(i) => Value::Int(i64::from(i)),
            AnyValue::Int32(i) => Value::Int(i64::from(i)),
            AnyValue::Int64(i) => Value::Int(i),
            AnyValue::UInt8(i) => Value::Int(i64::from(i)),
            AnyValue::UInt16(i) => Value::Int(i64::from(i)),
            AnyValue::UInt32(i) => Value::Int(i64::from(i)),
            AnyValue::UInt64(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64)),
            AnyValue::Float32(f) => Value::Float(f64::from(f)),
            AnyValue::Float64(f) => Value::Float(f),
            AnyValue::String(s) => Value::Str(s.to_string()),
            AnyValue::StringOwned(s) => Value::Str(s.to_string()),
            other => Value::Str(other.to_string()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// Integer and float columns count as numeric. Text, boolean and untyped
/// all-null columns do not.
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_float()
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A data frame with a record-oriented JSON form.
#[derive(Debug, Clone, Default)]
pub struct Table {
    df: DataFrame,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn lazy(&self) -> LazyFrame {
        self.df.clone().lazy()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.df.get_columns().iter().map(|c| c.name().as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    pub fn dtype(&self, name: &str) -> Option<&DataType> {
        self.df.column(name).ok().map(|c| c.dtype())
    }

    /// True when `name` is present with an integer or float type.
    pub fn is_numeric(&self, name: &str) -> bool {
        self.dtype(name).is_some_and(is_numeric_dtype)
    }

    /// Cell at (`row`, `name`), or `None` when the column is absent or the
    /// row is out of range.
    pub fn get(&self, row: usize, name: &str) -> Option<Value> {
        if row >= self.len() {
            return None;
        }
        let column = self.df.column(name).ok()?;
        column.get(row).ok().map(Value::from)
    }

    /// Identifier text of every row of `name`, trimmed. Nulls and blanks are
    /// `None`, as is every row when the column is absent.
    pub fn keys(&self, name: &str) -> TableResult<Vec<Option<String>>> {
        let Ok(column) = self.df.column(name) else {
            return Ok(vec![None; self.len()]);
        };
        let text = column.cast(&DataType::String)?;
        let keys = text
            .as_materialized_series()
            .str()?
            .iter()
            .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
            .collect();
        Ok(keys)
    }

    /// Stack tables vertically. The result has the union of all columns in
    /// first-seen order; a table lacking a column contributes nulls, and a
    /// column typed differently across tables takes the common supertype.
    pub fn concat(tables: Vec<Table>) -> TableResult<Table> {
        let frames: Vec<LazyFrame> = tables
            .into_iter()
            .filter(|t| t.width() > 0)
            .map(|t| t.df.lazy())
            .collect();
        match frames.len() {
            0 => Ok(Table::new()),
            1 => Ok(Table::from(frames[0].clone().collect()?)),
            _ => {
                let args = UnionArgs {
                    to_supertypes: true,
                    ..Default::default()
                };
                Ok(Table::from(concat_lf_diagonal(frames, args)?.collect()?))
            }
        }
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self {
        Self { df }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}

// ---------------------------------------------------------------------------
// Serialization: a table is a JSON array of records in column order
// ---------------------------------------------------------------------------

struct RecordRef<'a> {
    table: &'a Table,
    row: usize,
}

impl Serialize for RecordRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns = self.table.df.get_columns();
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for column in columns {
            let cell = column
                .get(self.row)
                .map(Value::from)
                .map_err(serde::ser::Error::custom)?;
            map.serialize_entry(column.name().as_str(), &cell)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for row in 0..self.len() {
            seq.serialize_element(&RecordRef { table: self, row })?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
