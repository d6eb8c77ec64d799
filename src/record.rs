use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single cell of the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn kind(&self) -> ColumnType {
        match self {
            Value::Int(_) => ColumnType::Int,
            Value::Date(_) => ColumnType::Date,
            Value::Text(_) => ColumnType::Text,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Scalar type of a column, fixed when the table is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Date,
    Text,
}

impl ColumnType {
    /// Pick the narrowest type every cell parses as.
    pub(crate) fn infer<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> Self {
        if cells.clone().all(|cell| cell.parse::<i64>().is_ok()) {
            ColumnType::Int
        } else if cells
            .clone()
            .all(|cell| NaiveDate::parse_from_str(cell, DATE_FORMAT).is_ok())
        {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }

    pub(crate) fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ColumnType::Int => raw.parse().ok().map(Value::Int),
            ColumnType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            ColumnType::Text => Some(Value::Text(raw.to_owned())),
        }
    }

    /// Convert a caller supplied value into this column's type.
    ///
    /// Text is parsed into `Int`/`Date` columns and any value is rendered
    /// into a `Text` column. Anything else does not fit.
    pub(crate) fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (ColumnType::Int, value @ Value::Int(_)) => Some(value),
            (ColumnType::Date, value @ Value::Date(_)) => Some(value),
            (ColumnType::Text, Value::Text(text)) => Some(Value::Text(text)),
            (ColumnType::Text, other) => Some(Value::Text(other.to_string())),
            (kind, Value::Text(text)) => kind.parse(text.trim()),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Int => "int",
            ColumnType::Date => "date",
            ColumnType::Text => "text",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

/// A single row of a table, keyed by the table's header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    header: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(header: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(header.len(), values.len());
        Self { header, values }
    }

    /// Value stored under `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.header
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.values[idx])
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.header
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub(crate) fn value_at(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    pub(crate) fn set_at(&mut self, idx: usize, value: Value) {
        self.values[idx] = value;
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Column values for a row that is about to be inserted or edited.
///
/// The id column is never part of an entry, the store assigns it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    fields: Vec<(String, Value)>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, replacing an earlier value for the same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(field) => field.1 = value,
            None => self.fields.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Entry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Entry::new(), |entry, (column, value)| entry.set(column, value))
    }
}
