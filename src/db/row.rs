//! Row module - owned result rows with typed column access

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value as JsonValue};

use super::params::DATE_FORMAT;
use crate::error::{Error, Result};

/// A single result row, detached from the cursor that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub(crate) fn from_sqlite(row: &rusqlite::Row<'_>, columns: &Arc<[String]>) -> Result<Self> {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(SqlValue::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::Statement)?;
        Ok(Row {
            columns: columns.clone(),
            values,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode the column at `index`
    pub fn get<T: FromColumn>(&self, index: usize) -> Result<T> {
        let column = self.columns.get(index).ok_or_else(|| Error::Decode {
            column: index.to_string(),
            message: format!("row has {} column(s)", self.columns.len()),
        })?;
        T::from_column(&self.values[index]).map_err(|message| Error::Decode {
            column: column.clone(),
            message,
        })
    }

    /// Decode the first column called `name`
    pub fn get_by_name<T: FromColumn>(&self, name: &str) -> Result<T> {
        let index = self
            .columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| Error::Decode {
                column: name.to_string(),
                message: "no such column".to_string(),
            })?;
        self.get(index)
    }

    /// Column values rendered as plain text, in column order
    pub fn display_values(&self) -> Vec<String> {
        self.values.iter().map(display_value).collect()
    }

    /// Convert the row to a JSON object keyed by column name
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.insert(name.clone(), sqlite_to_json(value));
        }
        JsonValue::Object(map)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(name, &sqlite_to_json(value))?;
        }
        map.end()
    }
}

/// Convert an SQLite value to JSON with proper type handling
fn sqlite_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Integer(i) => JsonValue::Number((*i).into()),
        SqlValue::Real(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        SqlValue::Text(t) => JsonValue::String(t.clone()),
        SqlValue::Blob(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
    }
}

fn display_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(t) => t.clone(),
        SqlValue::Blob(b) => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b),
    }
}

fn storage_class(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "NULL",
        SqlValue::Integer(_) => "INTEGER",
        SqlValue::Real(_) => "REAL",
        SqlValue::Text(_) => "TEXT",
        SqlValue::Blob(_) => "BLOB",
    }
}

fn mismatch(value: &SqlValue, wanted: &str) -> String {
    format!("cannot read {} as {wanted}", storage_class(value))
}

/// Types a column value can be decoded into.
///
/// Decoding never converts between storage classes: an INTEGER column does
/// not decode as `String`, and TEXT does not decode as `i64`.
pub trait FromColumn: Sized {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String>;
}

impl FromColumn for i64 {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(mismatch(other, "INT64")),
        }
    }
}

impl FromColumn for f64 {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Real(f) => Ok(*f),
            other => Err(mismatch(other, "FLOAT64")),
        }
    }
}

impl FromColumn for bool {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Integer(0) => Ok(false),
            SqlValue::Integer(1) => Ok(true),
            SqlValue::Integer(i) => Err(format!("{i} is not a BOOL")),
            other => Err(mismatch(other, "BOOL")),
        }
    }
}

impl FromColumn for String {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Text(t) => Ok(t.clone()),
            other => Err(mismatch(other, "STRING")),
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Blob(b) => Ok(b.clone()),
            other => Err(mismatch(other, "BYTES")),
        }
    }
}

impl FromColumn for NaiveDate {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Text(t) => NaiveDate::parse_from_str(t, DATE_FORMAT)
                .map_err(|e| format!("{t:?} is not a DATE: {e}")),
            other => Err(mismatch(other, "DATE")),
        }
    }
}

impl FromColumn for DateTime<Utc> {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Text(t) => DateTime::parse_from_rfc3339(t)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| format!("{t:?} is not a TIMESTAMP: {e}")),
            other => Err(mismatch(other, "TIMESTAMP")),
        }
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_column(other).map(Some),
        }
    }
}
