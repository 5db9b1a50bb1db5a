//! Params module - typed statement parameters and their SQLite encoding

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// Text layout used to store `DATE` values
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed parameter value.
///
/// Dates are stored as `YYYY-MM-DD` text and timestamps as RFC 3339 UTC text
/// with microsecond precision, so both compare correctly as text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int64(_) => "INT64",
            Value::Float64(_) => "FLOAT64",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::from(*b),
            Value::Int64(i) => ToSqlOutput::from(*i),
            Value::Float64(f) => ToSqlOutput::from(*f),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Date(d) => ToSqlOutput::from(d.format(DATE_FORMAT).to_string()),
            Value::Timestamp(ts) => {
                ToSqlOutput::from(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                b,
            )),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int64(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Named parameters, keyed without their `@`/`:`/`$` prefix
pub type Params = BTreeMap<String, Value>;

/// Strip the SQLite prefix from a parameter name as it appears in SQL
pub fn bare_name(sql_name: &str) -> &str {
    sql_name
        .strip_prefix(&['@', ':', '$'][..])
        .unwrap_or(sql_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn date_binds_as_iso_text() {
        let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let value = Value::from(date);
        let out = value.to_sql().unwrap();
        match out {
            ToSqlOutput::Owned(rusqlite::types::Value::Text(text)) => {
                assert_eq!(text, "2019-01-01")
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test_log::test]
    fn option_none_becomes_null() {
        let value: Value = Option::<i64>::None.into();
        assert_eq!(value, Value::Null);
        let value: Value = Some("x").into();
        assert_eq!(value, Value::String("x".to_string()));
    }

    #[test_log::test]
    fn strips_parameter_prefixes() {
        assert_eq!(bare_name("@lastContactDate"), "lastContactDate");
        assert_eq!(bare_name(":id"), "id");
        assert_eq!(bare_name("$name"), "name");
        assert_eq!(bare_name("plain"), "plain");
    }

    #[test_log::test]
    fn displays_values_as_plain_text() {
        assert_eq!(Value::Int64(11).to_string(), "11");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2018, 9, 2).unwrap()).to_string(),
            "2018-09-02"
        );
        assert_eq!(Value::Bytes(b"hi".to_vec()).to_string(), "aGk=");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
