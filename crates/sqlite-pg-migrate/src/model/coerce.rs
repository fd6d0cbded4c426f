//! Column coercion from raw stored values to typed record fields.
//!
//! SQLite keeps UUIDs and timestamps as text, and PostgreSQL text casts look
//! slightly different again; every accessor here accepts both shapes.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::core::{RawRow, SqlValue};

/// Timestamp layouts with a UTC offset (`+00`, `+00:00`, `+0000`, `Z`).
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Timestamp layouts without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A column that is missing or cannot be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub column: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(column: &str, reason: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    fn incompatible(column: &str, expected: &str, found: &SqlValue) -> Self {
        Self::new(
            column,
            format!("expected {}, found {} value {:?}", expected, found.type_name(), found),
        )
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}: {}", self.column, self.reason)
    }
}

impl std::error::Error for FieldError {}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

fn value<'a>(row: &'a RawRow, column: &str) -> FieldResult<&'a SqlValue> {
    row.get(column)
        .ok_or_else(|| FieldError::new(column, "missing column"))
}

fn nullable<'a>(row: &'a RawRow, column: &str) -> FieldResult<Option<&'a SqlValue>> {
    match value(row, column)? {
        SqlValue::Null => Ok(None),
        v => Ok(Some(v)),
    }
}

fn required<'a>(row: &'a RawRow, column: &str) -> FieldResult<&'a SqlValue> {
    nullable(row, column)?.ok_or_else(|| FieldError::new(column, "unexpected NULL"))
}

/// Read a non-null UUID.
pub fn uuid(row: &RawRow, column: &str) -> FieldResult<Uuid> {
    match required(row, column)? {
        SqlValue::Uuid(u) => Ok(*u),
        SqlValue::Text(s) => Uuid::parse_str(s.trim())
            .map_err(|e| FieldError::new(column, format!("invalid UUID {:?}: {}", s, e))),
        SqlValue::Bytes(b) => Uuid::from_slice(b)
            .map_err(|e| FieldError::new(column, format!("invalid UUID bytes: {}", e))),
        other => Err(FieldError::incompatible(column, "UUID", other)),
    }
}

/// Read a non-null text value.
pub fn text(row: &RawRow, column: &str) -> FieldResult<String> {
    match required(row, column)? {
        SqlValue::Text(s) => Ok(s.clone()),
        other => Err(FieldError::incompatible(column, "text", other)),
    }
}

/// Read a nullable text value.
pub fn opt_text(row: &RawRow, column: &str) -> FieldResult<Option<String>> {
    match nullable(row, column)? {
        None => Ok(None),
        Some(SqlValue::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FieldError::incompatible(column, "text", other)),
    }
}

/// Read a non-null timestamp.
pub fn timestamp(row: &RawRow, column: &str) -> FieldResult<DateTime<Utc>> {
    to_timestamp(column, required(row, column)?)
}

/// Read a nullable timestamp. A bare date means midnight UTC.
pub fn opt_timestamp(row: &RawRow, column: &str) -> FieldResult<Option<DateTime<Utc>>> {
    nullable(row, column)?
        .map(|value| to_timestamp(column, value))
        .transpose()
}

fn to_timestamp(column: &str, value: &SqlValue) -> FieldResult<DateTime<Utc>> {
    match value {
        SqlValue::DateTime(dt) => Ok(*dt),
        SqlValue::Text(s) => parse_timestamp(s)
            .ok_or_else(|| FieldError::new(column, format!("invalid timestamp {:?}", s))),
        SqlValue::I64(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
            .ok_or_else(|| FieldError::new(column, format!("timestamp {} out of range", secs))),
        other => Err(FieldError::incompatible(column, "timestamp", other)),
    }
}

/// Read a nullable floating point number.
pub fn opt_float(row: &RawRow, column: &str) -> FieldResult<Option<f64>> {
    match nullable(row, column)? {
        None => Ok(None),
        Some(SqlValue::F64(v)) => Ok(Some(*v)),
        Some(SqlValue::I64(v)) => Ok(Some(*v as f64)),
        Some(SqlValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FieldError::new(column, format!("invalid number {:?}", s))),
        Some(other) => Err(FieldError::incompatible(column, "number", other)),
    }
}

/// Parse a timestamp in any of the layouts the two stores produce.
///
/// Values without an offset are taken as UTC; a bare date means midnight.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(midnight)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
