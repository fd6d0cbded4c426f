//! Cross-store value normalization for field comparison.
//!
//! Both stores are read back into typed records and each field is rendered
//! to a canonical string:
//!
//! - NULLs: the literal string `NULL`
//! - Timestamps: UTC, second precision, `YYYY-MM-DD HH:MM:SS`
//! - UUIDs: lowercase hyphenated
//! - Floats: shortest round-trip representation

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{RawRow, SqlValue};
use crate::model::coerce::{self, parse_timestamp, FieldResult};

/// Rendering used for NULL fields.
pub const NULL: &str = "NULL";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalize a timestamp to second precision, dropping the fraction.
pub fn timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Normalize a timestamp given as text.
///
/// Returns `None` when the text is not a timestamp in a known layout.
pub fn timestamp_str(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| timestamp(&dt))
}

/// Normalize an optional timestamp.
pub fn opt_timestamp(value: Option<&DateTime<Utc>>) -> String {
    value.map_or_else(|| NULL.to_string(), timestamp)
}

/// Normalize a UUID.
pub fn uuid(value: &Uuid) -> String {
    value.hyphenated().to_string()
}

/// Normalize an optional float.
pub fn float(value: Option<f64>) -> String {
    value.map_or_else(|| NULL.to_string(), |v| v.to_string())
}

/// Normalize optional text.
pub fn text(value: Option<&str>) -> String {
    value.map_or_else(|| NULL.to_string(), str::to_string)
}

/// Normalize one column of a raw row by its name.
///
/// Renders valid values exactly like the typed records do, but checks only
/// the column's own type and nullability. Range and enum checks are left to
/// the field comparison.
pub fn column(row: &RawRow, column: &str) -> FieldResult<String> {
    match column {
        "id" | "film_work_id" | "genre_id" | "person_id" => {
            coerce::uuid(row, column).map(|id| uuid(&id))
        }
        "created_at" | "updated_at" => coerce::timestamp(row, column).map(|dt| timestamp(&dt)),
        "creation_date" => {
            coerce::opt_timestamp(row, column).map(|dt| opt_timestamp(dt.as_ref()))
        }
        "rating" => coerce::opt_float(row, column).map(float),
        "description" | "file_path" | "role" => {
            coerce::opt_text(row, column).map(|s| text(s.as_deref()))
        }
        _ => coerce::text(row, column),
    }
}

/// Render a stored value as-is, for columns that fail to coerce.
pub fn raw(value: Option<&SqlValue>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(SqlValue::Null) => NULL.to_string(),
        Some(SqlValue::I64(n)) => n.to_string(),
        Some(SqlValue::F64(n)) => n.to_string(),
        Some(SqlValue::Text(s)) => s.clone(),
        Some(SqlValue::Bytes(b)) => format!("<{} bytes>", b.len()),
        Some(SqlValue::Uuid(id)) => uuid(id),
        Some(SqlValue::DateTime(dt)) => timestamp(dt),
    }
}
