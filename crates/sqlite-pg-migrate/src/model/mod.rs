//! Record schemas and the mapper from raw rows to typed records.
//!
//! [`EntityKind`] names the five content tables and carries their column
//! sets and foreign-key references. Each kind has a typed [`Record`]
//! implementation in [`records`]; [`EntityKind::map_rows`] and
//! [`EntityKind::normalize_rows`] dispatch to them.

pub mod coerce;
pub mod records;

pub use records::{FilmWork, Genre, GenreFilmWork, Person, PersonFilmWork, WorkType};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{RawRow, SqlValue};
use crate::error::{MigrateError, Result};
use coerce::FieldResult;

/// One of the five content tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    FilmWork,
    Genre,
    Person,
    GenreFilmWork,
    PersonFilmWork,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::FilmWork,
        EntityKind::Genre,
        EntityKind::Person,
        EntityKind::GenreFilmWork,
        EntityKind::PersonFilmWork,
    ];

    /// Table name, identical in both stores.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::FilmWork => "film_work",
            EntityKind::Genre => "genre",
            EntityKind::Person => "person",
            EntityKind::GenreFilmWork => "genre_film_work",
            EntityKind::PersonFilmWork => "person_film_work",
        }
    }

    /// Resolve a table name.
    pub fn from_table(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.table_name() == name)
    }

    /// Declared columns, in load order. `id` is always first.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::FilmWork => &[
                "id",
                "title",
                "description",
                "creation_date",
                "rating",
                "type",
                "created_at",
                "updated_at",
                "file_path",
            ],
            EntityKind::Genre => &["id", "name", "description", "created_at", "updated_at"],
            EntityKind::Person => &["id", "full_name", "created_at", "updated_at"],
            EntityKind::GenreFilmWork => &["id", "film_work_id", "genre_id", "created_at"],
            EntityKind::PersonFilmWork => {
                &["id", "film_work_id", "person_id", "role", "created_at"]
            }
        }
    }

    /// Kinds whose rows this kind references through foreign keys.
    pub fn references(self) -> &'static [EntityKind] {
        match self {
            EntityKind::FilmWork | EntityKind::Genre | EntityKind::Person => &[],
            EntityKind::GenreFilmWork => &[EntityKind::FilmWork, EntityKind::Genre],
            EntityKind::PersonFilmWork => &[EntityKind::FilmWork, EntityKind::Person],
        }
    }

    /// Map raw rows into load-ready value rows.
    ///
    /// The first row that fails to map aborts the whole table.
    pub fn map_rows(self, rows: &[RawRow]) -> Result<MappedTable> {
        let rows = match self {
            EntityKind::FilmWork => to_values::<FilmWork>(rows)?,
            EntityKind::Genre => to_values::<Genre>(rows)?,
            EntityKind::Person => to_values::<Person>(rows)?,
            EntityKind::GenreFilmWork => to_values::<GenreFilmWork>(rows)?,
            EntityKind::PersonFilmWork => to_values::<PersonFilmWork>(rows)?,
        };
        Ok(MappedTable { kind: self, rows })
    }

    /// Map raw rows and render them for cross-store comparison.
    pub fn normalize_rows(self, rows: &[RawRow]) -> Result<Vec<NormalizedRow>> {
        match self {
            EntityKind::FilmWork => to_normalized::<FilmWork>(rows),
            EntityKind::Genre => to_normalized::<Genre>(rows),
            EntityKind::Person => to_normalized::<Person>(rows),
            EntityKind::GenreFilmWork => to_normalized::<GenreFilmWork>(rows),
            EntityKind::PersonFilmWork => to_normalized::<PersonFilmWork>(rows),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A typed row of one entity kind.
pub trait Record: Sized {
    /// The kind this record belongs to.
    const KIND: EntityKind;

    /// Build the record from a raw row, coercing each declared column.
    fn from_row(row: &RawRow) -> FieldResult<Self>;

    /// Primary identifier.
    fn id(&self) -> Uuid;

    /// Values in [`EntityKind::columns`] order.
    fn into_values(self) -> Vec<SqlValue>;

    /// Normalized field strings in [`EntityKind::columns`] order.
    fn normalized(&self) -> Vec<String>;
}

/// Rows of one kind, ready for the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTable {
    pub kind: EntityKind,
    pub rows: Vec<Vec<SqlValue>>,
}

impl MappedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A record rendered to canonical field strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub id: Uuid,
    pub fields: Vec<String>,
}

/// Map every row into `R`, failing on the first malformed one.
pub fn map_records<R: Record>(rows: &[RawRow]) -> Result<Vec<R>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            R::from_row(row).map_err(|e| {
                MigrateError::malformed(R::KIND.table_name(), idx, id_hint(row), e.to_string())
            })
        })
        .collect()
}

fn to_values<R: Record>(rows: &[RawRow]) -> Result<Vec<Vec<SqlValue>>> {
    Ok(map_records::<R>(rows)?
        .into_iter()
        .map(Record::into_values)
        .collect())
}

fn to_normalized<R: Record>(rows: &[RawRow]) -> Result<Vec<NormalizedRow>> {
    Ok(map_records::<R>(rows)?
        .iter()
        .map(|r| NormalizedRow {
            id: r.id(),
            fields: r.normalized(),
        })
        .collect())
}

/// Best-effort row identifier for error messages.
fn id_hint(row: &RawRow) -> Option<String> {
    match row.get("id")? {
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Uuid(u) => Some(u.to_string()),
        SqlValue::I64(n) => Some(n.to_string()),
        _ => None,
    }
}
