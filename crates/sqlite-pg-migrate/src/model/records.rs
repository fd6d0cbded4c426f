//! Typed records for the five content tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::coerce::{self, FieldError, FieldResult};
use super::{EntityKind, Record};
use crate::core::{RawRow, SqlValue};
use crate::verify::normalize;

/// Lowest accepted rating.
pub const MIN_RATING: f64 = 0.0;
/// Highest accepted rating.
pub const MAX_RATING: f64 = 100.0;

/// Kind of film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkType {
    Movie,
    TvShow,
}

impl WorkType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkType::Movie => "movie",
            WorkType::TvShow => "tv_show",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(WorkType::Movie),
            "tv_show" => Ok(WorkType::TvShow),
            other => Err(format!(
                "unknown work type {:?}, expected \"movie\" or \"tv_show\"",
                other
            )),
        }
    }
}

/// A film or TV show (`film_work`).
#[derive(Debug, Clone, PartialEq)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub rating: Option<f64>,
    pub work_type: WorkType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub file_path: Option<String>,
}

impl Record for FilmWork {
    const KIND: EntityKind = EntityKind::FilmWork;

    fn from_row(row: &RawRow) -> FieldResult<Self> {
        let rating = coerce::opt_float(row, "rating")?;
        if let Some(r) = rating {
            if !(MIN_RATING..=MAX_RATING).contains(&r) {
                return Err(FieldError::new(
                    "rating",
                    format!("{} outside [{}, {}]", r, MIN_RATING, MAX_RATING),
                ));
            }
        }

        let work_type = coerce::text(row, "type")?
            .parse::<WorkType>()
            .map_err(|e| FieldError::new("type", e))?;

        Ok(Self {
            id: coerce::uuid(row, "id")?,
            title: coerce::text(row, "title")?,
            description: coerce::opt_text(row, "description")?,
            creation_date: coerce::opt_timestamp(row, "creation_date")?,
            rating,
            work_type,
            created_at: coerce::timestamp(row, "created_at")?,
            updated_at: coerce::timestamp(row, "updated_at")?,
            file_path: coerce::opt_text(row, "file_path")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Text(self.title),
            self.description.into(),
            self.creation_date.map_or(SqlValue::Null, SqlValue::DateTime),
            self.rating.map_or(SqlValue::Null, SqlValue::F64),
            SqlValue::Text(self.work_type.as_str().to_string()),
            SqlValue::DateTime(self.created_at),
            SqlValue::DateTime(self.updated_at),
            self.file_path.into(),
        ]
    }

    fn normalized(&self) -> Vec<String> {
        vec![
            normalize::uuid(&self.id),
            self.title.clone(),
            normalize::text(self.description.as_deref()),
            normalize::opt_timestamp(self.creation_date.as_ref()),
            normalize::float(self.rating),
            self.work_type.to_string(),
            normalize::timestamp(&self.created_at),
            normalize::timestamp(&self.updated_at),
            normalize::text(self.file_path.as_deref()),
        ]
    }
}

/// A genre (`genre`).
#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Genre {
    const KIND: EntityKind = EntityKind::Genre;

    fn from_row(row: &RawRow) -> FieldResult<Self> {
        Ok(Self {
            id: coerce::uuid(row, "id")?,
            name: coerce::text(row, "name")?,
            description: coerce::opt_text(row, "description")?,
            created_at: coerce::timestamp(row, "created_at")?,
            updated_at: coerce::timestamp(row, "updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Text(self.name),
            self.description.into(),
            SqlValue::DateTime(self.created_at),
            SqlValue::DateTime(self.updated_at),
        ]
    }

    fn normalized(&self) -> Vec<String> {
        vec![
            normalize::uuid(&self.id),
            self.name.clone(),
            normalize::text(self.description.as_deref()),
            normalize::timestamp(&self.created_at),
            normalize::timestamp(&self.updated_at),
        ]
    }
}

/// A person credited on film works (`person`).
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Person {
    const KIND: EntityKind = EntityKind::Person;

    fn from_row(row: &RawRow) -> FieldResult<Self> {
        Ok(Self {
            id: coerce::uuid(row, "id")?,
            full_name: coerce::text(row, "full_name")?,
            created_at: coerce::timestamp(row, "created_at")?,
            updated_at: coerce::timestamp(row, "updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Text(self.full_name),
            SqlValue::DateTime(self.created_at),
            SqlValue::DateTime(self.updated_at),
        ]
    }

    fn normalized(&self) -> Vec<String> {
        vec![
            normalize::uuid(&self.id),
            self.full_name.clone(),
            normalize::timestamp(&self.created_at),
            normalize::timestamp(&self.updated_at),
        ]
    }
}

/// Link between a film work and a genre (`genre_film_work`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenreFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Record for GenreFilmWork {
    const KIND: EntityKind = EntityKind::GenreFilmWork;

    fn from_row(row: &RawRow) -> FieldResult<Self> {
        Ok(Self {
            id: coerce::uuid(row, "id")?,
            film_work_id: coerce::uuid(row, "film_work_id")?,
            genre_id: coerce::uuid(row, "genre_id")?,
            created_at: coerce::timestamp(row, "created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.film_work_id),
            SqlValue::Uuid(self.genre_id),
            SqlValue::DateTime(self.created_at),
        ]
    }

    fn normalized(&self) -> Vec<String> {
        vec![
            normalize::uuid(&self.id),
            normalize::uuid(&self.film_work_id),
            normalize::uuid(&self.genre_id),
            normalize::timestamp(&self.created_at),
        ]
    }
}

/// Link between a film work and a person, with their role (`person_film_work`).
#[derive(Debug, Clone, PartialEq)]
pub struct PersonFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for PersonFilmWork {
    const KIND: EntityKind = EntityKind::PersonFilmWork;

    fn from_row(row: &RawRow) -> FieldResult<Self> {
        Ok(Self {
            id: coerce::uuid(row, "id")?,
            film_work_id: coerce::uuid(row, "film_work_id")?,
            person_id: coerce::uuid(row, "person_id")?,
            role: coerce::opt_text(row, "role")?,
            created_at: coerce::timestamp(row, "created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.film_work_id),
            SqlValue::Uuid(self.person_id),
            self.role.into(),
            SqlValue::DateTime(self.created_at),
        ]
    }

    fn normalized(&self) -> Vec<String> {
        vec![
            normalize::uuid(&self.id),
            normalize::uuid(&self.film_work_id),
            normalize::uuid(&self.person_id),
            normalize::text(self.role.as_deref()),
            normalize::timestamp(&self.created_at),
        ]
    }
}
