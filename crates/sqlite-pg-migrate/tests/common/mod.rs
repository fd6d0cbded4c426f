//! Shared fixtures for the library integration tests.
//!
//! `SourceDb` builds a real SQLite file with the catalog schema. `MemoryTarget`
//! stands in for PostgreSQL: it skips rows whose id already exists, rejects
//! link rows whose referenced rows are absent, and applies each table load
//! all-or-nothing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlite_pg_migrate::{
    Config, EntityKind, MigrateError, Orchestrator, RawRow, Result, SourceReader, SqlValue,
    SqliteReader, TableLoad, TargetWriter,
};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;
use uuid::Uuid;

pub const FILM_MATRIX: &str = "3d825f60-9fff-4dfe-b294-1a45fa1e115d";
pub const FILM_ALIEN: &str = "0312ed51-8833-413f-bff5-0e139c11264a";
pub const GENRE_ACTION: &str = "3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff";
pub const GENRE_DRAMA: &str = "1cacff68-643e-4ddd-8f57-84b62538081a";
pub const PERSON_KEANU: &str = "26e83050-29ef-4163-a99d-b546cac208f8";
pub const PERSON_SIGOURNEY: &str = "5b4bf1bc-3397-4e83-9b17-8b10c6544ed1";

const SCHEMA: &[&str] = &[
    "CREATE TABLE film_work (id TEXT PRIMARY KEY, title TEXT NOT NULL, description TEXT, \
     creation_date DATE, file_path TEXT, rating FLOAT, type TEXT NOT NULL, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE genre (id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE person (id TEXT PRIMARY KEY, full_name TEXT NOT NULL, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE genre_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL, \
     genre_id TEXT NOT NULL, created_at timestamp with time zone)",
    "CREATE TABLE person_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL, \
     person_id TEXT NOT NULL, role TEXT, created_at timestamp with time zone)",
];

const SAMPLE_DATA: &[&str] = &[
    "INSERT INTO film_work VALUES \
     ('3d825f60-9fff-4dfe-b294-1a45fa1e115d', 'The Matrix', 'A hacker learns the truth.', \
      '1999-03-31', NULL, 87.5, 'movie', '2021-06-16 20:14:09.310212+00', '2021-06-16 20:14:09.310228+00'), \
     ('0312ed51-8833-413f-bff5-0e139c11264a', 'Alien', NULL, NULL, NULL, NULL, 'movie', \
      '2021-06-16 20:14:09.309735+00', '2021-06-16 20:14:09.309751+00')",
    "INSERT INTO genre VALUES \
     ('3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', 'Action', NULL, '2021-06-16 20:14:09.309735+00', '2021-06-16 20:14:09.309735+00'), \
     ('1cacff68-643e-4ddd-8f57-84b62538081a', 'Drama', '', '2021-06-16 20:14:09.221855+00', '2021-06-16 20:14:09.221855+00')",
    "INSERT INTO person VALUES \
     ('26e83050-29ef-4163-a99d-b546cac208f8', 'Keanu Reeves', '2021-06-16 20:14:09.221855+00', '2021-06-16 20:14:09.221855+00'), \
     ('5b4bf1bc-3397-4e83-9b17-8b10c6544ed1', 'Sigourney Weaver', '2021-06-16 20:14:09.221855+00', '2021-06-16 20:14:09.221855+00')",
    "INSERT INTO genre_film_work VALUES \
     ('9b0a0a2c-2d3b-4b4f-9d4e-1a1b1c1d1e01', '3d825f60-9fff-4dfe-b294-1a45fa1e115d', '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', '2021-06-16 20:14:09.221855+00'), \
     ('9b0a0a2c-2d3b-4b4f-9d4e-1a1b1c1d1e02', '0312ed51-8833-413f-bff5-0e139c11264a', '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', '2021-06-16 20:14:09.221855+00'), \
     ('9b0a0a2c-2d3b-4b4f-9d4e-1a1b1c1d1e03', '0312ed51-8833-413f-bff5-0e139c11264a', '1cacff68-643e-4ddd-8f57-84b62538081a', '2021-06-16 20:14:09.221855+00')",
    "INSERT INTO person_film_work VALUES \
     ('7c1e2f3a-4b5c-4d6e-8f70-81a2b3c4d501', '3d825f60-9fff-4dfe-b294-1a45fa1e115d', '26e83050-29ef-4163-a99d-b546cac208f8', 'actor', '2021-06-16 20:14:09.221855+00'), \
     ('7c1e2f3a-4b5c-4d6e-8f70-81a2b3c4d502', '0312ed51-8833-413f-bff5-0e139c11264a', '5b4bf1bc-3397-4e83-9b17-8b10c6544ed1', 'actor', '2021-06-16 20:14:09.221855+00'), \
     ('7c1e2f3a-4b5c-4d6e-8f70-81a2b3c4d503', '0312ed51-8833-413f-bff5-0e139c11264a', '26e83050-29ef-4163-a99d-b546cac208f8', NULL, '2021-06-16 20:14:09.221855+00')",
];

/// Rows in each table of the sample data set.
pub const SAMPLE_COUNTS: [(&str, usize); 5] = [
    ("film_work", 2),
    ("genre", 2),
    ("person", 2),
    ("genre_film_work", 3),
    ("person_film_work", 3),
];

/// A SQLite source database in a temporary directory.
pub struct SourceDb {
    _dir: TempDir,
    path: PathBuf,
}

impl SourceDb {
    /// Create the catalog schema with no rows.
    pub async fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        let db = Self { _dir: dir, path };
        db.execute(SCHEMA).await;
        db
    }

    /// Create the catalog schema filled with the sample data set.
    pub async fn sample() -> Self {
        let db = Self::empty().await;
        db.execute(SAMPLE_DATA).await;
        db
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run statements against the database.
    pub async fn execute(&self, statements: &[&str]) {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        for sql in statements {
            sqlx::query(sql).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    }

    pub async fn reader(&self) -> Arc<SqliteReader> {
        Arc::new(SqliteReader::open(&self.path).await.unwrap())
    }

    /// Configuration pointing at this database and a placeholder target.
    pub fn config(&self, batch_size: Option<usize>) -> Config {
        let mut yaml = format!(
            "source:\n  path: {:?}\ntarget:\n  host: localhost\n  database: movies_database\n  user: app\n",
            self.path.display().to_string()
        );
        if let Some(size) = batch_size {
            yaml.push_str(&format!("migration:\n  batch_size: {}\n", size));
        }
        Config::from_yaml(&yaml).unwrap()
    }

    /// Orchestrator reading this database and writing to `target`.
    pub async fn orchestrator(
        &self,
        target: &Arc<MemoryTarget>,
        batch_size: Option<usize>,
    ) -> Orchestrator {
        let source: Arc<dyn SourceReader> = self.reader().await;
        let target: Arc<dyn TargetWriter> = target.clone();
        Orchestrator::with_stores(self.config(batch_size), source, target)
    }
}

/// In-memory stand-in for the PostgreSQL target.
#[derive(Default)]
pub struct MemoryTarget {
    tables: Mutex<HashMap<EntityKind, Vec<Vec<SqlValue>>>>,
    statements: Mutex<Vec<(EntityKind, usize)>>,
    closed: AtomicBool,
}

impl MemoryTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert rows directly, bypassing conflict and reference checks.
    pub fn seed(&self, kind: EntityKind, rows: Vec<Vec<SqlValue>>) {
        self.tables
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .extend(rows);
    }

    /// Stored rows of a table in insertion order.
    pub fn rows(&self, kind: EntityKind) -> Vec<Vec<SqlValue>> {
        self.tables
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.rows(kind).len()
    }

    /// Row with the given id, if stored.
    pub fn find(&self, kind: EntityKind, id: &str) -> Option<Vec<SqlValue>> {
        let id = Uuid::parse_str(id).unwrap();
        self.rows(kind)
            .into_iter()
            .find(|row| row.first() == Some(&SqlValue::Uuid(id)))
    }

    /// `(table, rows)` of every INSERT statement received.
    pub fn statements(&self) -> Vec<(EntityKind, usize)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Set a stored field, for simulating drift between the stores.
    pub fn update(&self, kind: EntityKind, id: &str, column: &str, value: SqlValue) {
        let id = Uuid::parse_str(id).unwrap();
        let col = kind.columns().iter().position(|c| *c == column).unwrap();
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(&kind)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.first() == Some(&SqlValue::Uuid(id)))
            })
            .unwrap();
        row[col] = value;
    }
}

fn ids(rows: Option<&Vec<Vec<SqlValue>>>) -> Vec<SqlValue> {
    rows.map(|rows| rows.iter().map(|r| r[0].clone()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn load_table(&self, load: &TableLoad) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let mut staged = tables.get(&load.kind).cloned().unwrap_or_default();
        let batches = load.batch_count();
        let mut inserted = 0u64;

        for (idx, batch) in load.batches().enumerate() {
            self.statements
                .lock()
                .unwrap()
                .push((load.kind, batch.len()));

            for row in batch {
                if staged.iter().any(|existing| existing[0] == row[0]) {
                    continue;
                }

                for (offset, referenced) in load.kind.references().iter().enumerate() {
                    let col = offset + 1;
                    if !ids(tables.get(referenced)).contains(&row[col]) {
                        let cause = MigrateError::ConstraintViolation {
                            table: load.table().to_string(),
                            constraint: format!("{}_{}_fkey", load.table(), load.columns()[col]),
                            message: format!(
                                "insert or update on table \"{}\" violates foreign key constraint",
                                load.table()
                            ),
                        };
                        return Err(if batches > 1 {
                            MigrateError::BatchFailed {
                                table: load.table().to_string(),
                                batch: idx + 1,
                                batches,
                                source: Box::new(cause),
                            }
                        } else {
                            cause
                        });
                    }
                }

                staged.push(row.clone());
                inserted += 1;
            }
        }

        tables.insert(load.kind, staged);
        Ok(inserted)
    }

    async fn read_table(&self, table: &str, ordered: bool) -> Result<Vec<RawRow>> {
        let kind = EntityKind::from_table(table)
            .ok_or_else(|| MigrateError::Config(format!("unknown table: {}", table)))?;
        let mut rows = self.rows(kind);
        if ordered {
            rows.sort_by_key(|row| match &row[0] {
                SqlValue::Uuid(id) => *id,
                _ => Uuid::nil(),
            });
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                kind.columns()
                    .iter()
                    .map(|c| c.to_string())
                    .zip(row)
                    .collect()
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let kind = EntityKind::from_table(table)
            .ok_or_else(|| MigrateError::Config(format!("unknown table: {}", table)))?;
        Ok(self.count(kind) as i64)
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
