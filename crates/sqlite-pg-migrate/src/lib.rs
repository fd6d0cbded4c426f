//! # sqlite-pg-migrate
//!
//! SQLite to PostgreSQL migration library for the movie catalog.
//!
//! Copies the five catalog tables (`film_work`, `genre`, `person`,
//! `genre_film_work`, `person_film_work`) from a SQLite file into a
//! PostgreSQL schema with support for:
//!
//! - **Idempotent loads** using `INSERT … ON CONFLICT ("id") DO NOTHING`
//! - **Dependency ordering** through an explicit load plan
//! - **Optional batching** with one transaction per table
//! - **Consistency verification** with second-precision timestamp comparison
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod target;
pub mod transfer;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{RawRow, SourceReader, SqlValue, TargetWriter};
pub use error::{MigrateError, Result};
pub use model::{EntityKind, MappedTable, NormalizedRow, Record};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, RowCountCheck};
pub use pipeline::{LoadPlan, LoadStep};
pub use source::SqliteReader;
pub use target::PgWriter;
pub use transfer::{TableLoad, TableStats};
pub use verify::{Mismatch, TableVerifyResult, Verifier, VerifyResult};
