//! Store traits used by the orchestrator and verifier.
//!
//! - [`SourceReader`]: reads whole tables from the source store
//! - [`TargetWriter`]: loads tables into, and reads them back from, the
//!   target store
//!
//! Both are object-safe so the orchestrator can hold them as
//! `Arc<dyn ...>` and tests can substitute in-memory stores.

use async_trait::async_trait;

use crate::error::Result;
use crate::transfer::TableLoad;

use super::value::RawRow;

/// Read data from the source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Read every row of `table`.
    ///
    /// With `ordered` the rows come back sorted by `id`; otherwise in the
    /// store's natural order.
    async fn read_table(&self, table: &str, ordered: bool) -> Result<Vec<RawRow>>;

    /// Get the row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

/// Write data to, and read it back from, the target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Insert the rows of one table, skipping rows whose `id` already exists.
    ///
    /// The load is all-or-nothing for the table. Returns the number of rows
    /// actually inserted.
    async fn load_table(&self, load: &TableLoad) -> Result<u64>;

    /// Read every row of `table`, optionally sorted by `id`.
    async fn read_table(&self, table: &str, ordered: bool) -> Result<Vec<RawRow>>;

    /// Get the row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}
