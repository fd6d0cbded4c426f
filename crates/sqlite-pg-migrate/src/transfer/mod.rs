//! Table load units handed to the target writer.
//!
//! A [`TableLoad`] carries every mapped row of one table together with the
//! batch size. Without a batch size the whole table goes out as a single
//! statement; with one, rows are split into bounded batches that the writer
//! runs inside one transaction.

use serde::{Deserialize, Serialize};

use crate::core::SqlValue;
use crate::model::{EntityKind, MappedTable};

/// All rows of one table, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLoad {
    pub kind: EntityKind,
    pub rows: Vec<Vec<SqlValue>>,
    batch_size: Option<usize>,
}

impl TableLoad {
    /// Create a load. A `batch_size` of zero is treated as unbatched.
    pub fn new(table: MappedTable, batch_size: Option<usize>) -> Self {
        Self {
            kind: table.kind,
            rows: table.rows,
            batch_size: batch_size.filter(|&n| n > 0),
        }
    }

    /// Destination table name.
    pub fn table(&self) -> &'static str {
        self.kind.table_name()
    }

    /// Column names in value order.
    pub fn columns(&self) -> &'static [&'static str] {
        self.kind.columns()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows per statement.
    pub fn batch_len(&self) -> usize {
        self.batch_size.unwrap_or(self.rows.len()).max(1)
    }

    /// Number of statements this load needs.
    pub fn batch_count(&self) -> usize {
        self.rows.len().div_ceil(self.batch_len())
    }

    /// Iterate the row batches in order.
    pub fn batches(&self) -> std::slice::Chunks<'_, Vec<SqlValue>> {
        self.rows.chunks(self.batch_len())
    }
}

/// Per-table outcome of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    /// Table name.
    pub table: String,

    /// Rows read from the source.
    pub rows_read: u64,

    /// Rows inserted into the target.
    pub rows_inserted: u64,

    /// Rows skipped because their id already existed in the target.
    pub rows_skipped: u64,

    /// Number of INSERT statements issued.
    pub batches: usize,

    /// Time spent on the table in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(rows: usize) -> MappedTable {
        MappedTable {
            kind: EntityKind::Person,
            rows: (0..rows).map(|i| vec![SqlValue::I64(i as i64)]).collect(),
        }
    }

    #[test]
    fn test_unbatched_load_is_one_statement() {
        let load = TableLoad::new(mapped(7), None);
        assert_eq!(load.batch_count(), 1);
        assert_eq!(load.batches().next().map(<[_]>::len), Some(7));
        assert_eq!(load.table(), "person");
    }

    #[test]
    fn test_batched_load_splits_rows() {
        let load = TableLoad::new(mapped(7), Some(3));
        assert_eq!(load.batch_count(), 3);
        let sizes: Vec<usize> = load.batches().map(<[_]>::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_batch_larger_than_table() {
        let load = TableLoad::new(mapped(2), Some(500));
        assert_eq!(load.batch_count(), 1);
    }

    #[test]
    fn test_empty_load_has_no_batches() {
        let load = TableLoad::new(mapped(0), None);
        assert!(load.is_empty());
        assert_eq!(load.batch_count(), 0);
        assert_eq!(load.batches().count(), 0);
    }

    #[test]
    fn test_zero_batch_size_means_unbatched() {
        let load = TableLoad::new(mapped(4), Some(0));
        assert_eq!(load.batch_count(), 1);
    }
}
