//! Type definitions for consistency verification.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{MigrateError, Result};

/// Which store a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    Source,
    Target,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Source => f.write_str("source"),
            Store::Target => f.write_str("target"),
        }
    }
}

/// One discrepancy between the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// The stores hold a different number of rows.
    RowCount { source: usize, target: usize },

    /// An id occurs more than once in one store.
    DuplicateId { store: Store, id: Uuid },

    /// Present in the source only.
    MissingInTarget { id: Uuid },

    /// Present in the target only.
    MissingInSource { id: Uuid },

    /// A field differs between rows with the same id.
    Field {
        index: usize,
        id: Uuid,
        field: String,
        source: String,
        target: String,
    },

    /// A target column that does not coerce to its declared type.
    ///
    /// `id` is `None` when the id itself is unreadable; such rows take no
    /// part in the comparison.
    Unreadable {
        index: usize,
        id: Option<Uuid>,
        field: String,
        reason: String,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::RowCount { source, target } => {
                write!(f, "row count differs: source={} target={}", source, target)
            }
            Mismatch::DuplicateId { store, id } => {
                write!(f, "duplicate id {} in {}", id, store)
            }
            Mismatch::MissingInTarget { id } => write!(f, "id {} missing in target", id),
            Mismatch::MissingInSource { id } => write!(f, "id {} missing in source", id),
            Mismatch::Field {
                index,
                id,
                field,
                source,
                target,
            } => write!(
                f,
                "row {} (id {}) field {}: source={:?} target={:?}",
                index, id, field, source, target
            ),
            Mismatch::Unreadable {
                index,
                id,
                field,
                reason,
            } => {
                write!(f, "target row {}", index)?;
                if let Some(id) = id {
                    write!(f, " (id {})", id)?;
                }
                write!(f, " field {} unreadable: {}", field, reason)
            }
        }
    }
}

/// Result of verifying one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableVerifyResult {
    /// Table name.
    pub table: String,

    /// Rows read from the source.
    pub source_rows: usize,

    /// Rows read from the target.
    pub target_rows: usize,

    /// Every discrepancy found.
    pub mismatches: Vec<Mismatch>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl TableVerifyResult {
    /// True when both stores hold identical normalized content.
    pub fn in_sync(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Result of a full verification pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Per-table results in load-plan order.
    pub tables: Vec<TableVerifyResult>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl VerifyResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table result.
    pub fn add_table(&mut self, result: TableVerifyResult) {
        self.tables.push(result);
    }

    /// True when no table reported a mismatch.
    pub fn is_consistent(&self) -> bool {
        self.tables.iter().all(TableVerifyResult::in_sync)
    }

    /// Total number of mismatches across tables.
    pub fn mismatch_count(&self) -> usize {
        self.tables.iter().map(|t| t.mismatches.len()).sum()
    }

    /// Turn any mismatch into [`MigrateError::Verification`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_consistent() {
            return Ok(self);
        }

        let mut summary = format!("{} mismatch(es)", self.mismatch_count());
        for table in self.tables.iter().filter(|t| !t.in_sync()) {
            summary.push_str(&format!("\n  {}:", table.table));
            for mismatch in table.mismatches.iter().take(10) {
                summary.push_str(&format!("\n    {}", mismatch));
            }
            if table.mismatches.len() > 10 {
                summary.push_str(&format!(
                    "\n    ... and {} more",
                    table.mismatches.len() - 10
                ));
            }
        }
        Err(MigrateError::Verification(summary))
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
