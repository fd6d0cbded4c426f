//! Consistency verification between the SQLite source and PostgreSQL target.
//!
//! For each table both stores are read in full, sorted by id in memory and
//! rendered to canonical strings (see [`normalize`]). Source rows go through
//! the strict record mapper. Target rows are rendered column by column, so
//! drifted target data shows up as [`Mismatch::Unreadable`] and field
//! differences instead of aborting the run. The comparison then runs in three
//! steps:
//!
//! - **Uniqueness**: duplicate ids on either side are reported first
//! - **Membership**: row-count differences and ids present on one side only
//! - **Content**: when the id sets match one-to-one, row `k` of each side is
//!   compared field by field
//!
//! Verification never writes to either store.

pub mod normalize;
pub mod types;

pub use types::{Mismatch, Store, TableVerifyResult, VerifyResult};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{RawRow, SourceReader, TargetWriter};
use crate::error::Result;
use crate::model::{EntityKind, NormalizedRow};
use crate::pipeline::LoadPlan;

/// Engine for verifying that the target mirrors the source.
pub struct Verifier {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

impl Verifier {
    /// Create a new verifier over open stores.
    pub fn new(source: Arc<dyn SourceReader>, target: Arc<dyn TargetWriter>) -> Self {
        Self { source, target }
    }

    /// Verify a single table.
    pub async fn verify_table(&self, kind: EntityKind) -> Result<TableVerifyResult> {
        let start = Instant::now();
        let table = kind.table_name();

        let source_rows = self.source.read_table(table, true).await?;
        let target_rows = self.target.read_table(table, true).await?;
        debug!(
            "{}: read {} source rows, {} target rows",
            table,
            source_rows.len(),
            target_rows.len()
        );

        let source = kind.normalize_rows(&source_rows)?;
        let (target, unreadable) = render_rows(kind, &target_rows);

        let mut result = compare(kind, source, target);
        result.mismatches.extend(unreadable);
        result.duration_ms = start.elapsed().as_millis() as u64;

        if result.in_sync() {
            info!("{}: {} rows (match)", table, result.source_rows);
        } else {
            warn!(
                "{}: {} mismatch(es), source={} target={}",
                table,
                result.mismatches.len(),
                result.source_rows,
                result.target_rows
            );
        }
        Ok(result)
    }

    /// Verify every table of the plan in plan order.
    pub async fn verify_all(&self, plan: &LoadPlan) -> Result<VerifyResult> {
        let start = Instant::now();
        let mut result = VerifyResult::new();

        for kind in plan.kinds() {
            result.add_table(self.verify_table(kind).await?);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Verification complete: {} tables, {} mismatch(es)",
            result.tables.len(),
            result.mismatch_count()
        );
        Ok(result)
    }
}

/// Compare the normalized rows of one table.
///
/// Input order does not matter; both sides are sorted by id first.
pub fn compare(
    kind: EntityKind,
    mut source: Vec<NormalizedRow>,
    mut target: Vec<NormalizedRow>,
) -> TableVerifyResult {
    source.sort_by_key(|r| r.id);
    target.sort_by_key(|r| r.id);

    let mut mismatches = Vec::new();
    let source_dupes = duplicate_ids(&source);
    let target_dupes = duplicate_ids(&target);
    let unique = source_dupes.is_empty() && target_dupes.is_empty();

    mismatches.extend(source_dupes.into_iter().map(|id| Mismatch::DuplicateId {
        store: Store::Source,
        id,
    }));
    mismatches.extend(target_dupes.into_iter().map(|id| Mismatch::DuplicateId {
        store: Store::Target,
        id,
    }));

    if source.len() != target.len() {
        mismatches.push(Mismatch::RowCount {
            source: source.len(),
            target: target.len(),
        });
    }

    let source_ids: BTreeSet<Uuid> = source.iter().map(|r| r.id).collect();
    let target_ids: BTreeSet<Uuid> = target.iter().map(|r| r.id).collect();
    let mut same_ids = true;
    for id in source_ids.difference(&target_ids) {
        same_ids = false;
        mismatches.push(Mismatch::MissingInTarget { id: *id });
    }
    for id in target_ids.difference(&source_ids) {
        same_ids = false;
        mismatches.push(Mismatch::MissingInSource { id: *id });
    }

    if unique && same_ids {
        let columns = kind.columns();
        for (index, (s, t)) in source.iter().zip(&target).enumerate() {
            for (col, (sv, tv)) in s.fields.iter().zip(&t.fields).enumerate() {
                if sv != tv {
                    mismatches.push(Mismatch::Field {
                        index,
                        id: s.id,
                        field: columns.get(col).copied().unwrap_or("?").to_string(),
                        source: sv.clone(),
                        target: tv.clone(),
                    });
                }
            }
        }
    }

    TableVerifyResult {
        table: kind.table_name().to_string(),
        source_rows: source.len(),
        target_rows: target.len(),
        mismatches,
        duration_ms: 0,
    }
}

/// Render rows column by column without rejecting any of them.
///
/// A column that fails to coerce keeps its raw rendering and is reported as
/// [`Mismatch::Unreadable`]. Rows with an unreadable id are dropped.
pub fn render_rows(kind: EntityKind, rows: &[RawRow]) -> (Vec<NormalizedRow>, Vec<Mismatch>) {
    let mut rendered = Vec::with_capacity(rows.len());
    let mut unreadable = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let id = match crate::model::coerce::uuid(row, "id") {
            Ok(id) => id,
            Err(e) => {
                unreadable.push(Mismatch::Unreadable {
                    index,
                    id: None,
                    field: e.column,
                    reason: e.reason,
                });
                continue;
            }
        };

        let fields = kind
            .columns()
            .iter()
            .map(|column| {
                normalize::column(row, column).unwrap_or_else(|e| {
                    unreadable.push(Mismatch::Unreadable {
                        index,
                        id: Some(id),
                        field: e.column,
                        reason: e.reason,
                    });
                    normalize::raw(row.get(column))
                })
            })
            .collect();
        rendered.push(NormalizedRow { id, fields });
    }

    (rendered, unreadable)
}

/// Ids occurring more than once in a sorted slice, each reported once.
fn duplicate_ids(rows: &[NormalizedRow]) -> Vec<Uuid> {
    let mut dupes: Vec<Uuid> = rows
        .windows(2)
        .filter(|w| w[0].id == w[1].id)
        .map(|w| w[0].id)
        .collect();
    dupes.dedup();
    dupes
}
