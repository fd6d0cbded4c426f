//! Migration orchestrator - main workflow coordinator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::{SourceReader, TargetWriter};
use crate::error::Result;
use crate::model::EntityKind;
use crate::pipeline::LoadPlan;
use crate::source::SqliteReader;
use crate::target::PgWriter;
use crate::transfer::{TableLoad, TableStats};
use crate::verify::{Verifier, VerifyResult};

/// Migration orchestrator.
///
/// Owns one handle to each store. Every public operation consumes the
/// orchestrator and closes both stores before returning, on success and on
/// failure alike.
pub struct Orchestrator {
    config: Config,
    plan: LoadPlan,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Whether the run skipped loading.
    pub dry_run: bool,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table results in load order.
    pub tables: Vec<TableStats>,

    /// Total rows read from the source.
    pub rows_read: u64,

    /// Total rows inserted into the target.
    pub rows_inserted: u64,

    /// Total rows skipped on id conflict.
    pub rows_skipped: u64,
}

/// Row counts of one table in both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCountCheck {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
    pub matches: bool,
}

/// Connectivity report for both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
}

impl Orchestrator {
    /// Connect to both stores.
    ///
    /// The source is opened first; if the target cannot be reached the source
    /// is closed again before the error is returned.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;

        let target = match PgWriter::new(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_stores(config, Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over already-open stores.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            plan: LoadPlan::content(),
            source,
            target,
        }
    }

    /// Replace the default load plan.
    pub fn with_plan(mut self, plan: LoadPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Run the migration.
    ///
    /// Tables load strictly one after another in plan order. The first
    /// failure aborts the run; tables loaded before it stay loaded.
    pub async fn run(self, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting migration run: {}", run_id);
        info!(
            "Source: {} ({}), target: {} (schema {})",
            self.source.db_type(),
            self.config.source.path.display(),
            self.target.db_type(),
            self.config.target.schema
        );
        if dry_run {
            info!("Dry run: rows will be extracted and mapped but not loaded");
        }

        let outcome = self.load_all(dry_run).await;
        self.close().await;
        let tables = outcome?;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = MigrationResult {
            run_id,
            status: if dry_run { "dry_run" } else { "completed" }.to_string(),
            dry_run,
            started_at,
            completed_at,
            duration_seconds: duration,
            rows_read: tables.iter().map(|t| t.rows_read).sum(),
            rows_inserted: tables.iter().map(|t| t.rows_inserted).sum(),
            rows_skipped: tables.iter().map(|t| t.rows_skipped).sum(),
            tables,
        };

        info!(
            "Migration {}: {} rows read, {} inserted, {} skipped in {:.2}s",
            result.status,
            result.rows_read,
            result.rows_inserted,
            result.rows_skipped,
            result.duration_seconds
        );

        Ok(result)
    }

    async fn load_all(&self, dry_run: bool) -> Result<Vec<TableStats>> {
        let total = self.plan.steps().len();
        let mut stats = Vec::with_capacity(total);

        for (idx, kind) in self.plan.kinds().enumerate() {
            info!("Step {}/{}: {}", idx + 1, total, kind);
            stats.push(self.load_table(kind, dry_run).await?);
        }

        Ok(stats)
    }

    /// Extract, map and load one table.
    async fn load_table(&self, kind: EntityKind, dry_run: bool) -> Result<TableStats> {
        let start = Instant::now();
        let table = kind.table_name();

        let raw = self.source.read_table(table, true).await?;
        let rows_read = raw.len() as u64;
        debug!("Extracted {} rows from {}", rows_read, table);

        if raw.is_empty() {
            warn!("Table {} is empty in source, skipping", table);
            return Ok(TableStats {
                table: table.to_string(),
                rows_read: 0,
                rows_inserted: 0,
                rows_skipped: 0,
                batches: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let mapped = kind.map_rows(&raw)?;
        let load = TableLoad::new(mapped, self.config.migration.batch_size);

        let (rows_inserted, batches) = if dry_run {
            info!(
                "{}: {} rows mapped, {} batch(es) (dry run, nothing loaded)",
                table,
                load.len(),
                load.batch_count()
            );
            (0, 0)
        } else {
            let inserted = self.target.load_table(&load).await?;
            (inserted, load.batch_count())
        };

        let rows_skipped = if dry_run {
            0
        } else {
            rows_read.saturating_sub(rows_inserted)
        };

        if !dry_run {
            info!(
                "{}: {} rows read, {} inserted, {} skipped",
                table, rows_read, rows_inserted, rows_skipped
            );
        }

        Ok(TableStats {
            table: table.to_string(),
            rows_read,
            rows_inserted,
            rows_skipped,
            batches,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run the consistency verifier over every table of the plan.
    ///
    /// Mismatches are part of the returned result; use
    /// [`VerifyResult::into_result`] to treat them as an error.
    pub async fn verify(self) -> Result<VerifyResult> {
        info!("Verifying target against source");
        let verifier = Verifier::new(Arc::clone(&self.source), Arc::clone(&self.target));
        let outcome = verifier.verify_all(&self.plan).await;
        self.close().await;
        outcome
    }

    /// Validate row counts between source and target.
    pub async fn validate(self) -> Result<Vec<RowCountCheck>> {
        let outcome = self.count_all().await;
        self.close().await;
        outcome
    }

    async fn count_all(&self) -> Result<Vec<RowCountCheck>> {
        let mut results = Vec::new();

        for kind in self.plan.kinds() {
            let table = kind.table_name();
            let source_rows = self.source.row_count(table).await?;
            let target_rows = self.target.row_count(table).await?;
            let matches = source_rows == target_rows;

            if matches {
                info!("{}: {} rows (match)", table, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table, source_rows, target_rows
                );
            }

            results.push(RowCountCheck {
                table: table.to_string(),
                source_rows,
                target_rows,
                matches,
            });
        }

        Ok(results)
    }

    /// Ping both open stores and report latency.
    pub async fn health_check(self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        self.close().await;

        Ok(HealthCheckResult::new(
            source,
            source_latency_ms,
            target,
            target_latency_ms,
        ))
    }

    /// Connect to each store on its own and report which ones answer.
    ///
    /// A store that cannot be opened does not stop the check; its error is
    /// part of the report.
    pub async fn check_connections(config: &Config) -> HealthCheckResult {
        let start = Instant::now();
        let source = match SqliteReader::new(&config.source).await {
            Ok(reader) => {
                let outcome = reader.test_connection().await;
                reader.close().await;
                outcome
            }
            Err(e) => Err(e),
        };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = match PgWriter::new(&config.target).await {
            Ok(writer) => {
                let outcome = writer.test_connection().await;
                writer.close().await;
                outcome
            }
            Err(e) => Err(e),
        };
        let target_latency_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = &source {
            warn!("Source health check failed: {}", e);
        }
        if let Err(e) = &target {
            warn!("Target health check failed: {}", e);
        }

        HealthCheckResult::new(source, source_latency_ms, target, target_latency_ms)
    }

    async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        debug!("Closed source and target connections");
    }
}

impl HealthCheckResult {
    fn new(
        source: Result<()>,
        source_latency_ms: u64,
        target: Result<()>,
        target_latency_ms: u64,
    ) -> Self {
        Self {
            healthy: source.is_ok() && target.is_ok(),
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
        }
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
