//! PostgreSQL target writer.
//!
//! Loads tables with multi-row `INSERT … ON CONFLICT ("id") DO NOTHING`
//! statements built from escaped literals, so any table fits in one
//! statement regardless of the bind-parameter limit. Every batch of a table
//! runs in one transaction. Reads for verification cast every column to
//! text, which the record mapper parses the same way it parses SQLite text.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, SimpleQueryMessage};
use tracing::{debug, error, info, warn};

use crate::config::TargetConfig;
use crate::core::{RawRow, SqlValue, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::model::EntityKind;
use crate::transfer::TableLoad;

/// PostgreSQL target writer implementation.
pub struct PgWriter {
    pool: Pool,
    schema: String,
}

impl PgWriter {
    /// Connect to the PostgreSQL target.
    ///
    /// The pool is capped at one connection; the run never needs more.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(config.pg_config(), NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL target connection"))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring PostgreSQL connection"))
    }

    fn checked_table(table: &str) -> Result<EntityKind> {
        EntityKind::from_table(table)
            .ok_or_else(|| MigrateError::Config(format!("unknown table: {}", table)))
    }
}

#[async_trait]
impl TargetWriter for PgWriter {
    async fn load_table(&self, load: &TableLoad) -> Result<u64> {
        if load.is_empty() {
            return Ok(0);
        }

        let table = load.table();
        let batches = load.batch_count();
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        let mut inserted = 0u64;
        let mut offset = 0usize;
        for (idx, batch) in load.batches().enumerate() {
            let sql =
                build_insert_or_skip_sql(&self.schema, table, load.columns(), batch, offset)?;
            offset += batch.len();
            debug!(
                "Loading batch {}/{} of {}.{} ({} rows)",
                idx + 1,
                batches,
                self.schema,
                table,
                batch.len()
            );

            match tx.simple_query(&sql).await {
                Ok(messages) => inserted += rows_affected(&messages),
                Err(e) => {
                    if let Some(first_row) = batch.first() {
                        let row_preview: Vec<String> =
                            first_row.iter().take(5).map(|v| format!("{:?}", v)).collect();
                        error!(
                            "Insert failed for {}.{}: {} - first row preview: {:?}",
                            self.schema, table, e, row_preview
                        );
                    }
                    let cause = MigrateError::from_load(table, e);
                    if let Err(rb) = tx.rollback().await {
                        warn!("Rollback of {}.{} failed: {}", self.schema, table, rb);
                    }
                    return Err(if batches > 1 {
                        MigrateError::BatchFailed {
                            table: table.to_string(),
                            batch: idx + 1,
                            batches,
                            source: Box::new(cause),
                        }
                    } else {
                        cause
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn read_table(&self, table: &str, ordered: bool) -> Result<Vec<RawRow>> {
        let kind = Self::checked_table(table)?;
        let sql = build_select_text_sql(&self.schema, kind, ordered);
        debug!("PostgreSQL query: {}", sql);

        let client = self.client().await?;
        let rows = client.query(&sql, &[]).await?;

        let columns = kind.columns();
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut raw = RawRow::new();
            for (i, column) in columns.iter().enumerate() {
                let value: Option<String> = row.try_get(i)?;
                raw.insert(*column, value.into());
            }
            result.push(raw);
        }

        debug!("Read {} rows from PostgreSQL table {}", result.len(), table);
        Ok(result)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let kind = Self::checked_table(table)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualify_table(&self.schema, kind.table_name())
        );
        let client = self.client().await?;
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.try_get(0)?)
    }

    async fn test_connection(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
        debug!("Closed PostgreSQL target");
    }
}

/// Sum the row counts reported by `INSERT` command tags.
fn rows_affected(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::CommandComplete(n) => Some(*n),
            _ => None,
        })
        .sum()
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table name.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Escape a string for SQL literal use.
///
/// Complete only with `standard_conforming_strings=on`, which the connection
/// options force.
fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Convert a record value to a SQL literal.
///
/// Returns `None` for values no record emits: the raw `INTEGER` and `BLOB`
/// storage classes, and non-finite floats.
fn sql_value_to_literal(value: &SqlValue) -> Option<String> {
    let literal = match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::F64(n) if n.is_finite() => format!("{}::double precision", n),
        // Untyped so the server coerces to whatever text-like column type it has.
        SqlValue::Text(s) => format!("'{}'", escape_sql_string(s)),
        SqlValue::Uuid(u) => format!("'{}'::uuid", u),
        SqlValue::DateTime(dt) => format!(
            "'{}'::timestamptz",
            dt.format("%Y-%m-%d %H:%M:%S%.6f+00")
        ),
        SqlValue::F64(_) | SqlValue::I64(_) | SqlValue::Bytes(_) => return None,
    };
    Some(literal)
}

/// Build `INSERT … ON CONFLICT ("id") DO NOTHING` with literal values.
///
/// `offset` is the table position of the first row, used in errors.
fn build_insert_or_skip_sql(
    schema: &str,
    table: &str,
    cols: &[&str],
    rows: &[Vec<SqlValue>],
    offset: usize,
) -> Result<String> {
    let col_list: String = cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut value_rows = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let mut values = Vec::with_capacity(row.len());
        for (col, value) in cols.iter().zip(row) {
            let literal = sql_value_to_literal(value).ok_or_else(|| {
                MigrateError::malformed(
                    table,
                    offset + idx,
                    None,
                    format!("column {}: {} value cannot be loaded", col, value.type_name()),
                )
            })?;
            values.push(literal);
        }
        value_rows.push(format!("({})", values.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT (\"id\") DO NOTHING",
        qualify_table(schema, table),
        col_list,
        value_rows.join(", ")
    ))
}

/// Build a SELECT that returns every declared column as text.
fn build_select_text_sql(schema: &str, kind: EntityKind, ordered: bool) -> String {
    let cols: Vec<String> = kind
        .columns()
        .iter()
        .map(|c| format!("{}::text AS {}", quote_ident(c), quote_ident(c)))
        .collect();

    let mut sql = format!(
        "SELECT {} FROM {}",
        cols.join(", "),
        qualify_table(schema, kind.table_name())
    );
    if ordered {
        sql.push_str(" ORDER BY \"id\"");
    }
    sql
}
