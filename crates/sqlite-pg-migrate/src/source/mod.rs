//! SQLite source reader.
//!
//! Opens the database file read-only through a single-connection SQLx pool
//! and returns whole tables as [`RawRow`]s, keeping each value in the
//! storage class SQLite actually holds for it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::{RawRow, SourceReader, SqlValue};
use crate::error::{MigrateError, Result};
use crate::model::EntityKind;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    /// Open the SQLite database named in the configuration.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        Self::open(&config.path).await
    }

    /// Open a SQLite database file read-only.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrateError::pool(
                format!("database file {} does not exist", path.display()),
                "opening SQLite source",
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "opening SQLite source"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite source connection"))?;

        info!("Opened SQLite source: {}", path.display());

        Ok(Self { pool })
    }

    /// Quote a SQLite identifier.
    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Only the five content tables may be read.
    fn checked_table(table: &str) -> Result<&str> {
        EntityKind::from_table(table)
            .map(EntityKind::table_name)
            .ok_or_else(|| MigrateError::Config(format!("unknown table: {}", table)))
    }

    /// Convert a SQLite row to a raw attribute mapping.
    fn row_to_raw(row: &SqliteRow) -> Result<RawRow> {
        let mut raw = RawRow::new();

        for (i, column) in row.columns().iter().enumerate() {
            let value_ref = row.try_get_raw(i)?;
            let value = if value_ref.is_null() {
                SqlValue::Null
            } else {
                let storage_class = value_ref.type_info().name().to_string();
                match storage_class.as_str() {
                    "INTEGER" => SqlValue::I64(row.try_get::<i64, _>(i)?),
                    "REAL" => SqlValue::F64(row.try_get::<f64, _>(i)?),
                    "BLOB" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(i)?),
                    _ => SqlValue::Text(row.try_get::<String, _>(i)?),
                }
            };
            raw.insert(column.name(), value);
        }

        Ok(raw)
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn read_table(&self, table: &str, ordered: bool) -> Result<Vec<RawRow>> {
        let table = Self::checked_table(table)?;
        let mut sql = format!("SELECT * FROM {}", Self::quote_ident(table));
        if ordered {
            sql.push_str(" ORDER BY \"id\"");
        }
        debug!("SQLite query: {}", sql);

        let rows: Vec<SqliteRow> = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let raw = rows.iter().map(Self::row_to_raw).collect::<Result<Vec<_>>>()?;

        debug!("Read {} rows from SQLite table {}", raw.len(), table);
        Ok(raw)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let table = Self::checked_table(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", Self::quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed SQLite source");
    }
}
