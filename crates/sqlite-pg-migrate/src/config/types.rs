//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Everything read from `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the catalog is read from.
    pub source: SourceConfig,

    /// Where the catalog is written to.
    pub target: TargetConfig,

    #[serde(default)]
    pub migration: MigrationConfig,
}

/// SQLite file holding the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// PostgreSQL connection and schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,

    /// Defaults to 5432.
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    /// Empty when the server trusts the client.
    #[serde(default)]
    pub password: String,

    /// Schema holding the five content tables (default: "content").
    #[serde(default = "default_content_schema")]
    pub schema: String,

    /// Connect timeout in seconds. Driver default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Tuning for `run`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    /// Rows per INSERT statement. When unset, each table is sent as a single
    /// statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_content_schema() -> String {
    "content".to_string()
}
