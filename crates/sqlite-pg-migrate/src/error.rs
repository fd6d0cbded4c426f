//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors (invalid YAML, missing fields, bad plan).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connectivity and pool errors.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for source (SQLite) errors.
pub const EXIT_SOURCE_ERROR: u8 = 3;
/// Exit code for target (PostgreSQL) errors, including constraint violations.
pub const EXIT_TARGET_ERROR: u8 = 4;
/// Exit code for rows that cannot be mapped to their record type.
pub const EXIT_MALFORMED_RECORD: u8 = 5;
/// Exit code for verification mismatches.
pub const EXIT_VERIFICATION_FAILED: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The load plan is not a valid dependency order.
    #[error("Invalid load plan: {0}")]
    Plan(String),

    /// Connection or pool error with context
    #[error("Connection error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Insert rejected by a constraint other than the primary-key conflict.
    #[error("Constraint violation on table {table} ({constraint}): {message}")]
    ConstraintViolation {
        table: String,
        constraint: String,
        message: String,
    },

    /// A batch of a table load failed; the whole table was rolled back.
    #[error("Load of table {table} failed at batch {batch} of {batches}, table rolled back")]
    BatchFailed {
        table: String,
        batch: usize,
        batches: usize,
        #[source]
        source: Box<MigrateError>,
    },

    /// A source row could not be converted to its record type.
    #[error("Malformed record in table {table} at row {row}{}: {message}", id_suffix(.id))]
    MalformedRecord {
        table: String,
        row: usize,
        id: Option<String>,
        message: String,
    },

    /// Source and target disagree after migration.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (id {})", id),
        None => String::new(),
    }
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a MalformedRecord error
    pub fn malformed(
        table: impl Into<String>,
        row: usize,
        id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::MalformedRecord {
            table: table.into(),
            row,
            id,
            message: message.into(),
        }
    }

    /// Classify a PostgreSQL error raised while loading `table`.
    ///
    /// Integrity violations become [`MigrateError::ConstraintViolation`];
    /// everything else stays a plain target error.
    pub fn from_load(table: &str, err: tokio_postgres::Error) -> Self {
        use tokio_postgres::error::SqlState;

        let Some(db) = err.as_db_error() else {
            return MigrateError::Target(err);
        };

        let code = db.code();
        let is_integrity = *code == SqlState::FOREIGN_KEY_VIOLATION
            || *code == SqlState::NOT_NULL_VIOLATION
            || *code == SqlState::CHECK_VIOLATION
            || *code == SqlState::UNIQUE_VIOLATION;

        if !is_integrity {
            return MigrateError::Target(err);
        }

        MigrateError::ConstraintViolation {
            table: table.to_string(),
            constraint: db.constraint().unwrap_or(code.code()).to_string(),
            message: db.message().to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Plan(_)
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => EXIT_CONFIG_ERROR,
            MigrateError::Pool { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Source(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) | MigrateError::ConstraintViolation { .. } => {
                EXIT_TARGET_ERROR
            }
            MigrateError::BatchFailed { source, .. } => source.exit_code(),
            MigrateError::MalformedRecord { .. } => EXIT_MALFORMED_RECORD,
            MigrateError::Verification(_) => EXIT_VERIFICATION_FAILED,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
