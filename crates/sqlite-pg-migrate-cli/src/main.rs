//! sqlite-pg-migrate CLI - SQLite to PostgreSQL catalog migration.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlite_pg_migrate::{
    Config, HealthCheckResult, MigrateError, MigrationResult, Orchestrator, RowCountCheck,
    VerifyResult,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Copy the movie catalog from SQLite into PostgreSQL and check the result")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the command result as JSON on stdout
    #[arg(long)]
    output_json: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Lowest log level to print
    #[arg(long, value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Verbosity> for Level {
    fn from(v: Verbosity) -> Self {
        match v {
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Info => Level::INFO,
            Verbosity::Warn => Level::WARN,
            Verbosity::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load every table from source into target
    Run {
        /// Read and map every row, load nothing
        #[arg(long)]
        dry_run: bool,

        /// Rows per INSERT statement (overrides migration.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Target schema (overrides target.schema)
        #[arg(long)]
        target_schema: Option<String>,
    },

    /// Compare every row of source and target
    Verify,

    /// Compare per-table row counts of source and target
    Validate,

    /// Check that both databases are reachable
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = execute(Cli::parse()).await {
        eprintln!("{}", e.format_detailed());
        return ExitCode::from(e.exit_code());
    }
    ExitCode::SUCCESS
}

async fn execute(cli: Cli) -> Result<(), MigrateError> {
    init_tracing(cli.verbosity, cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Configuration: {}", cli.config.display());
    let json = cli.output_json;

    match cli.command {
        Commands::Run {
            dry_run,
            batch_size,
            target_schema,
        } => {
            config.migration.batch_size = batch_size.or(config.migration.batch_size);
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            config.validate()?;

            let result = Orchestrator::new(config).await?.run(dry_run).await?;
            report(json, &result, print_run)?;
        }

        Commands::Verify => {
            let result = Orchestrator::new(config).await?.verify().await?;
            report(json, &result, print_verify)?;
            result.into_result()?;
        }

        Commands::Validate => {
            let checks = Orchestrator::new(config).await?.validate().await?;
            report(json, &checks, |c| print_counts(c))?;

            let differing: Vec<&str> = checks
                .iter()
                .filter(|c| !c.matches)
                .map(|c| c.table.as_str())
                .collect();
            if !differing.is_empty() {
                return Err(MigrateError::Verification(format!(
                    "row counts differ for: {}",
                    differing.join(", ")
                )));
            }
        }

        Commands::HealthCheck => {
            let health = Orchestrator::check_connections(&config).await;
            report(json, &health, print_health)?;
            if !health.healthy {
                return Err(MigrateError::pool(
                    "one or both databases are unreachable",
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

/// Print `value` as pretty JSON, or through `human` otherwise.
fn report<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    human: impl FnOnce(&T),
) -> Result<(), MigrateError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_run(result: &MigrationResult) {
    let headline = if result.dry_run {
        "Dry run finished (nothing loaded)"
    } else {
        "Migration finished"
    };
    println!("\n{} in {:.2}s [run {}]", headline, result.duration_seconds, result.run_id);
    println!("  {:<18} {:>9} {:>9} {:>9}", "table", "read", "inserted", "skipped");
    for t in &result.tables {
        println!(
            "  {:<18} {:>9} {:>9} {:>9}",
            t.table, t.rows_read, t.rows_inserted, t.rows_skipped
        );
    }
    println!(
        "  {:<18} {:>9} {:>9} {:>9}",
        "total", result.rows_read, result.rows_inserted, result.rows_skipped
    );
}

fn print_verify(result: &VerifyResult) {
    println!("\nConsistency check ({:.2}s):", result.duration_ms as f64 / 1000.0);
    for t in &result.tables {
        let state = if t.in_sync() {
            "in sync".to_string()
        } else {
            format!("{} mismatch(es)", t.mismatches.len())
        };
        println!(
            "  {:<18} source {:>8}  target {:>8}  {}",
            t.table, t.source_rows, t.target_rows, state
        );
    }
}

fn print_counts(checks: &[RowCountCheck]) {
    println!("\nRow counts:");
    for c in checks {
        let mark = if c.matches { "=" } else { "!=" };
        println!(
            "  {:<18} {:>8} {:>2} {:<8}",
            c.table, c.source_rows, mark, c.target_rows
        );
    }
}

fn print_health(health: &HealthCheckResult) {
    let line = |store: &str, ok: bool, ms: u64, err: &Option<String>| {
        let state = if ok { "reachable" } else { "unreachable" };
        println!("  {:<20} {:<12} {}ms", store, state, ms);
        if let Some(err) = err {
            println!("    {}", err);
        }
    };

    println!("\nConnections:");
    line(
        "source (sqlite)",
        health.source_connected,
        health.source_latency_ms,
        &health.source_error,
    );
    line(
        "target (postgres)",
        health.target_connected,
        health.target_latency_ms,
        &health.target_error,
    );
}

/// Logs go to stderr so that `--output-json` leaves stdout clean.
fn init_tracing(verbosity: Verbosity, format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(Level::from(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
