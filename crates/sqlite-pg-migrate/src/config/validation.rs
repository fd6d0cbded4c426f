//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

fn require(value: &str, key: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MigrateError::Config(format!("{} is required", key)));
    }
    Ok(())
}

fn at_least_one<T: PartialEq + From<u8>>(value: Option<T>, key: &str) -> Result<()> {
    if value == Some(T::from(0)) {
        return Err(MigrateError::Config(format!("{} must be at least 1", key)));
    }
    Ok(())
}

/// Check required fields and numeric bounds. Runs after every load.
pub fn validate(config: &Config) -> Result<()> {
    require(&config.source.path.to_string_lossy(), "source.path")?;

    let target = &config.target;
    require(&target.host, "target.host")?;
    require(&target.database, "target.database")?;
    require(&target.user, "target.user")?;
    require(&target.schema, "target.schema")?;
    at_least_one(target.connect_timeout_secs, "target.connect_timeout_secs")?;

    at_least_one(config.migration.batch_size, "migration.batch_size")?;

    Ok(())
}
