mod config;

pub use config::{Config, CountdownConfig, IntervalConfig, WorkRestConfig};

use std::path::PathBuf;

use crate::error::{ConfigError, CoreError};

/// Returns `~/.config/repcycle/`, or `$REPCYCLE_CONFIG_DIR` when set.
///
/// # Errors
/// Returns an error if no home directory can be determined or if
/// creating the config directory fails.
pub fn config_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("REPCYCLE_CONFIG_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(".config")
            .join("repcycle"),
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
