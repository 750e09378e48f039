mod config;
pub mod database;
pub mod migrations;
pub mod store;
pub mod streak_db;

pub use config::{CliConfig, Config, CONFIG_FILE, EngineConfig, LogConfig, MilestonesConfig, StreaksConfig};
pub use database::Database;
pub use store::StreakStore;
pub use streak_db::StreakDb;

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns the data directory, creating it if needed.
///
/// `STREAKS_DATA_DIR` overrides the location outright. Otherwise the
/// directory is `~/.config/streaks[-dev]/`, where the `-dev` suffix is
/// selected by `STREAKS_ENV=dev`.
///
/// # Errors
/// Returns an error if no home directory can be found or if creating the
/// directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("STREAKS_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir().ok_or(ConfigError::NoDataDir)?.join(".config");
            let env = std::env::var("STREAKS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("streaks-dev")
            } else {
                base_dir.join("streaks")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
