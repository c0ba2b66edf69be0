mod config;
pub mod database;

pub use config::{Config, CountdownConfig, CycleConfig, StorageConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::{Result, StorageError};

/// A durable key-value slot holding serialized state.
///
/// The cycle store reads its slot once at startup and overwrites it after
/// every transition.
pub trait StateSlot {
    fn read_slot(&self, key: &str) -> Result<Option<String>>;
    fn write_slot(&self, key: &str, value: &str) -> Result<()>;
}

/// Returns `~/.config/cycle-timer[-dev]/` based on CYCLE_TIMER_ENV.
///
/// Set CYCLE_TIMER_ENV=dev to use development data directory.
/// CYCLE_TIMER_HOME, when set, replaces the whole path.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("CYCLE_TIMER_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("CYCLE_TIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("cycle-timer-dev")
            } else {
                base_dir.join("cycle-timer")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| StorageError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
