//! Core error types for cycle-timer-core.
//!
//! Validation failures are recoverable input rejections. Conflict and
//! missing-cycle errors are contract violations by the caller and are
//! surfaced as hard errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::cycle::CycleId;

/// Core error type for cycle-timer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Creation input outside the accepted contract
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A cycle was created while another one is still running
    #[error("Cycle {id} is already active; interrupt it before starting a new one")]
    CycleAlreadyActive { id: CycleId },

    /// Interrupt/finish requested with nothing running
    #[error("No active cycle")]
    NoActiveCycle,

    /// No identifier can follow the last stored one
    #[error("No cycle id is left after the last stored cycle")]
    IdsExhausted,

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable at {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors for cycle creation input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task label is empty (after trimming)
    #[error("Task must not be empty")]
    EmptyTask,

    /// Duration outside the configured bounds
    #[error("Duration of {value} minutes is outside the allowed range {min}..={max}")]
    DurationOutOfRange { value: u32, min: u32, max: u32 },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
