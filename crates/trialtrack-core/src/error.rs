//! Core error types for trialtrack-core.
//!
//! This module defines the error hierarchy using thiserror. Configuration
//! shape errors surface eagerly when a project or group is reconstructed;
//! pool and storage errors stay local to the operation that hit them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for trialtrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-shape errors, detected when a group/project is rebuilt
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Counter ID pool errors
    #[error("Counter pool error: {0}")]
    Pool(#[from] PoolError),

    /// Persistence errors (fail-stop: always surfaced to the caller)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-shape validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Cycle length must be a positive integer
    #[error("Invalid cycle length {len}: must be >= 1")]
    InvalidCycleLength { len: u32 },

    /// A variable references a position outside `[1, cycle_length]`
    #[error("Variable '{variable}' reports at position {position}, outside [1, {cycle_length}]")]
    InvalidPosition {
        variable: String,
        position: u32,
        cycle_length: u32,
    },

    /// A time-difference variable must report at the final cycle position
    #[error("Time-difference variable '{variable}' must report only at position {expected}")]
    MisplacedTimeDifference { variable: String, expected: u32 },

    /// Variable map key does not match the configuration's own name
    #[error("Variable registered under '{key}' but configured as '{name}'")]
    NameMismatch { key: String, name: String },

    /// Malformed gating-action descriptor
    #[error("Invalid gating action: {0}")]
    InvalidGatingAction(String),

    /// Module tag not in the known module set
    #[error("Unknown module tag '{0}'")]
    UnknownModuleTag(String),
}

/// Counter ID pool errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// Release called on an id that is not currently active
    #[error("Cannot release id {id}: not currently active")]
    ReleaseOfInactiveId { id: u32 },

    /// Active and deactivated sets overlap; the pool instance is unusable
    #[error("ID pool corrupted: id {id} is both active and deactivated")]
    Corrupted { id: u32 },
}

/// Persistence-layer errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored payload could not be encoded or decoded
    #[error("Failed to encode/decode stored record: {0}")]
    Codec(String),

    /// A referenced record does not exist
    #[error("No such {what}: {id}")]
    NotFound { what: &'static str, id: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
