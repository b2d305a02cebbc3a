//! Core error types for dancebud-core.
//!
//! Sensor failures are split the same way the session engine treats them:
//! a refused permission or missing device removes one stream of readings,
//! a transient detection failure only drops a single reading. Neither is
//! ever allowed to abort the session lifecycle.

use std::path::PathBuf;
use thiserror::Error;

use crate::sensors::SensorKind;

/// Core error type for dancebud-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sensor-related errors
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sensor collaborator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The user (or platform) refused access to the sensor.
    #[error("Permission denied for {sensor}")]
    PermissionDenied { sensor: SensorKind },

    /// The hardware or platform API is absent.
    #[error("{sensor} unavailable: {reason}")]
    DeviceUnavailable { sensor: SensorKind, reason: String },

    /// A single read failed; the next tick may succeed.
    #[error("{sensor} detection failed: {reason}")]
    TransientDetectionFailure { sensor: SensorKind, reason: String },
}

impl SensorError {
    pub fn sensor(&self) -> SensorKind {
        match self {
            SensorError::PermissionDenied { sensor }
            | SensorError::DeviceUnavailable { sensor, .. }
            | SensorError::TransientDetectionFailure { sensor, .. } => *sensor,
        }
    }

    pub fn unavailable(sensor: SensorKind, reason: impl Into<String>) -> Self {
        SensorError::DeviceUnavailable {
            sensor,
            reason: reason.into(),
        }
    }

    pub fn transient(sensor: SensorKind, reason: impl Into<String>) -> Self {
        SensorError::TransientDetectionFailure {
            sensor,
            reason: reason.into(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Stored record could not be (de)serialized
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Wrong number of items in a fixed-size collection
    #[error("Expected {expected} {collection}, got {actual}")]
    WrongLength {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
