mod config;
pub mod database;
pub mod export;
pub mod migrations;

pub use config::{AudioConfig, Config, MotionConfig, PoseConfig, SessionConfig};
pub use database::{Database, SessionRecord};
pub use export::{DataExport, DatabaseInfo};

use std::path::PathBuf;

use crate::error::DatabaseError;
use crate::session::SessionSummary;

/// Returns `~/.config/dancebud[-dev]/` based on DANCEBUD_ENV.
///
/// Set DANCEBUD_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, DatabaseError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DANCEBUD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("dancebud-dev")
    } else {
        base_dir.join("dancebud")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| DatabaseError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Record store the session engine hands finished summaries to.
///
/// [`Database`] is the SQLite implementation; hosts and tests may supply
/// their own.
pub trait PersistenceGateway {
    /// Store a summary and return the stored record with its new id.
    fn save_session(&self, summary: &SessionSummary) -> Result<SessionRecord, DatabaseError>;

    /// Every stored session, newest first.
    fn list_sessions(&self) -> Result<Vec<SessionRecord>, DatabaseError>;

    fn get_session(&self, id: i64) -> Result<Option<SessionRecord>, DatabaseError>;

    /// Returns whether a record was removed.
    fn delete_session(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Never fails: read errors and missing keys both yield `default`.
    fn get_setting(&self, key: &str, default: serde_json::Value) -> serde_json::Value;

    fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError>;
}
