//! Whole-database export documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionRecord;
use crate::error::ValidationError;
use crate::stats::RunningStatistics;

/// Version stamped into every export.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a user can take to another device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub export_date: DateTime<Utc>,
    pub app_version: String,
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    pub statistics: RunningStatistics,
}

impl DataExport {
    /// Parse an export document. A document without a `sessions` array is
    /// rejected rather than treated as empty.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidValue {
                field: "export".into(),
                message: e.to_string(),
            })?;
        if !value.get("sessions").is_some_and(serde_json::Value::is_array) {
            return Err(ValidationError::InvalidValue {
                field: "sessions".into(),
                message: "export has no sessions".into(),
            });
        }
        serde_json::from_value(value).map_err(|e| ValidationError::InvalidValue {
            field: "export".into(),
            message: e.to_string(),
        })
    }
}

/// Storage overview for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    /// `None` for in-memory databases.
    pub db_path: Option<String>,
    pub schema_version: i32,
    pub session_count: usize,
    pub setting_count: usize,
    pub statistics: RunningStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_document_without_sessions() {
        let err = DataExport::from_json(r#"{"exportDate":"2024-01-01T00:00:00Z","settings":{}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("sessions"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(DataExport::from_json("{not json").is_err());
    }

    #[test]
    fn parses_minimal_export() {
        let json = r#"{
            "exportDate": "2024-01-01T00:00:00Z",
            "appVersion": "1.0.0",
            "sessions": [],
            "statistics": {
                "totalSessions": 0, "avgScore": 0.0, "totalTimeSeconds": 0,
                "totalSteps": 0, "totalTurns": 0, "lastUpdated": "2024-01-01T00:00:00Z"
            }
        }"#;
        let export = DataExport::from_json(json).unwrap();
        assert!(export.sessions.is_empty());
        assert!(export.settings.is_empty());
        assert_eq!(export.app_version, "1.0.0");
    }
}
