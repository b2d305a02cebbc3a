//! SQLite-based session storage, settings and statistics.
//!
//! Provides persistent storage for:
//! - Finished practice sessions (full summary kept as JSON)
//! - Running statistics, recomputed after every session write
//! - Key-value settings with JSON values

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::export::{DataExport, DatabaseInfo, APP_VERSION};
use super::{data_dir, migrations, PersistenceGateway};
use crate::error::DatabaseError;
use crate::sensors::PermissionReport;
use crate::session::SessionSummary;
use crate::stats::{RunningStatistics, StatsAggregator};

const OVERALL_STATS_KEY: &str = "overall";
const USER_NAME_KEY: &str = "userName";
const SELECTED_ROUTINE_KEY: &str = "selectedRoutine";
const PERMISSIONS_KEY: &str = "permissions";

pub const DEFAULT_USER_NAME: &str = "Dancer";
pub const DEFAULT_ROUTINE: &str = "Freestyle";
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// A stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: i64,
    #[serde(flatten)]
    pub summary: SessionSummary,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
}

fn to_db_time(at: DateTime<Utc>) -> String {
    // Fixed width so text order matches time order.
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn from_db_time(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{s}': {e}")))
}

fn insert_session(
    conn: &Connection,
    summary: &SessionSummary,
    at: DateTime<Utc>,
) -> Result<SessionRecord, DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (routine_name, date, score, duration_seconds, data, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            summary.routine_name,
            to_db_time(summary.date),
            summary.posture_score,
            summary.duration_seconds,
            serde_json::to_string(summary)?,
            to_db_time(at),
        ],
    )?;
    Ok(SessionRecord {
        id: conn.last_insert_rowid(),
        summary: summary.clone(),
        timestamp: at,
    })
}

/// SQLite database for sessions, settings and statistics.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    aggregator: StatsAggregator,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/dancebud/dancebud.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        Self::open_at(&data_dir()?.join("dancebud.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open an in-memory database. Nothing survives the value.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        debug!(path = ?path, "database opened");
        Ok(Self {
            conn,
            path,
            aggregator: StatsAggregator::new(),
        })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Store a summary and recompute the running statistics in one
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the insert or the statistics refresh fails; the
    /// session is not stored in that case.
    pub fn save_session(&self, summary: &SessionSummary) -> Result<SessionRecord, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let record = insert_session(&tx, summary, Utc::now())?;
        self.refresh_statistics()?;
        tx.commit()?;
        info!(id = record.id, routine = %summary.routine_name, "session saved");
        Ok(record)
    }

    /// Every session, newest first by `date`.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, DatabaseError> {
        self.query_sessions(None)
    }

    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, DatabaseError> {
        self.query_sessions(Some(limit))
    }

    pub fn get_session(&self, id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, data, timestamp FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, data, ts)| Self::decode_session(id, &data, &ts))
            .transpose()
    }

    /// Returns whether a record was removed. Statistics are recomputed
    /// either way.
    pub fn delete_session(&self, id: i64) -> Result<bool, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])? > 0;
        self.refresh_statistics()?;
        tx.commit()?;
        if removed {
            info!(id, "session deleted");
        }
        Ok(removed)
    }

    /// Remove every session and reset statistics to zeros.
    pub fn clear_sessions(&self) -> Result<usize, DatabaseError> {
        let removed = self.conn.execute("DELETE FROM sessions", [])?;
        info!(removed, "all sessions cleared");
        self.save_statistics(&RunningStatistics::empty(Utc::now()))?;
        Ok(removed)
    }

    fn query_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionRecord>, DatabaseError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |l| l as i64);
        let mut stmt = self.conn.prepare(
            "SELECT id, data, timestamp FROM sessions
             ORDER BY date DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data, ts) = row?;
            records.push(Self::decode_session(id, &data, &ts)?);
        }
        Ok(records)
    }

    fn decode_session(id: i64, data: &str, timestamp: &str) -> Result<SessionRecord, DatabaseError> {
        Ok(SessionRecord {
            id,
            summary: serde_json::from_str(data)?,
            timestamp: from_db_time(timestamp)?,
        })
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// Recompute from every stored session and store under `overall`.
    pub fn refresh_statistics(&self) -> Result<RunningStatistics, DatabaseError> {
        let sessions = self.list_sessions()?;
        let stats = self
            .aggregator
            .recompute(sessions.iter().map(|r| &r.summary), Utc::now());
        self.save_statistics(&stats)?;
        debug!(total_sessions = stats.total_sessions, "statistics recomputed");
        Ok(stats)
    }

    /// Stored statistics, computed on first use. Never fails: on error the
    /// zero statistics are returned.
    pub fn statistics(&self) -> RunningStatistics {
        let stored = self.load_statistics().and_then(|stats| match stats {
            Some(stats) => Ok(stats),
            None => self.refresh_statistics(),
        });
        stored.unwrap_or_else(|e| {
            warn!(error = %e, "error getting statistics");
            RunningStatistics::empty(Utc::now())
        })
    }

    fn load_statistics(&self) -> Result<Option<RunningStatistics>, DatabaseError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM statistics WHERE key = ?1",
                params![OVERALL_STATS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }

    fn save_statistics(&self, stats: &RunningStatistics) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO statistics (key, value, updated) VALUES (?1, ?2, ?3)",
            params![
                OVERALL_STATS_KEY,
                serde_json::to_string(stats)?,
                to_db_time(Utc::now())
            ],
        )?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn try_get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }

    /// Missing keys and read errors both yield `default`.
    pub fn get_setting(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        match self.try_get_setting(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "failed to get setting");
                default
            }
        }
    }

    pub fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, to_db_time(Utc::now())],
        )?;
        debug!(key, "setting saved");
        Ok(())
    }

    pub fn save_settings(&self, settings: &BTreeMap<String, serde_json::Value>) -> Result<(), DatabaseError> {
        for (key, value) in settings {
            self.save_setting(key, value)?;
        }
        Ok(())
    }

    /// All settings by key.
    pub fn settings(&self) -> Result<BTreeMap<String, serde_json::Value>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, serde_json::from_str(&value)?);
        }
        Ok(settings)
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    pub fn user_name(&self) -> String {
        self.get_string_setting(USER_NAME_KEY, DEFAULT_USER_NAME)
    }

    pub fn save_user_name(&self, name: &str) -> Result<(), DatabaseError> {
        self.save_setting(USER_NAME_KEY, &serde_json::Value::from(name))
    }

    pub fn selected_routine(&self) -> String {
        self.get_string_setting(SELECTED_ROUTINE_KEY, DEFAULT_ROUTINE)
    }

    pub fn set_selected_routine(&self, routine: &str) -> Result<(), DatabaseError> {
        self.save_setting(SELECTED_ROUTINE_KEY, &serde_json::Value::from(routine))
    }

    /// `None` until permissions have been requested once.
    pub fn permission_status(&self) -> Option<PermissionReport> {
        let value = self.get_setting(PERMISSIONS_KEY, serde_json::Value::Null);
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value)
            .map_err(|e| warn!(error = %e, "stored permission status is malformed"))
            .ok()
    }

    pub fn save_permission_status(&self, report: &PermissionReport) -> Result<(), DatabaseError> {
        self.save_setting(PERMISSIONS_KEY, &serde_json::to_value(report)?)
    }

    fn get_string_setting(&self, key: &str, default: &str) -> String {
        match self.get_setting(key, serde_json::Value::from(default)) {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }

    // ── Data management ──────────────────────────────────────────────

    pub fn export_all(&self) -> Result<DataExport, DatabaseError> {
        Ok(DataExport {
            export_date: Utc::now(),
            app_version: APP_VERSION.to_string(),
            sessions: self.list_sessions()?,
            settings: self.settings()?,
            statistics: self.statistics(),
        })
    }

    /// Replace everything with the contents of `export`. Sessions get fresh
    /// ids; the exported statistics are ignored and recomputed.
    ///
    /// Returns the number of sessions imported.
    pub fn import(&self, export: &DataExport) -> Result<usize, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM sessions; DELETE FROM settings; DELETE FROM statistics;")?;
        let now = Utc::now();
        for record in &export.sessions {
            insert_session(&tx, &record.summary, now)?;
        }
        for (key, value) in &export.settings {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated) VALUES (?1, ?2, ?3)",
                params![key, serde_json::to_string(value)?, to_db_time(now)],
            )?;
        }
        tx.commit()?;

        self.refresh_statistics()?;
        info!(sessions = export.sessions.len(), settings = export.settings.len(), "data imported");
        Ok(export.sessions.len())
    }

    /// Empty all three collections.
    pub fn clear_all_data(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch("DELETE FROM sessions; DELETE FROM settings; DELETE FROM statistics;")?;
        info!("all data cleared");
        Ok(())
    }

    pub fn info(&self) -> Result<DatabaseInfo, DatabaseError> {
        let session_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        let setting_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        Ok(DatabaseInfo {
            db_path: self.path.as_ref().map(|p| p.display().to_string()),
            schema_version: migrations::schema_version(&self.conn),
            session_count: session_count as usize,
            setting_count: setting_count as usize,
            statistics: self.statistics(),
        })
    }
}

impl PersistenceGateway for Database {
    fn save_session(&self, summary: &SessionSummary) -> Result<SessionRecord, DatabaseError> {
        Database::save_session(self, summary)
    }

    fn list_sessions(&self) -> Result<Vec<SessionRecord>, DatabaseError> {
        Database::list_sessions(self)
    }

    fn get_session(&self, id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        Database::get_session(self, id)
    }

    fn delete_session(&self, id: i64) -> Result<bool, DatabaseError> {
        Database::delete_session(self, id)
    }

    fn get_setting(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        Database::get_setting(self, key, default)
    }

    fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError> {
        Database::save_setting(self, key, value)
    }
}
