use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensors::SensorKind;
use crate::session::SessionState;

/// Every session state change produces an Event.
/// Hosts print or forward them; nothing inside the engine consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        routine_name: String,
        /// Sensors that started successfully.
        sensors: Vec<SensorKind>,
        at: DateTime<Utc>,
    },
    SessionPaused {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        elapsed_seconds: u64,
        /// Sensors that restarted successfully.
        sensors: Vec<SensorKind>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        routine_name: String,
        elapsed_seconds: u64,
        formatted_time: String,
        /// Rounded mean of posture readings so far.
        posture_score: u8,
        avg_tempo_bpm: u32,
        steps: u32,
        turns: u32,
        energy: u8,
        at: DateTime<Utc>,
    },
}
