use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable aggregate of one finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub routine_name: String,
    pub started_at: DateTime<Utc>,
    /// When the session ended. Sessions are listed newest first by this.
    pub date: DateTime<Utc>,
    /// Active time only; pauses are excluded.
    pub duration_seconds: u64,
    /// `M:SS` rendering of `duration_seconds`.
    pub formatted_duration: String,
    /// Rounded mean of `posture_readings`, 0 when there were none.
    pub posture_score: u8,
    /// Rounded mean of `tempo_readings`, 0 when there were none.
    pub avg_tempo_bpm: u32,
    pub steps: u32,
    pub turns: u32,
    /// 0..=100
    pub energy: u8,
    #[serde(default)]
    pub posture_readings: Vec<u8>,
    #[serde(default)]
    pub tempo_readings: Vec<f64>,
}

/// `M:SS`, minutes unbounded.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Rounded arithmetic mean, or 0 for an empty slice.
pub(crate) fn rounded_mean<T: Copy + Into<f64>>(values: &[T]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| v.into()).sum();
    (sum / values.len() as f64).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(600), "10:00");
        assert_eq!(format_duration(3_725), "62:05");
    }

    #[test]
    fn rounded_mean_of_empty_is_zero() {
        assert_eq!(rounded_mean::<u8>(&[]), 0.0);
        assert_eq!(rounded_mean(&[80u8, 60]), 70.0);
        assert_eq!(rounded_mean(&[120.4f64, 121.2]), 121.0);
    }

    #[test]
    fn serializes_camel_case() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let summary = SessionSummary {
            routine_name: "Freestyle".into(),
            started_at: at,
            date: at,
            duration_seconds: 61,
            formatted_duration: format_duration(61),
            posture_score: 70,
            avg_tempo_bpm: 120,
            steps: 2,
            turns: 0,
            energy: 40,
            posture_readings: vec![80, 60],
            tempo_readings: vec![],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["routineName"], "Freestyle");
        assert_eq!(json["postureScore"], 70);
        assert_eq!(json["formattedDuration"], "1:01");
        assert_eq!(json["avgTempoBpm"], 120);
    }
}
