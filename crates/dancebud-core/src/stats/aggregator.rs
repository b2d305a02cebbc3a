use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionSummary;

/// Aggregates across every stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningStatistics {
    pub total_sessions: u64,
    /// Mean posture score, unrounded; 0 with no sessions.
    pub avg_score: f64,
    pub total_time_seconds: u64,
    pub total_steps: u64,
    pub total_turns: u64,
    pub last_updated: DateTime<Utc>,
}

impl RunningStatistics {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            total_sessions: 0,
            avg_score: 0.0,
            total_time_seconds: 0,
            total_steps: 0,
            total_turns: 0,
            last_updated: at,
        }
    }
}

/// Stateless full re-derivation of [`RunningStatistics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsAggregator;

impl StatsAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn recompute<'a, I>(&self, summaries: I, at: DateTime<Utc>) -> RunningStatistics
    where
        I: IntoIterator<Item = &'a SessionSummary>,
    {
        let mut stats = RunningStatistics::empty(at);
        let mut score_sum = 0u64;
        for s in summaries {
            stats.total_sessions += 1;
            score_sum += s.posture_score as u64;
            stats.total_time_seconds += s.duration_seconds;
            stats.total_steps += s.steps as u64;
            stats.total_turns += s.turns as u64;
        }
        if stats.total_sessions > 0 {
            stats.avg_score = score_sum as f64 / stats.total_sessions as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::format_duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn summary(score: u8, seconds: u64, steps: u32, turns: u32) -> SessionSummary {
        SessionSummary {
            routine_name: "Freestyle".into(),
            started_at: at(0),
            date: at(seconds as i64),
            duration_seconds: seconds,
            formatted_duration: format_duration(seconds),
            posture_score: score,
            avg_tempo_bpm: 120,
            steps,
            turns,
            energy: 50,
            posture_readings: vec![score],
            tempo_readings: vec![120.0],
        }
    }

    #[test]
    fn empty_history_is_all_zeros() {
        let stats = StatsAggregator::new().recompute(&[], at(5));
        assert_eq!(stats, RunningStatistics::empty(at(5)));
        assert_eq!(stats.avg_score, 0.0);
    }

    #[test]
    fn sums_and_averages() {
        let history = vec![summary(70, 120, 40, 2), summary(85, 60, 10, 1)];
        let stats = StatsAggregator::new().recompute(&history, at(100));
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.avg_score, 77.5);
        assert_eq!(stats.total_time_seconds, 180);
        assert_eq!(stats.total_steps, 50);
        assert_eq!(stats.total_turns, 3);
        assert_eq!(stats.last_updated, at(100));
    }

    #[test]
    fn recompute_keeps_no_state() {
        let aggregator = StatsAggregator::new();
        let history = vec![summary(90, 30, 5, 0)];
        let first = aggregator.recompute(&history, at(1));
        let again = aggregator.recompute(&history, at(1));
        assert_eq!(first, again);
        assert_eq!(aggregator.recompute(&history[..0], at(1)).total_sessions, 0);
    }
}
