//! End-to-end session tests.
//!
//! Real collaborators (motion tracker over a channel device, tempo estimator
//! over a scripted microphone) drive the engine against an in-memory SQLite
//! database with a manual clock.

use std::rc::Rc;

use dancebud_core::error::SensorError;
use dancebud_core::motion::{Acceleration, ChannelMotionDevice, FallbackGenerator, MotionFeed};
use dancebud_core::storage::{AudioConfig, MotionConfig};
use dancebud_core::{
    AudioInput, Database, ManualClock, MotionTracker, PersistenceGateway, Reading, SensorKind,
    SessionEngine, SessionState, StaticPermissions, TempoEstimator,
};

const REST: f64 = 9.8;
const JOLT: f64 = 12.0;

/// Microphone with constant silence.
struct QuietMic;

impl AudioInput for QuietMic {
    fn open(&mut self, _config: &AudioConfig) -> Result<(), SensorError> {
        Ok(())
    }

    fn frequency_data(&mut self, out: &mut [u8]) -> Result<(), SensorError> {
        out.fill(0);
        Ok(())
    }

    fn disconnect_source(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn stop_tracks(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn close_context(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

fn motion() -> (MotionTracker, MotionFeed) {
    let (device, feed) = ChannelMotionDevice::new();
    let tracker = MotionTracker::new(Box::new(device), MotionConfig::default(), FallbackGenerator::seeded(7));
    (tracker, feed)
}

fn vertical(t: u64, z: f64) -> Acceleration {
    Acceleration::new(t, 0.0, 0.0, z)
}

#[test]
fn freestyle_session_end_to_end() {
    let clock = Rc::new(ManualClock::new(0));
    let db = Rc::new(Database::open_in_memory().unwrap());
    let (tracker, feed) = motion();

    let mut engine = SessionEngine::new(clock.clone(), db.clone()).with_sensor(Box::new(tracker));
    engine.start("Freestyle").unwrap();

    engine.update(Reading::Posture(80));
    engine.update(Reading::Posture(60));

    // Reference sample, then steps at 0 ms and 500 ms; 600 ms is debounced.
    feed.push(vertical(0, REST));
    feed.push(vertical(0, JOLT));
    feed.push(vertical(500, REST));
    feed.push(vertical(600, JOLT));
    clock.set(1_000);
    engine.poll();

    let summary = engine.end().unwrap();
    assert_eq!(summary.routine_name, "Freestyle");
    assert_eq!(summary.posture_score, 70);
    assert_eq!(summary.steps, 2);
    assert_eq!(summary.duration_seconds, 1);
    assert_eq!(engine.state(), SessionState::Ended);

    let stored = db.list_sessions().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].summary, summary);

    let stats = db.statistics();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.avg_score, 70.0);
    assert_eq!(stats.total_steps, 2);

    // The motion subscription was released with the session.
    assert_eq!(feed.subscriber_count(), 0);
}

#[test]
fn pause_releases_sensors_and_keeps_counts() {
    let clock = Rc::new(ManualClock::new(0));
    let db = Rc::new(Database::open_in_memory().unwrap());
    let (tracker, feed) = motion();
    let tempo = TempoEstimator::new(Box::new(QuietMic), AudioConfig::default());

    let mut engine = SessionEngine::new(clock.clone(), db.clone())
        .with_sensor(Box::new(tracker))
        .with_sensor(Box::new(tempo));
    engine.start("Salsa").unwrap();

    feed.push(vertical(0, REST));
    feed.push(vertical(400, JOLT));
    clock.set(500);
    engine.poll();
    assert_eq!(feed.subscriber_count(), 1);

    clock.set(1_000);
    engine.pause().unwrap();
    assert_eq!(feed.subscriber_count(), 0);

    // Samples while paused reach nobody.
    feed.push(vertical(1_500, REST));
    feed.push(vertical(2_000, JOLT));

    clock.set(61_000);
    engine.resume().unwrap();
    feed.push(vertical(61_000, REST));
    feed.push(vertical(61_400, JOLT));
    clock.set(62_000);
    engine.poll();

    let summary = engine.end().unwrap();
    assert_eq!(summary.steps, 2);
    assert_eq!(summary.duration_seconds, 2);
    // Tempo sampled at 500 ms and again after resume; silence reads as the
    // base oscillation.
    assert_eq!(summary.tempo_readings.len(), 2);
    assert!(summary.tempo_readings.iter().all(|bpm| (100.0..=120.0).contains(bpm)));
}

#[test]
fn session_without_permissions_still_saves() {
    let clock = Rc::new(ManualClock::new(0));
    let db = Rc::new(Database::open_in_memory().unwrap());
    let (tracker, feed) = motion();

    let mut engine = SessionEngine::new(clock.clone(), db.clone())
        .with_permissions(Box::new(StaticPermissions::denying_all()))
        .with_sensor(Box::new(tracker));
    engine.start("Freestyle").unwrap();
    assert_eq!(feed.subscriber_count(), 0);

    clock.set(90_000);
    let summary = engine.end().unwrap();
    assert_eq!(summary.steps, 0);
    assert_eq!(summary.duration_seconds, 90);
    assert_eq!(summary.formatted_duration, "1:30");

    let report = engine.permission_report().unwrap().clone();
    db.save_permission_status(&report).unwrap();
    assert!(!db.permission_status().unwrap().status(SensorKind::Motion).is_granted());
    assert_eq!(db.get_session(1).unwrap().unwrap().summary.duration_seconds, 90);
}

#[test]
fn silent_motion_device_falls_back_during_session() {
    let clock = Rc::new(ManualClock::new(0));
    let db = Rc::new(Database::open_in_memory().unwrap());
    let (tracker, _feed) = motion();

    let mut engine = SessionEngine::new(clock.clone(), db.clone()).with_sensor(Box::new(tracker));
    engine.start("Freestyle").unwrap();

    // Grace period passes with no samples, then a few generator ticks.
    for t in (0..=6_000).step_by(100) {
        clock.set(t);
        engine.poll();
    }

    let summary = engine.end().unwrap();
    assert!(summary.energy <= 100);
    // 2.0 s grace + 800 ms ticks: five synthetic updates by 6.0 s.
    assert!(summary.steps <= 10);
    assert_eq!(db.list_sessions().unwrap().len(), 1);
}

#[test]
fn stats_track_history_through_gateway() {
    let db = Rc::new(Database::open_in_memory().unwrap());
    let clock = Rc::new(ManualClock::new(0));

    for (i, score) in [90u8, 70].into_iter().enumerate() {
        let mut engine = SessionEngine::new(clock.clone(), db.clone());
        engine.start("Freestyle").unwrap();
        engine.update(Reading::Posture(score));
        engine.update(Reading::Turns(i as u32 + 1));
        clock.advance(30_000);
        engine.end().unwrap();
    }

    let stats = db.statistics();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.avg_score, 80.0);
    assert_eq!(stats.total_time_seconds, 60);
    assert_eq!(stats.total_turns, 3);

    let newest = db.recent_sessions(1).unwrap();
    assert_eq!(newest[0].summary.posture_score, 70);

    let gateway: &dyn PersistenceGateway = db.as_ref();
    assert!(gateway.delete_session(newest[0].id).unwrap());
    assert_eq!(db.statistics().total_sessions, 1);
    assert_eq!(db.statistics().avg_score, 90.0);
}
