//! Session engine implementation.
//!
//! Like every collaborator it drives, the engine has no internal threads.
//! The host calls [`SessionEngine::poll`] periodically; each call polls the
//! running sensors, applies the readings they queued, and fires the 1 s
//! tick.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Active <-> Paused
//!           |          |
//!           +-> Ended <+
//! ```
//!
//! Transitions requested from any other state are ignored and return
//! `None`. `Ended` is terminal.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(clock, store).with_sensor(Box::new(motion));
//! engine.start("Freestyle");
//! // In a loop:
//! if let Some(snapshot) = engine.poll() { /* render */ }
//! let summary = engine.end();
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::summary::{format_duration, rounded_mean, SessionSummary};
use crate::events::Event;
use crate::sensors::{
    PermissionGate, PermissionReport, Reading, ReadingSink, Sensor, SensorKind, StaticPermissions,
};
use crate::storage::{PersistenceGateway, SessionConfig};
use crate::timer::{Clock, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Ended,
}

struct SensorSlot {
    sensor: Box<dyn Sensor>,
    /// Decided once at `start`.
    permitted: bool,
}

/// Accumulation buffers for the in-progress session.
#[derive(Debug, Default)]
struct SessionData {
    routine_name: String,
    posture_readings: Vec<u8>,
    tempo_readings: Vec<f64>,
    steps: u32,
    turns: u32,
    energy: f64,
    duration_seconds: u64,
}

/// Core session state machine.
pub struct SessionEngine {
    clock: Rc<dyn Clock>,
    store: Rc<dyn PersistenceGateway>,
    permissions: Box<dyn PermissionGate>,
    permission_report: Option<PermissionReport>,
    sensors: Vec<SensorSlot>,
    inbox: Rc<RefCell<VecDeque<Reading>>>,
    tick: Interval,
    state: SessionState,
    /// Clock ms of the start, shifted forward by every pause.
    started_at_ms: u64,
    started_at: Option<DateTime<Utc>>,
    paused_at_ms: Option<u64>,
    data: SessionData,
    /// Motion counters restart from zero on every re-subscription; these
    /// hold the totals reached before the last pause.
    step_carry: u32,
    turn_carry: u32,
}

impl SessionEngine {
    /// Create an idle engine with no sensors, every permission granted and
    /// a 1 s tick.
    pub fn new(clock: Rc<dyn Clock>, store: Rc<dyn PersistenceGateway>) -> Self {
        Self {
            clock,
            store,
            permissions: Box::new(StaticPermissions::granting_all()),
            permission_report: None,
            sensors: Vec::new(),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            tick: Interval::new(SessionConfig::default().tick_interval_ms),
            state: SessionState::Idle,
            started_at_ms: 0,
            started_at: None,
            paused_at_ms: None,
            data: SessionData::default(),
            step_carry: 0,
            turn_carry: 0,
        }
    }

    pub fn with_permissions(mut self, permissions: Box<dyn PermissionGate>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_sensor(mut self, sensor: Box<dyn Sensor>) -> Self {
        self.sensors.push(SensorSlot {
            sensor,
            permitted: false,
        });
        self
    }

    pub fn with_tick_interval_ms(mut self, period_ms: u64) -> Self {
        self.tick = Interval::new(period_ms);
        self
    }

    pub fn with_config(self, config: &SessionConfig) -> Self {
        self.with_tick_interval_ms(config.tick_interval_ms)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn routine_name(&self) -> &str {
        &self.data.routine_name
    }

    /// Answers collected at `start`; `None` before the first start.
    pub fn permission_report(&self) -> Option<&PermissionReport> {
        self.permission_report.as_ref()
    }

    /// Active time so far, whole seconds. Frozen while paused.
    pub fn elapsed_seconds(&self) -> u64 {
        match self.state {
            SessionState::Idle => 0,
            SessionState::Active => self.clock.now_ms().saturating_sub(self.started_at_ms) / 1000,
            SessionState::Paused => self
                .paused_at_ms
                .unwrap_or(self.started_at_ms)
                .saturating_sub(self.started_at_ms)
                / 1000,
            SessionState::Ended => self.data.duration_seconds,
        }
    }

    /// `M:SS`
    pub fn formatted_time(&self) -> String {
        format_duration(self.elapsed_seconds())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            routine_name: self.data.routine_name.clone(),
            elapsed_seconds: self.elapsed_seconds(),
            formatted_time: self.formatted_time(),
            posture_score: rounded_mean(&self.data.posture_readings) as u8,
            avg_tempo_bpm: rounded_mean(&self.data.tempo_readings) as u32,
            steps: self.data.steps,
            turns: self.data.turns,
            energy: clamp_energy(self.data.energy),
            at: self.clock.now_utc(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Valid only from `Idle`. Sensors that are denied or fail to start are
    /// left out; the session starts regardless.
    pub fn start(&mut self, routine_name: &str) -> Option<Event> {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "start ignored");
            return None;
        }
        info!(routine = routine_name, "starting session");

        let report = self.permissions.request_all();
        for slot in &mut self.sensors {
            slot.permitted = report.status(slot.sensor.kind()).is_granted();
        }
        self.permission_report = Some(report);

        let now = self.clock.now_ms();
        self.data = SessionData {
            routine_name: routine_name.to_string(),
            ..SessionData::default()
        };
        self.inbox.borrow_mut().clear();
        self.step_carry = 0;
        self.turn_carry = 0;
        self.started_at_ms = now;
        self.started_at = Some(self.clock.now_utc());
        self.paused_at_ms = None;
        self.state = SessionState::Active;
        self.tick.arm(now);
        let sensors = self.start_sensors(now);

        Some(Event::SessionStarted {
            routine_name: routine_name.to_string(),
            sensors,
            at: self.clock.now_utc(),
        })
    }

    /// Valid only from `Active`. Sensors are fully stopped, not muted.
    pub fn pause(&mut self) -> Option<Event> {
        if self.state != SessionState::Active {
            debug!(state = ?self.state, "pause ignored");
            return None;
        }
        self.drain_readings();
        let now = self.clock.now_ms();
        self.data.duration_seconds = now.saturating_sub(self.started_at_ms) / 1000;
        self.tick.cancel();
        self.stop_sensors();
        self.step_carry = self.data.steps;
        self.turn_carry = self.data.turns;
        self.paused_at_ms = Some(now);
        self.state = SessionState::Paused;
        info!(elapsed_seconds = self.data.duration_seconds, "session paused");

        Some(Event::SessionPaused {
            elapsed_seconds: self.data.duration_seconds,
            at: self.clock.now_utc(),
        })
    }

    /// Valid only from `Paused`. The paused interval is excluded from the
    /// session duration.
    pub fn resume(&mut self) -> Option<Event> {
        if self.state != SessionState::Paused {
            debug!(state = ?self.state, "resume ignored");
            return None;
        }
        let now = self.clock.now_ms();
        let paused_for = now.saturating_sub(self.paused_at_ms.take().unwrap_or(now));
        self.started_at_ms += paused_for;
        self.state = SessionState::Active;
        self.tick.arm(now);
        let sensors = self.start_sensors(now);
        info!(paused_ms = paused_for, "session resumed");

        Some(Event::SessionResumed {
            elapsed_seconds: self.elapsed_seconds(),
            sensors,
            at: self.clock.now_utc(),
        })
    }

    /// Apply one reading. Ignored unless `Active`.
    pub fn update(&mut self, reading: Reading) {
        if self.state != SessionState::Active {
            return;
        }
        match reading {
            Reading::Posture(score) => self.data.posture_readings.push(score.min(MAX_POSTURE_SCORE)),
            Reading::Tempo(bpm) => self.data.tempo_readings.push(bpm),
            Reading::Steps(steps) => self.data.steps = self.step_carry + steps,
            Reading::Turns(turns) => self.data.turns = self.turn_carry + turns,
            Reading::Energy(energy) => self.data.energy = energy,
        }
        self.data.duration_seconds = self.elapsed_seconds();
    }

    /// Drive sensors and the session tick. Returns a snapshot on every tick.
    pub fn poll(&mut self) -> Option<Event> {
        if self.state != SessionState::Active {
            return None;
        }
        let now = self.clock.now_ms();
        for slot in &mut self.sensors {
            if slot.sensor.is_running() {
                slot.sensor.poll(now);
            }
        }
        self.drain_readings();

        if self.tick.poll(now) {
            self.data.duration_seconds = self.elapsed_seconds();
            return Some(self.snapshot());
        }
        None
    }

    /// Valid from `Active` or `Paused`. Persists the summary, then releases
    /// every sensor and timer whether or not persisting worked.
    pub fn end(&mut self) -> Option<SessionSummary> {
        if !matches!(self.state, SessionState::Active | SessionState::Paused) {
            debug!(state = ?self.state, "end ignored");
            return None;
        }
        info!("ending session");
        if self.state == SessionState::Active {
            self.drain_readings();
        }
        self.data.duration_seconds = self.elapsed_seconds();
        let summary = self.summary();

        match self.store.save_session(&summary) {
            Ok(record) => info!(id = record.id, "session saved"),
            Err(e) => warn!(error = %e, "failed to save session"),
        }

        self.tick.cancel();
        self.stop_sensors();
        self.inbox.borrow_mut().clear();
        self.paused_at_ms = None;
        self.state = SessionState::Ended;
        Some(summary)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn summary(&self) -> SessionSummary {
        let now = self.clock.now_utc();
        SessionSummary {
            routine_name: self.data.routine_name.clone(),
            started_at: self.started_at.unwrap_or(now),
            date: now,
            duration_seconds: self.data.duration_seconds,
            formatted_duration: format_duration(self.data.duration_seconds),
            posture_score: rounded_mean(&self.data.posture_readings) as u8,
            avg_tempo_bpm: rounded_mean(&self.data.tempo_readings) as u32,
            steps: self.data.steps,
            turns: self.data.turns,
            energy: clamp_energy(self.data.energy),
            posture_readings: self.data.posture_readings.clone(),
            tempo_readings: self.data.tempo_readings.clone(),
        }
    }

    fn sink(&self) -> ReadingSink {
        let inbox = self.inbox.clone();
        Rc::new(move |reading| inbox.borrow_mut().push_back(reading))
    }

    /// Start every permitted sensor; returns the ones that came up.
    fn start_sensors(&mut self, now: u64) -> Vec<SensorKind> {
        let sink = self.sink();
        let mut started = Vec::new();
        for slot in &mut self.sensors {
            let kind = slot.sensor.kind();
            if !slot.permitted {
                debug!(sensor = %kind, "sensor not permitted; skipping");
                continue;
            }
            match slot.sensor.start(sink.clone(), now) {
                Ok(()) => started.push(kind),
                Err(e) => warn!(sensor = %kind, error = %e, "sensor failed to start"),
            }
        }
        started
    }

    fn stop_sensors(&mut self) {
        for slot in &mut self.sensors {
            slot.sensor.stop();
        }
    }

    fn drain_readings(&mut self) {
        loop {
            // Release the borrow before `update`.
            let next = self.inbox.borrow_mut().pop_front();
            match next {
                Some(reading) => self.update(reading),
                None => break,
            }
        }
    }
}

const MAX_POSTURE_SCORE: u8 = 100;

fn clamp_energy(energy: f64) -> u8 {
    energy.round().clamp(0.0, 100.0) as u8
}
