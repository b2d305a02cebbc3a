//! Motion tracker state machine.
//!
//! ```text
//! Idle -> RealSensor -> Fallback
//!   ^         |             |
//!   +---------+-------------+  (stop)
//! ```
//!
//! `RealSensor -> Fallback` happens when the device is unavailable at
//! subscribe time, or when the grace period ends without a single sample.
//! It is one-way until `stop`: real sensors are not retried.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::calibration::{Baseline, Calibrator};
use super::device::{Acceleration, MotionDevice, MotionSample};
use super::fallback::FallbackGenerator;
use crate::error::SensorError;
use crate::sensors::{Reading, ReadingSink, Sensor, SensorKind, Subscription};
use crate::storage::MotionConfig;
use crate::timer::{Deadline, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionMode {
    Idle,
    RealSensor,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionUpdate {
    pub steps: u32,
    pub turns: u32,
    /// 0.0 ..= 100.0
    pub energy: f64,
}

type UpdateCallback = Rc<dyn Fn(MotionUpdate)>;

/// Counters shared with the device handler.
#[derive(Debug)]
struct MotionState {
    tracking: bool,
    sample_seen: bool,
    step_count: u32,
    turn_count: u32,
    energy_level: f64,
    activity: VecDeque<f64>,
    last_magnitude: Option<f64>,
    last_step_ms: Option<u64>,
    calibrator: Option<Calibrator>,
    baseline: Option<Baseline>,
}

impl MotionState {
    fn new() -> Self {
        Self {
            tracking: false,
            sample_seen: false,
            step_count: 0,
            turn_count: 0,
            energy_level: 0.0,
            activity: VecDeque::new(),
            last_magnitude: None,
            last_step_ms: None,
            calibrator: None,
            baseline: None,
        }
    }

    fn reset(&mut self) {
        let baseline = self.baseline;
        let calibrator = self.calibrator.take();
        *self = Self::new();
        self.baseline = baseline;
        self.calibrator = calibrator;
    }

    fn update(&self) -> MotionUpdate {
        MotionUpdate {
            steps: self.step_count,
            turns: self.turn_count,
            energy: self.energy_level,
        }
    }

    fn on_sample(&mut self, sample: &MotionSample, config: &MotionConfig) -> Option<MotionUpdate> {
        if !self.tracking {
            return None;
        }
        self.sample_seen = true;
        let magnitude = sample.acceleration_magnitude;
        let previous = self.last_magnitude.replace(magnitude)?;

        let delta = (magnitude - previous).abs();
        let debounced = self
            .last_step_ms
            .map_or(true, |last| sample.timestamp_ms.saturating_sub(last) >= config.step_debounce_ms);
        if delta <= config.step_threshold || !debounced {
            return None;
        }

        self.step_count += 1;
        self.last_step_ms = Some(sample.timestamp_ms);
        self.record_activity(delta, config);
        debug!(steps = self.step_count, delta, "step detected");
        Some(self.update())
    }

    fn record_activity(&mut self, intensity: f64, config: &MotionConfig) {
        self.activity.push_back(intensity);
        while self.activity.len() > config.activity_window.max(1) {
            self.activity.pop_front();
        }
        let mean = self.activity.iter().sum::<f64>() / self.activity.len() as f64;
        self.energy_level = (mean * config.energy_scale).min(100.0);
    }
}

pub struct MotionTracker {
    config: MotionConfig,
    device: Box<dyn MotionDevice>,
    state: Rc<RefCell<MotionState>>,
    mode: MotionMode,
    subscription: Option<Subscription>,
    calibration: Option<Subscription>,
    grace: Deadline,
    fallback_tick: Interval,
    generator: FallbackGenerator,
    on_update: Option<UpdateCallback>,
}

impl MotionTracker {
    pub fn new(device: Box<dyn MotionDevice>, config: MotionConfig, generator: FallbackGenerator) -> Self {
        let fallback_tick = Interval::new(config.fallback_interval_ms);
        Self {
            config,
            device,
            state: Rc::new(RefCell::new(MotionState::new())),
            mode: MotionMode::Idle,
            subscription: None,
            calibration: None,
            grace: Deadline::new(),
            fallback_tick,
            generator,
            on_update: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> MotionMode {
        self.mode
    }

    pub fn is_tracking(&self) -> bool {
        self.state.borrow().tracking
    }

    pub fn step_count(&self) -> u32 {
        self.state.borrow().step_count
    }

    /// Only the fallback generator increments this; real-sensor turn
    /// detection is not implemented.
    pub fn turn_count(&self) -> u32 {
        self.state.borrow().turn_count
    }

    pub fn energy_level(&self) -> f64 {
        self.state.borrow().energy_level
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.state.borrow().baseline
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reset counters and subscribe to the device.
    ///
    /// An unavailable device switches straight to fallback. Any other
    /// subscribe failure is returned and the tracker stays idle.
    pub fn start_tracking(&mut self, on_update: impl Fn(MotionUpdate) + 'static, now_ms: u64) -> Result<(), SensorError> {
        if self.mode != MotionMode::Idle {
            self.stop_tracking();
        }
        info!("starting motion tracking");

        {
            let mut state = self.state.borrow_mut();
            state.reset();
            state.tracking = true;
        }
        let on_update: UpdateCallback = Rc::new(on_update);
        self.on_update = Some(on_update.clone());

        let state = self.state.clone();
        let config = self.config.clone();
        let handler = Box::new(move |a: &Acceleration| {
            let update = state.borrow_mut().on_sample(&a.to_sample(), &config);
            if let Some(update) = update {
                on_update(update);
            }
        });

        match self.device.subscribe(handler) {
            Ok(sub) => {
                self.subscription = Some(sub);
                self.mode = MotionMode::RealSensor;
                self.grace.arm(now_ms, self.config.fallback_grace_ms);
                Ok(())
            }
            Err(SensorError::DeviceUnavailable { reason, .. }) => {
                warn!(%reason, "motion device unavailable");
                self.enter_fallback(now_ms);
                Ok(())
            }
            Err(e) => {
                self.stop_tracking();
                Err(e)
            }
        }
    }

    /// Feed one sample directly, bypassing the device.
    pub fn on_sample(&mut self, sample: &MotionSample) {
        if self.mode != MotionMode::RealSensor {
            return;
        }
        let update = self.state.borrow_mut().on_sample(sample, &self.config);
        if let (Some(update), Some(cb)) = (update, &self.on_update) {
            cb(update);
        }
    }

    /// Start collecting a resting baseline from the device. Completes on
    /// its own after the configured number of samples and releases its
    /// subscription from inside the handler, so no polling is needed.
    pub fn calibrate(&mut self) -> Result<(), SensorError> {
        info!("calibrating motion sensors");
        if let Some(old) = self.calibration.take() {
            old.cancel();
        }
        self.state.borrow_mut().calibrator = Some(Calibrator::new(self.config.calibration_samples));
        let state = self.state.clone();
        let token: Rc<RefCell<Option<Subscription>>> = Rc::default();
        let own_token = token.clone();
        let sub = self.device.subscribe(Box::new(move |a: &Acceleration| {
            let mut state = state.borrow_mut();
            let baseline = state.calibrator.as_mut().and_then(|c| c.push(a));
            if let Some(baseline) = baseline {
                state.baseline = Some(baseline);
                state.calibrator = None;
                if let Some(sub) = own_token.borrow().as_ref() {
                    sub.cancel();
                }
            }
        }))?;
        *token.borrow_mut() = Some(sub.clone());
        self.calibration = Some(sub);
        Ok(())
    }

    pub fn poll_tracking(&mut self, now_ms: u64) {
        self.finish_calibration();
        match self.mode {
            MotionMode::RealSensor => {
                if self.grace.poll(now_ms) && !self.state.borrow().sample_seen {
                    warn!(grace_ms = self.config.fallback_grace_ms, "no motion samples received");
                    self.enter_fallback(now_ms);
                }
            }
            MotionMode::Fallback => {
                if self.fallback_tick.poll(now_ms) {
                    self.generate();
                }
            }
            MotionMode::Idle => {}
        }
    }

    /// Idempotent.
    pub fn stop_tracking(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.cancel();
        }
        if let Some(sub) = self.calibration.take() {
            sub.cancel();
        }
        self.grace.cancel();
        self.fallback_tick.cancel();
        self.on_update = None;
        {
            let mut state = self.state.borrow_mut();
            state.tracking = false;
            state.calibrator = None;
        }
        if self.mode != MotionMode::Idle {
            info!("motion tracking stopped");
        }
        self.mode = MotionMode::Idle;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_fallback(&mut self, now_ms: u64) {
        info!("switching motion tracking to fallback generator");
        if let Some(sub) = self.subscription.take() {
            sub.cancel();
        }
        self.grace.cancel();
        self.mode = MotionMode::Fallback;
        self.fallback_tick.arm(now_ms);
    }

    fn generate(&mut self) {
        let update = {
            let mut state = self.state.borrow_mut();
            let (steps, turns, energy) = self
                .generator
                .next(state.step_count, state.turn_count, state.energy_level);
            state.step_count = steps;
            state.turn_count = turns;
            state.energy_level = energy;
            state.update()
        };
        if let Some(cb) = &self.on_update {
            cb(update);
        }
    }

    fn finish_calibration(&mut self) {
        let done = self.calibration.is_some() && self.state.borrow().calibrator.is_none();
        if done {
            if let Some(sub) = self.calibration.take() {
                sub.cancel();
            }
            info!(baseline = ?self.baseline(), "motion calibration complete");
        }
    }
}

impl Sensor for MotionTracker {
    fn kind(&self) -> SensorKind {
        SensorKind::Motion
    }

    fn start(&mut self, sink: ReadingSink, now_ms: u64) -> Result<(), SensorError> {
        self.start_tracking(
            move |u| {
                sink(Reading::Steps(u.steps));
                sink(Reading::Turns(u.turns));
                sink(Reading::Energy(u.energy));
            },
            now_ms,
        )
    }

    fn poll(&mut self, now_ms: u64) {
        self.poll_tracking(now_ms);
    }

    fn stop(&mut self) {
        self.stop_tracking();
    }

    fn is_running(&self) -> bool {
        self.mode != MotionMode::Idle
    }
}
