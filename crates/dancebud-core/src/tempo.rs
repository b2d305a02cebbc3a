//! Tempo estimation from microphone bass energy.
//!
//! This is a bounded heuristic, not beat tracking: every sampling tick the
//! mean energy of the lowest frequency bins nudges an oscillation around
//! 110 BPM. Callers must not treat the result as musically accurate.
//!
//! ```text
//! bpm = 110 + (avg_bass / 255) * 20 + 10 * sin(now_secs)
//! ```

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::error::SensorError;
use crate::sensors::{Reading, ReadingSink, Sensor, SensorKind};
use crate::storage::AudioConfig;
use crate::timer::Interval;

const BASE_BPM: f64 = 110.0;
const ENERGY_SPAN_BPM: f64 = 20.0;
const OSCILLATION_BPM: f64 = 10.0;

/// Microphone capture plus frequency analyser.
///
/// The three teardown steps are separate so one failing cannot block the
/// others.
pub trait AudioInput {
    /// Acquire the stream and build the analysis graph.
    fn open(&mut self, config: &AudioConfig) -> Result<(), SensorError>;

    /// Fill `out` with the current byte frequency magnitudes (0-255).
    fn frequency_data(&mut self, out: &mut [u8]) -> Result<(), SensorError>;

    fn disconnect_source(&mut self) -> Result<(), SensorError>;
    fn stop_tracks(&mut self) -> Result<(), SensorError>;
    fn close_context(&mut self) -> Result<(), SensorError>;
}

/// Mean of the first `bass_bins` magnitudes.
pub fn bass_energy(bins: &[u8], bass_bins: usize) -> f64 {
    let bass = &bins[..bass_bins.min(bins.len())];
    let sum: u32 = bass.iter().map(|&b| b as u32).sum();
    sum as f64 / bass.len().max(1) as f64
}

pub fn estimate_bpm(avg_bass: f64, now_secs: f64) -> f64 {
    BASE_BPM + (avg_bass / 255.0) * ENERGY_SPAN_BPM + now_secs.sin() * OSCILLATION_BPM
}

type TempoCallback = Rc<dyn Fn(f64)>;

pub struct TempoEstimator {
    config: AudioConfig,
    input: Box<dyn AudioInput>,
    sampler: Interval,
    bins: Vec<u8>,
    monitoring: bool,
    acquired: bool,
    on_tempo: Option<TempoCallback>,
    last_bpm: Option<f64>,
}

impl TempoEstimator {
    pub fn new(input: Box<dyn AudioInput>, config: AudioConfig) -> Self {
        let sampler = Interval::new(config.sample_interval_ms);
        let bins = vec![0; config.frequency_bin_count()];
        Self {
            config,
            input,
            sampler,
            bins,
            monitoring: false,
            acquired: false,
            on_tempo: None,
            last_bpm: None,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn last_bpm(&self) -> Option<f64> {
        self.last_bpm
    }

    pub fn start_monitoring(&mut self, on_tempo: impl Fn(f64) + 'static, now_ms: u64) -> Result<(), SensorError> {
        if self.monitoring {
            self.stop_monitoring();
        }
        info!("starting audio monitoring");

        // Partially built graphs are torn down too.
        self.acquired = true;
        if let Err(e) = self.input.open(&self.config) {
            warn!(error = %e, "could not start audio monitoring");
            self.teardown();
            return Err(e);
        }

        self.on_tempo = Some(Rc::new(on_tempo));
        self.monitoring = true;
        self.sampler.arm(now_ms);
        Ok(())
    }

    pub fn poll_monitoring(&mut self, now_ms: u64) {
        if self.monitoring && self.sampler.poll(now_ms) {
            self.sample(now_ms);
        }
    }

    /// Idempotent; safe before any successful start.
    pub fn stop_monitoring(&mut self) {
        let was_monitoring = self.monitoring;
        self.monitoring = false;
        self.sampler.cancel();
        self.on_tempo = None;
        if self.acquired {
            self.teardown();
        }
        if was_monitoring {
            info!("audio monitoring stopped");
        }
    }

    fn sample(&mut self, now_ms: u64) {
        if let Err(e) = self.input.frequency_data(&mut self.bins) {
            warn!(error = %e, "tempo sample failed; skipping tick");
            return;
        }
        let avg_bass = bass_energy(&self.bins, self.config.bass_bins);
        let bpm = estimate_bpm(avg_bass, now_ms as f64 / 1000.0);
        debug!(avg_bass, bpm, "tempo sample");
        self.last_bpm = Some(bpm);
        if let Some(cb) = &self.on_tempo {
            cb(bpm);
        }
    }

    fn teardown(&mut self) {
        if let Err(e) = self.input.disconnect_source() {
            warn!(error = %e, "error disconnecting audio source");
        }
        if let Err(e) = self.input.stop_tracks() {
            warn!(error = %e, "error stopping media tracks");
        }
        if let Err(e) = self.input.close_context() {
            warn!(error = %e, "error closing audio context");
        }
        self.acquired = false;
    }
}

impl Sensor for TempoEstimator {
    fn kind(&self) -> SensorKind {
        SensorKind::Microphone
    }

    fn start(&mut self, sink: ReadingSink, now_ms: u64) -> Result<(), SensorError> {
        self.start_monitoring(move |bpm| sink(Reading::Tempo(bpm)), now_ms)
    }

    fn poll(&mut self, now_ms: u64) {
        self.poll_monitoring(now_ms);
    }

    fn stop(&mut self) {
        self.stop_monitoring();
    }

    fn is_running(&self) -> bool {
        self.monitoring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Calls {
        log: RefCell<Vec<&'static str>>,
    }

    struct FakeMic {
        calls: Rc<Calls>,
        level: u8,
        fail_open: bool,
        fail_sample: bool,
        fail_teardown: bool,
    }

    impl FakeMic {
        fn new(calls: Rc<Calls>) -> Self {
            Self {
                calls,
                level: 0,
                fail_open: false,
                fail_sample: false,
                fail_teardown: false,
            }
        }

        fn record(&self, step: &'static str) -> Result<(), SensorError> {
            self.calls.log.borrow_mut().push(step);
            if self.fail_teardown {
                Err(SensorError::transient(SensorKind::Microphone, step))
            } else {
                Ok(())
            }
        }
    }

    impl AudioInput for FakeMic {
        fn open(&mut self, config: &AudioConfig) -> Result<(), SensorError> {
            assert_eq!(config.fft_size, 2048);
            if self.fail_open {
                return Err(SensorError::PermissionDenied {
                    sensor: SensorKind::Microphone,
                });
            }
            Ok(())
        }

        fn frequency_data(&mut self, out: &mut [u8]) -> Result<(), SensorError> {
            if self.fail_sample {
                return Err(SensorError::transient(SensorKind::Microphone, "analyser gone"));
            }
            out.fill(self.level);
            Ok(())
        }

        fn disconnect_source(&mut self) -> Result<(), SensorError> {
            self.record("disconnect")
        }

        fn stop_tracks(&mut self) -> Result<(), SensorError> {
            self.record("tracks")
        }

        fn close_context(&mut self) -> Result<(), SensorError> {
            self.record("close")
        }
    }

    #[test]
    fn bpm_formula() {
        assert_eq!(estimate_bpm(0.0, 0.0), 110.0);
        assert_eq!(estimate_bpm(255.0, 0.0), 130.0);
        let peak = estimate_bpm(0.0, std::f64::consts::FRAC_PI_2);
        assert!((peak - 120.0).abs() < 1e-9);
    }

    #[test]
    fn bass_energy_uses_lowest_bins_only() {
        let mut bins = vec![0u8; 1024];
        bins[..20].fill(100);
        bins[20..].fill(255);
        assert_eq!(bass_energy(&bins, 20), 100.0);
        assert_eq!(bass_energy(&[], 20), 0.0);
    }

    #[test]
    fn samples_every_interval() {
        let calls = Rc::new(Calls::default());
        let mut mic = FakeMic::new(calls);
        mic.level = 255;
        let mut tempo = TempoEstimator::new(Box::new(mic), AudioConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        tempo.start_monitoring(move |bpm| s.borrow_mut().push(bpm), 0).unwrap();

        tempo.poll_monitoring(499);
        assert!(seen.borrow().is_empty());
        tempo.poll_monitoring(500);
        tempo.poll_monitoring(1_000);
        assert_eq!(seen.borrow().len(), 2);

        let expected = 130.0 + 0.5f64.sin() * 10.0;
        assert!((seen.borrow()[0] - expected).abs() < 1e-9);
        assert_eq!(tempo.last_bpm(), Some(seen.borrow()[1]));
    }

    #[test]
    fn failed_sample_is_skipped() {
        let calls = Rc::new(Calls::default());
        let mut mic = FakeMic::new(calls);
        mic.fail_sample = true;
        let mut tempo = TempoEstimator::new(Box::new(mic), AudioConfig::default());
        tempo.start_monitoring(|_| panic!("no reading expected"), 0).unwrap();
        tempo.poll_monitoring(500);
        assert!(tempo.is_monitoring());
        assert_eq!(tempo.last_bpm(), None);
    }

    #[test]
    fn teardown_steps_are_isolated() {
        let calls = Rc::new(Calls::default());
        let mut mic = FakeMic::new(calls.clone());
        mic.fail_teardown = true;
        let mut tempo = TempoEstimator::new(Box::new(mic), AudioConfig::default());
        tempo.start_monitoring(|_| {}, 0).unwrap();

        tempo.stop_monitoring();
        assert_eq!(*calls.log.borrow(), vec!["disconnect", "tracks", "close"]);
        assert!(!tempo.is_monitoring());

        // Second stop touches nothing.
        tempo.stop_monitoring();
        assert_eq!(calls.log.borrow().len(), 3);
        tempo.poll_monitoring(10_000);
        assert_eq!(tempo.last_bpm(), None);
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let calls = Rc::new(Calls::default());
        let mut tempo = TempoEstimator::new(Box::new(FakeMic::new(calls.clone())), AudioConfig::default());
        tempo.stop_monitoring();
        assert!(calls.log.borrow().is_empty());
    }

    #[test]
    fn failed_open_releases_partial_graph() {
        let calls = Rc::new(Calls::default());
        let mut mic = FakeMic::new(calls.clone());
        mic.fail_open = true;
        let mut tempo = TempoEstimator::new(Box::new(mic), AudioConfig::default());

        let err = tempo.start_monitoring(|_| {}, 0).unwrap_err();
        assert_eq!(err.sensor(), SensorKind::Microphone);
        assert_eq!(calls.log.borrow().len(), 3);
        assert!(!tempo.is_monitoring());
    }
}
