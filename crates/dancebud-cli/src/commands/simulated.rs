//! Stand-in devices for running sessions on a host with no camera,
//! microphone or accelerometer attached.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dancebud_core::error::SensorError;
use dancebud_core::motion::{Acceleration, MotionFeed};
use dancebud_core::pose::{landmark, Camera, Frame, Keypoint, Pose, PoseSource, KEYPOINT_COUNT};
use dancebud_core::storage::AudioConfig;
use dancebud_core::{AudioInput, SensorKind};

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;
const GRAVITY: f64 = 9.8;

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Produces empty frames of a fixed size.
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    open: bool,
}

impl Camera for SimulatedCamera {
    fn open(&mut self) -> Result<(), SensorError> {
        self.open = true;
        Ok(())
    }

    fn capture(&mut self, now_ms: u64) -> Result<Frame, SensorError> {
        if !self.open {
            return Err(SensorError::unavailable(SensorKind::Camera, "camera is not open"));
        }
        Ok(Frame {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            captured_at_ms: now_ms,
            pixels: Vec::new(),
        })
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// A standing dancer whose shoulders and hips wobble a few pixels per frame.
pub struct SwayingDancer {
    rng: StdRng,
    sway_px: f64,
}

impl SwayingDancer {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: rng_for(seed),
            sway_px: 12.0,
        }
    }

    fn jitter(&mut self) -> f64 {
        self.rng.gen_range(-self.sway_px..=self.sway_px)
    }
}

impl PoseSource for SwayingDancer {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Pose>, SensorError> {
        let cx = frame.width as f64 / 2.0;
        let mut points: Vec<Keypoint> = (0..KEYPOINT_COUNT)
            .map(|id| Keypoint::new(id, cx, 60.0 + id as f64 * 20.0, 0.9))
            .collect();

        let mut place = |id: usize, x: f64, y: f64| {
            points[id] = Keypoint::new(id, x, y, 0.9);
        };
        place(landmark::LEFT_SHOULDER, cx - 60.0 + self.jitter(), 150.0 + self.jitter());
        place(landmark::RIGHT_SHOULDER, cx + 60.0, 150.0);
        place(landmark::LEFT_HIP, cx - 55.0 + self.jitter(), 300.0 + self.jitter());
        place(landmark::RIGHT_HIP, cx + 55.0, 300.0);

        let pose = Pose::from_keypoints(points).map_err(|e| SensorError::TransientDetectionFailure {
            sensor: SensorKind::Camera,
            reason: e.to_string(),
        })?;
        Ok(vec![pose])
    }
}

/// Bass that pulses roughly twice a second over a noisy floor, run through
/// the same smoothing and decibel-to-byte mapping as a browser analyser.
pub struct SyntheticAudio {
    rng: StdRng,
    frame: u64,
    smoothing: f64,
    min_db: f64,
    max_db: f64,
    levels: Vec<f64>,
}

impl SyntheticAudio {
    pub fn new(seed: Option<u64>) -> Self {
        let config = AudioConfig::default();
        Self {
            rng: rng_for(seed),
            frame: 0,
            smoothing: config.smoothing_time_constant,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            levels: Vec::new(),
        }
    }

    fn to_byte(&self, level: f64) -> u8 {
        if level <= 0.0 {
            return 0;
        }
        let db = 20.0 * level.log10();
        let scaled = (db - self.min_db) / (self.max_db - self.min_db) * 255.0;
        scaled.clamp(0.0, 255.0) as u8
    }
}

impl AudioInput for SyntheticAudio {
    fn open(&mut self, config: &AudioConfig) -> Result<(), SensorError> {
        self.frame = 0;
        self.smoothing = config.smoothing_time_constant.clamp(0.0, 1.0);
        self.min_db = config.min_decibels;
        self.max_db = config.max_decibels;
        self.levels = vec![0.0; config.frequency_bin_count()];
        Ok(())
    }

    fn frequency_data(&mut self, out: &mut [u8]) -> Result<(), SensorError> {
        self.frame += 1;
        let pulse_db = if self.frame % 5 == 0 { -20.0 } else { -60.0 };
        self.levels.resize(out.len(), 0.0);
        for i in 0..out.len() {
            let floor_db = if i < 10 { pulse_db } else { -80.0 };
            let magnitude = 10f64.powf((floor_db + self.rng.gen_range(0.0..6.0)) / 20.0);
            let level = self.smoothing * self.levels[i] + (1.0 - self.smoothing) * magnitude;
            self.levels[i] = level;
            out[i] = self.to_byte(level);
        }
        Ok(())
    }

    fn disconnect_source(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn stop_tracks(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn close_context(&mut self) -> Result<(), SensorError> {
        self.levels.clear();
        Ok(())
    }
}

/// Pushes a bouncing acceleration stream into a motion feed.
pub struct Bouncer {
    feed: MotionFeed,
    rng: StdRng,
}

impl Bouncer {
    pub fn new(feed: MotionFeed, seed: Option<u64>) -> Self {
        Self {
            feed,
            rng: rng_for(seed),
        }
    }

    pub fn tick(&mut self, now_ms: u64) {
        // Alternate between rest and a jolt so steps register on the way up.
        let bounce = if (now_ms / 250) % 2 == 0 { 0.0 } else { self.rng.gen_range(1.5..3.5) };
        let sway = self.rng.gen_range(-0.4..0.4);
        self.feed.push(Acceleration::new(now_ms, sway, 0.0, GRAVITY + bounce));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dancebud_core::PoseScorer;

    #[test]
    fn swaying_dancer_scores_within_range() {
        let mut dancer = SwayingDancer::new(Some(3));
        let mut camera = SimulatedCamera::default();
        camera.open().unwrap();
        let frame = camera.capture(0).unwrap();
        let poses = dancer.estimate(&frame).unwrap();
        let score = PoseScorer::default().score(&poses[0]);
        assert!(score > 0 && score <= 40);
    }

    #[test]
    fn synthetic_audio_maps_decibels_to_bytes() {
        let config = AudioConfig {
            smoothing_time_constant: 0.0,
            ..AudioConfig::default()
        };
        let mut audio = SyntheticAudio::new(Some(1));
        audio.open(&config).unwrap();
        let mut bins = vec![0u8; config.frequency_bin_count()];
        for _ in 0..5 {
            audio.frequency_data(&mut bins).unwrap();
        }
        // -20..-14 dB on the pulse, -80..-74 dB elsewhere, over -90..-10 dB.
        assert!(bins[..10].iter().all(|&b| b >= 200));
        assert!(bins[10..].iter().all(|&b| (20..=60).contains(&b)));
    }

    #[test]
    fn smoothing_damps_the_first_frame() {
        let raw_config = AudioConfig {
            smoothing_time_constant: 0.0,
            ..AudioConfig::default()
        };
        let smoothed_config = AudioConfig::default();

        let mut raw = SyntheticAudio::new(Some(4));
        let mut smoothed = SyntheticAudio::new(Some(4));
        raw.open(&raw_config).unwrap();
        smoothed.open(&smoothed_config).unwrap();

        let mut raw_bins = vec![0u8; 64];
        let mut smoothed_bins = vec![0u8; 64];
        raw.frequency_data(&mut raw_bins).unwrap();
        smoothed.frequency_data(&mut smoothed_bins).unwrap();
        assert!(smoothed_bins[0] < raw_bins[0]);
    }
}
