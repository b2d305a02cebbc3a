//! Pose tracking collaborator.
//!
//! Owns the camera between `start` and `stop`. On every detection interval
//! it captures a frame, hands it to the pose model and scores the first
//! detected person. A failed capture or estimate only costs that frame.

use std::rc::Rc;

use tracing::{debug, info, warn};

use super::keypoint::{skeleton_segments, Keypoint, Pose};
use super::scorer::PoseScorer;
use crate::error::SensorError;
use crate::sensors::{Reading, ReadingSink, Sensor, SensorKind};
use crate::storage::PoseConfig;
use crate::timer::Interval;

/// One captured video frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub captured_at_ms: u64,
    pub pixels: Vec<u8>,
}

pub trait Camera {
    fn open(&mut self) -> Result<(), SensorError>;
    fn capture(&mut self, now_ms: u64) -> Result<Frame, SensorError>;
    /// Release the stream. Must tolerate being called when not open.
    fn close(&mut self);
}

/// The pose-detection model, treated as a black box.
pub trait PoseSource {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Pose>, SensorError>;
}

type PoseCallback = Rc<dyn Fn(&Pose, u8)>;

pub struct PoseTracker {
    camera: Box<dyn Camera>,
    source: Box<dyn PoseSource>,
    scorer: PoseScorer,
    detect: Interval,
    on_pose: Option<PoseCallback>,
    draw_confidence: f64,
    last_pose: Option<Pose>,
    last_score: Option<u8>,
}

impl PoseTracker {
    pub fn new(camera: Box<dyn Camera>, source: Box<dyn PoseSource>, scorer: PoseScorer, detect_interval_ms: u64) -> Self {
        Self {
            camera,
            source,
            scorer,
            detect: Interval::new(detect_interval_ms),
            on_pose: None,
            draw_confidence: PoseConfig::default().draw_confidence,
            last_pose: None,
            last_score: None,
        }
    }

    /// Scoring floor, drawing floor and detection cadence taken from `[pose]`.
    pub fn with_config(camera: Box<dyn Camera>, source: Box<dyn PoseSource>, config: &PoseConfig) -> Self {
        let mut tracker = Self::new(camera, source, PoseScorer::new(config.score_confidence), config.detect_interval_ms);
        tracker.draw_confidence = config.draw_confidence;
        tracker
    }

    /// Limb segments of the most recent pose that clear the drawing floor,
    /// for an overlay renderer.
    pub fn last_skeleton(&self) -> Vec<(Keypoint, Keypoint)> {
        self.last_pose
            .as_ref()
            .map(|pose| skeleton_segments(pose, self.draw_confidence))
            .unwrap_or_default()
    }

    pub fn last_score(&self) -> Option<u8> {
        self.last_score
    }

    pub fn start_detection(&mut self, on_pose: impl Fn(&Pose, u8) + 'static, now_ms: u64) -> Result<(), SensorError> {
        if self.on_pose.is_some() {
            self.stop_detection();
        }
        info!("starting pose detection");
        if let Err(e) = self.camera.open() {
            self.camera.close();
            return Err(e);
        }
        self.on_pose = Some(Rc::new(on_pose));
        self.detect.arm(now_ms);
        Ok(())
    }

    pub fn stop_detection(&mut self) {
        self.detect.cancel();
        if self.on_pose.take().is_some() {
            self.camera.close();
            info!("pose detection stopped");
        }
    }

    fn detect_once(&mut self, now_ms: u64) {
        let frame = match self.camera.capture(now_ms) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame capture failed; skipping");
                return;
            }
        };
        let poses = match self.source.estimate(&frame) {
            Ok(poses) => poses,
            Err(e) => {
                warn!(error = %e, "pose estimation failed; skipping");
                return;
            }
        };
        let Some(pose) = poses.first() else {
            debug!("no pose in frame");
            return;
        };
        let score = self.scorer.score(pose);
        self.last_score = Some(score);
        if let Some(cb) = &self.on_pose {
            cb(pose, score);
        }
        self.last_pose = Some(pose.clone());
    }
}

impl Sensor for PoseTracker {
    fn kind(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn start(&mut self, sink: ReadingSink, now_ms: u64) -> Result<(), SensorError> {
        self.start_detection(move |_, score| sink(Reading::Posture(score)), now_ms)
    }

    fn poll(&mut self, now_ms: u64) {
        if self.on_pose.is_some() && self.detect.poll(now_ms) {
            self.detect_once(now_ms);
        }
    }

    fn stop(&mut self) {
        self.stop_detection();
    }

    fn is_running(&self) -> bool {
        self.on_pose.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::{landmark, Keypoint, KEYPOINT_COUNT, SKELETON};
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct CameraLog {
        opened: Cell<u32>,
        closed: Cell<u32>,
    }

    struct FakeCamera {
        log: Rc<CameraLog>,
        fail_open: bool,
    }

    impl Camera for FakeCamera {
        fn open(&mut self) -> Result<(), SensorError> {
            if self.fail_open {
                return Err(SensorError::PermissionDenied {
                    sensor: SensorKind::Camera,
                });
            }
            self.log.opened.set(self.log.opened.get() + 1);
            Ok(())
        }

        fn capture(&mut self, now_ms: u64) -> Result<Frame, SensorError> {
            Ok(Frame {
                captured_at_ms: now_ms,
                ..Frame::default()
            })
        }

        fn close(&mut self) {
            self.log.closed.set(self.log.closed.get() + 1);
        }
    }

    /// Fails every other call.
    struct FlakySource {
        calls: u32,
    }

    impl PoseSource for FlakySource {
        fn estimate(&mut self, _frame: &Frame) -> Result<Vec<Pose>, SensorError> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(SensorError::transient(SensorKind::Camera, "model hiccup"));
            }
            let mut points: Vec<Keypoint> = (0..KEYPOINT_COUNT)
                .map(|i| Keypoint::new(i, 0.0, 0.0, 0.9))
                .collect();
            points[landmark::LEFT_SHOULDER] = Keypoint::new(5, 100.0, 100.0, 0.9);
            points[landmark::RIGHT_SHOULDER] = Keypoint::new(6, 200.0, 100.0, 0.9);
            points[landmark::LEFT_HIP] = Keypoint::new(11, 100.0, 300.0, 0.2);
            points[landmark::RIGHT_HIP] = Keypoint::new(12, 200.0, 300.0, 0.2);
            let pose = Pose::from_keypoints(points)
                .map_err(|e| SensorError::transient(SensorKind::Camera, e.to_string()))?;
            Ok(vec![pose])
        }
    }

    fn tracker(log: Rc<CameraLog>, fail_open: bool) -> PoseTracker {
        PoseTracker::new(
            Box::new(FakeCamera { log, fail_open }),
            Box::new(FlakySource { calls: 0 }),
            PoseScorer::default(),
            100,
        )
    }

    #[test]
    fn emits_posture_readings_and_skips_failed_frames() {
        let log = Rc::new(CameraLog::default());
        let mut tracker = tracker(log.clone(), false);
        let readings = Rc::new(RefCell::new(Vec::new()));
        let sink_readings = readings.clone();
        let sink: ReadingSink = Rc::new(move |r| sink_readings.borrow_mut().push(r));

        tracker.start(sink, 0).unwrap();
        for t in [100, 200, 300] {
            tracker.poll(t);
        }

        // Second estimate failed; first and third scored shoulders only.
        assert_eq!(*readings.borrow(), vec![Reading::Posture(40), Reading::Posture(40)]);
        assert_eq!(tracker.last_score(), Some(40));
    }

    #[test]
    fn skeleton_uses_the_configured_drawing_floor() {
        let log = Rc::new(CameraLog::default());
        let mut strict = tracker(log.clone(), false);
        assert!(strict.last_skeleton().is_empty());
        strict.start(Rc::new(|_| {}), 0).unwrap();
        strict.poll(100);
        // Hips sit at 0.2, so every hip segment is dropped at the default 0.3.
        assert_eq!(strict.last_skeleton().len(), 7);

        let config = PoseConfig {
            draw_confidence: 0.1,
            ..PoseConfig::default()
        };
        let mut loose = PoseTracker::with_config(
            Box::new(FakeCamera { log, fail_open: false }),
            Box::new(FlakySource { calls: 0 }),
            &config,
        );
        loose.start(Rc::new(|_| {}), 0).unwrap();
        loose.poll(config.detect_interval_ms);
        assert_eq!(loose.last_skeleton().len(), SKELETON.len());
    }

    #[test]
    fn stop_is_idempotent_and_releases_camera_once() {
        let log = Rc::new(CameraLog::default());
        let mut tracker = tracker(log.clone(), false);
        tracker.start(Rc::new(|_| {}), 0).unwrap();
        tracker.stop();
        tracker.stop();
        assert_eq!(log.opened.get(), 1);
        assert_eq!(log.closed.get(), 1);
        assert!(!tracker.is_running());
    }

    #[test]
    fn failed_open_leaves_tracker_stopped() {
        let log = Rc::new(CameraLog::default());
        let mut tracker = tracker(log.clone(), true);
        let err = tracker.start(Rc::new(|_| {}), 0).unwrap_err();
        assert_eq!(err.sensor(), SensorKind::Camera);
        assert!(!tracker.is_running());
        tracker.stop();
    }
}
