//! Posture scoring.
//!
//! Up to three alignment checks run on a pose. A check only counts when the
//! keypoints it needs are confident enough and its denominator is non-zero;
//! skipped checks are left out of the average rather than scored as zero.
//!
//! | check            | keypoints                 | weight | cutoff |
//! |------------------|---------------------------|--------|--------|
//! | shoulder level   | both shoulders            | 40     | 0.2    |
//! | back straightness| left shoulder, left hip   | 35     | 0.3    |
//! | hip level        | both hips                 | 25     | 0.2    |

use serde::{Deserialize, Serialize};

use super::keypoint::{landmark, Keypoint, Pose};

const SHOULDER_WEIGHT: f64 = 40.0;
const SHOULDER_CUTOFF: f64 = 0.2;
const BACK_WEIGHT: f64 = 35.0;
const BACK_CUTOFF: f64 = 0.3;
const HIP_WEIGHT: f64 = 25.0;
const HIP_CUTOFF: f64 = 0.2;

/// Weighted contribution of each check, `None` when it was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PostureChecks {
    pub shoulder_level: Option<f64>,
    pub back_straightness: Option<f64>,
    pub hip_level: Option<f64>,
}

impl PostureChecks {
    pub fn evaluated(&self) -> usize {
        self.iter().count()
    }

    fn iter(&self) -> impl Iterator<Item = f64> {
        [self.shoulder_level, self.back_straightness, self.hip_level]
            .into_iter()
            .flatten()
    }

    /// Mean of the evaluated checks, rounded; 0 when none ran.
    pub fn score(&self) -> u8 {
        let n = self.evaluated();
        if n == 0 {
            return 0;
        }
        let mean = self.iter().sum::<f64>() / n as f64;
        mean.round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoseScorer {
    min_confidence: f64,
}

impl PoseScorer {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn score(&self, pose: &Pose) -> u8 {
        self.checks(pose).score()
    }

    /// Score the first pose of a model result, if any.
    pub fn score_first(&self, poses: &[Pose]) -> Option<u8> {
        poses.first().map(|p| self.score(p))
    }

    pub fn checks(&self, pose: &Pose) -> PostureChecks {
        let left_shoulder = pose.keypoint(landmark::LEFT_SHOULDER);
        let right_shoulder = pose.keypoint(landmark::RIGHT_SHOULDER);
        let left_hip = pose.keypoint(landmark::LEFT_HIP);
        let right_hip = pose.keypoint(landmark::RIGHT_HIP);

        PostureChecks {
            shoulder_level: self.level_check(
                left_shoulder,
                right_shoulder,
                SHOULDER_WEIGHT,
                SHOULDER_CUTOFF,
            ),
            back_straightness: self.back_check(left_shoulder, left_hip),
            hip_level: self.level_check(left_hip, right_hip, HIP_WEIGHT, HIP_CUTOFF),
        }
    }

    fn confident(&self, a: &Keypoint, b: &Keypoint) -> bool {
        a.confidence > self.min_confidence && b.confidence > self.min_confidence
    }

    /// Vertical offset relative to horizontal span of a left/right pair.
    fn level_check(&self, left: &Keypoint, right: &Keypoint, weight: f64, cutoff: f64) -> Option<f64> {
        if !self.confident(left, right) {
            return None;
        }
        let span = (left.x - right.x).abs();
        if span == 0.0 {
            return None;
        }
        let ratio = (left.y - right.y).abs() / span;
        Some(weight * (1.0 - ratio / cutoff).max(0.0))
    }

    /// Horizontal lean relative to torso height on the left side.
    fn back_check(&self, shoulder: &Keypoint, hip: &Keypoint) -> Option<f64> {
        if !self.confident(shoulder, hip) {
            return None;
        }
        let height = (shoulder.y - hip.y).abs();
        if height == 0.0 {
            return None;
        }
        let ratio = (shoulder.x - hip.x).abs() / height;
        Some(BACK_WEIGHT * (1.0 - ratio / BACK_CUTOFF).max(0.0))
    }
}

impl Default for PoseScorer {
    fn default() -> Self {
        Self::new(0.5)
    }
}
