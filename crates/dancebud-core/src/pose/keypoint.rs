use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const KEYPOINT_COUNT: usize = 17;

/// Semantic keypoint indices (COCO ordering).
pub mod landmark {
    pub const NOSE: usize = 0;
    pub const LEFT_EYE: usize = 1;
    pub const RIGHT_EYE: usize = 2;
    pub const LEFT_EAR: usize = 3;
    pub const RIGHT_EAR: usize = 4;
    pub const LEFT_SHOULDER: usize = 5;
    pub const RIGHT_SHOULDER: usize = 6;
    pub const LEFT_ELBOW: usize = 7;
    pub const RIGHT_ELBOW: usize = 8;
    pub const LEFT_WRIST: usize = 9;
    pub const RIGHT_WRIST: usize = 10;
    pub const LEFT_HIP: usize = 11;
    pub const RIGHT_HIP: usize = 12;
    pub const LEFT_KNEE: usize = 13;
    pub const RIGHT_KNEE: usize = 14;
    pub const LEFT_ANKLE: usize = 15;
    pub const RIGHT_ANKLE: usize = 16;
}

/// Limb connections drawn by an overlay renderer.
pub const SKELETON: [(usize, usize); 12] = [
    (landmark::LEFT_SHOULDER, landmark::RIGHT_SHOULDER),
    (landmark::LEFT_SHOULDER, landmark::LEFT_ELBOW),
    (landmark::LEFT_ELBOW, landmark::LEFT_WRIST),
    (landmark::RIGHT_SHOULDER, landmark::RIGHT_ELBOW),
    (landmark::RIGHT_ELBOW, landmark::RIGHT_WRIST),
    (landmark::LEFT_SHOULDER, landmark::LEFT_HIP),
    (landmark::RIGHT_SHOULDER, landmark::RIGHT_HIP),
    (landmark::LEFT_HIP, landmark::RIGHT_HIP),
    (landmark::LEFT_HIP, landmark::LEFT_KNEE),
    (landmark::LEFT_KNEE, landmark::LEFT_ANKLE),
    (landmark::RIGHT_HIP, landmark::RIGHT_KNEE),
    (landmark::RIGHT_KNEE, landmark::RIGHT_ANKLE),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    /// 0.0 ..= 1.0
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(id: usize, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            id,
            x,
            y,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    keypoints: [Keypoint; KEYPOINT_COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KEYPOINT_COUNT]) -> Self {
        Self { keypoints }
    }

    /// Build a pose from model output, which must contain exactly 17 keypoints.
    pub fn from_keypoints(keypoints: Vec<Keypoint>) -> Result<Self, ValidationError> {
        let actual = keypoints.len();
        let keypoints: [Keypoint; KEYPOINT_COUNT] =
            keypoints
                .try_into()
                .map_err(|_| ValidationError::WrongLength {
                    collection: "keypoints".into(),
                    expected: KEYPOINT_COUNT,
                    actual,
                })?;
        Ok(Self { keypoints })
    }

    pub fn keypoints(&self) -> &[Keypoint; KEYPOINT_COUNT] {
        &self.keypoints
    }

    pub fn keypoint(&self, index: usize) -> &Keypoint {
        &self.keypoints[index]
    }
}

/// Skeleton segments whose endpoints are both confident enough to draw.
pub fn skeleton_segments(pose: &Pose, min_confidence: f64) -> Vec<(Keypoint, Keypoint)> {
    SKELETON
        .iter()
        .map(|&(a, b)| (*pose.keypoint(a), *pose.keypoint(b)))
        .filter(|(a, b)| a.confidence > min_confidence && b.confidence > min_confidence)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_pose(confidence: f64) -> Vec<Keypoint> {
        (0..KEYPOINT_COUNT)
            .map(|i| Keypoint::new(i, i as f64, i as f64, confidence))
            .collect()
    }

    #[test]
    fn from_keypoints_requires_seventeen_points() {
        assert!(Pose::from_keypoints(uniform_pose(0.9)).is_ok());

        let mut short = uniform_pose(0.9);
        short.pop();
        let err = Pose::from_keypoints(short).unwrap_err();
        assert_eq!(err.to_string(), "Expected 17 keypoints, got 16");
    }

    #[test]
    fn skeleton_drops_low_confidence_segments() {
        let mut points = uniform_pose(0.9);
        points[landmark::LEFT_KNEE].confidence = 0.2;
        let pose = Pose::from_keypoints(points).unwrap();

        let segments = skeleton_segments(&pose, 0.3);
        // Both left-knee segments disappear.
        assert_eq!(segments.len(), SKELETON.len() - 2);
    }
}
