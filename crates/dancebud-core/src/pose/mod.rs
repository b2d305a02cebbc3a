//! Camera-based posture scoring.
//!
//! - [`Pose`]: 17 COCO keypoints for one detected person
//! - [`PoseScorer`]: stateless posture score (0-100)
//! - [`PoseTracker`]: camera + pose model collaborator that emits posture readings

mod keypoint;
mod scorer;
mod tracker;

pub use keypoint::{landmark, skeleton_segments, Keypoint, Pose, SKELETON, KEYPOINT_COUNT};
pub use scorer::{PostureChecks, PoseScorer};
pub use tracker::{Camera, Frame, PoseSource, PoseTracker};
