//! Accelerometer-based step counting and energy estimation.
//!
//! When no real acceleration sample arrives within the grace period the
//! tracker switches, for the rest of the session, to a synthetic generator
//! so hosts without motion hardware still see live counters.

mod calibration;
mod device;
mod fallback;
mod tracker;

pub use calibration::{Baseline, Calibrator};
pub use device::{Acceleration, ChannelMotionDevice, MotionDevice, MotionFeed, MotionSample, UnavailableMotionDevice};
pub use fallback::FallbackGenerator;
pub use tracker::{MotionMode, MotionTracker, MotionUpdate};
