//! Sensor collaborator contracts.
//!
//! The session engine never touches hardware. It drives collaborators
//! through [`Sensor`] and receives their output as [`Reading`]s pushed into
//! a [`ReadingSink`]. Hardware handles stay owned by the collaborator
//! between `start` and `stop`.

mod permissions;
mod subscription;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

pub use permissions::{PermissionGate, PermissionReport, PermissionStatus, StaticPermissions};
pub use subscription::{Channel, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Camera,
    Microphone,
    Motion,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Camera, SensorKind::Microphone, SensorKind::Motion];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Camera => "camera",
            SensorKind::Microphone => "microphone",
            SensorKind::Motion => "motion",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value produced by a collaborator.
///
/// `Posture` and `Tempo` are appended to the session's reading buffers;
/// the motion counters overwrite the running totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Reading {
    Posture(u8),
    Tempo(f64),
    Steps(u32),
    Turns(u32),
    Energy(f64),
}

pub type ReadingSink = Rc<dyn Fn(Reading)>;

pub trait Sensor {
    fn kind(&self) -> SensorKind;

    /// Acquire the underlying resource and begin emitting readings into `sink`.
    fn start(&mut self, sink: ReadingSink, now_ms: u64) -> Result<(), SensorError>;

    /// Drive internal timers. Called by the owner while the sensor runs.
    fn poll(&mut self, _now_ms: u64) {}

    /// Release every resource. Safe to call repeatedly, and when `start`
    /// never succeeded.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
