//! Permission layer.
//!
//! Each sensor is asked for once. A denial only means that sensor's readings
//! will be absent; it is never fatal.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::SensorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Outcome of asking for every sensor, suitable for storing as a setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionReport {
    pub camera: PermissionStatus,
    pub microphone: PermissionStatus,
    pub motion: PermissionStatus,
}

impl PermissionReport {
    pub fn status(&self, kind: SensorKind) -> PermissionStatus {
        match kind {
            SensorKind::Camera => self.camera,
            SensorKind::Microphone => self.microphone,
            SensorKind::Motion => self.motion,
        }
    }
}

pub trait PermissionGate {
    fn request(&mut self, kind: SensorKind) -> PermissionStatus;

    fn request_all(&mut self) -> PermissionReport {
        info!("requesting sensor permissions");
        let mut ask = |kind| {
            let status = self.request(kind);
            if !status.is_granted() {
                warn!(sensor = %kind, "permission request denied");
            }
            status
        };
        let camera = ask(SensorKind::Camera);
        let microphone = ask(SensorKind::Microphone);
        let motion = ask(SensorKind::Motion);
        PermissionReport {
            camera,
            microphone,
            motion,
        }
    }
}

/// Fixed answers, decided up front by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    granted: HashSet<SensorKind>,
}

impl StaticPermissions {
    pub fn granting_all() -> Self {
        Self {
            granted: SensorKind::ALL.into_iter().collect(),
        }
    }

    pub fn denying_all() -> Self {
        Self::default()
    }

    pub fn grant(mut self, kind: SensorKind) -> Self {
        self.granted.insert(kind);
        self
    }

    pub fn deny(mut self, kind: SensorKind) -> Self {
        self.granted.remove(&kind);
        self
    }
}

impl PermissionGate for StaticPermissions {
    fn request(&mut self, kind: SensorKind) -> PermissionStatus {
        if self.granted.contains(&kind) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}
