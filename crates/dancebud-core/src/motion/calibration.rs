use serde::{Deserialize, Serialize};

use super::device::Acceleration;

/// Resting acceleration per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Averages the first `needed` samples into a [`Baseline`].
#[derive(Debug, Clone)]
pub struct Calibrator {
    needed: usize,
    readings: Vec<Acceleration>,
}

impl Calibrator {
    pub fn new(needed: usize) -> Self {
        let needed = needed.max(1);
        Self {
            needed,
            readings: Vec::with_capacity(needed),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.readings.len() >= self.needed
    }

    /// Returns the baseline on the sample that completes calibration, and
    /// on every call after that.
    pub fn push(&mut self, acceleration: &Acceleration) -> Option<Baseline> {
        if !self.is_complete() {
            self.readings.push(*acceleration);
        }
        self.baseline()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        if !self.is_complete() {
            return None;
        }
        let n = self.readings.len() as f64;
        let (x, y, z) = self
            .readings
            .iter()
            .fold((0.0, 0.0, 0.0), |(x, y, z), a| (x + a.x, y + a.y, z + a.z));
        Some(Baseline {
            x: x / n,
            y: y / n,
            z: z / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_after_enough_samples() {
        let mut cal = Calibrator::new(3);
        assert!(cal.push(&Acceleration::new(0, 1.0, 0.0, 9.0)).is_none());
        assert!(cal.push(&Acceleration::new(1, 2.0, 0.0, 10.0)).is_none());
        let baseline = cal.push(&Acceleration::new(2, 3.0, 0.0, 11.0)).unwrap();
        assert_eq!(baseline, Baseline { x: 2.0, y: 0.0, z: 10.0 });

        // Later samples don't move it.
        cal.push(&Acceleration::new(3, 100.0, 100.0, 100.0));
        assert_eq!(cal.baseline(), Some(baseline));
    }
}
