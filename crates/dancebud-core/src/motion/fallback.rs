use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Synthetic motion stream for hosts whose sensors never report.
///
/// Each tick adds 0-2 steps, occasionally a turn, and drifts energy toward a
/// random level in 30..=80. Values are plausible, not measured.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    rng: Pcg64,
}

const TURN_PROBABILITY: f64 = 0.1;
const ENERGY_SMOOTHING: f64 = 0.7;

impl FallbackGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Next `(steps, turns, energy)` given the current counters.
    pub fn next(&mut self, steps: u32, turns: u32, energy: f64) -> (u32, u32, f64) {
        let steps = steps.saturating_add(self.rng.gen_range(0..=2));
        let turns = if self.rng.gen_bool(TURN_PROBABILITY) {
            turns.saturating_add(1)
        } else {
            turns
        };
        let target: f64 = self.rng.gen_range(30.0..=80.0);
        let energy = (energy * ENERGY_SMOOTHING + target * (1.0 - ENERGY_SMOOTHING)).clamp(0.0, 100.0);
        (steps, turns, energy)
    }
}
