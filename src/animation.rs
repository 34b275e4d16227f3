use tracing::warn;

use crate::parameters::{Change, Parameters};

/// Fallback coefficient when a step produces garbage.
const SAFE_COEFF: f64 = 2.0;

/// Sweeps the spiral coefficient back and forth between the configured
/// bounds, one increment per animation tick.
#[derive(Debug)]
pub struct SpiralAnimator {
    direction: f64,
}

impl Default for SpiralAnimator {
    fn default() -> Self {
        Self { direction: 1.0 }
    }
}

impl SpiralAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rising(&self) -> bool {
        self.direction > 0.0
    }

    pub fn step(&mut self, parameters: &mut Parameters) -> Change {
        let min = parameters.spiral_animation_min();
        let max = parameters.spiral_animation_max();

        let mut next =
            parameters.spiral_coeff() + parameters.spiral_animation_increment() * self.direction;
        if !next.is_finite() {
            warn!("spiral coefficient animation produced a non-finite value, resetting");
            next = SAFE_COEFF.max(min).min(max);
        }
        if next <= min || next >= max {
            self.direction = -self.direction;
            next = next.max(min).min(max);
        }

        parameters.set_spiral_coeff(next)
    }
}
