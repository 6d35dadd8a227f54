//! Output limiter: feed-forward peak compressor at the end of the graph
//!
//! Placed after master gain:
//!   preamp → EQ chain → master gain → **limiter** → output
//!
//! Protects the output from clipping when aggressive EQ boosts or loud
//! material push the sum above full scale. The curve (threshold, knee,
//! ratio, attack, release) is fixed at construction.
//!
//! # Algorithm
//!
//! 1. The stereo peak of each sample is converted to dBFS.
//! 2. A static gain computer maps the level to a desired gain reduction
//!    (hard knee, or quadratic soft knee when `knee_db > 0`).
//! 3. A one-pole envelope follower smooths the reduction, fast on attack
//!    and slow on release.
//! 4. The sample is scaled by the smoothed reduction.

use super::{db_to_linear, linear_to_db};
use crate::config::LimiterSettings;
use crate::types::StereoSample;

// ═══════════════════════════════════════════════════════════════════════════════
// Limiter
// ═══════════════════════════════════════════════════════════════════════════════

/// Feed-forward peak limiter
///
/// The limiter only ever reduces gain. Below threshold (and with the envelope
/// released) the output equals the input.
pub struct OutputLimiter {
    threshold_db: f32,
    knee_db: f32,
    /// `1 - 1/ratio`, the fraction of overshoot that is removed
    slope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (≥ 0)
    envelope_db: f32,
}

impl OutputLimiter {
    pub fn new(settings: &LimiterSettings, sample_rate: f32) -> Self {
        let ratio = settings.ratio.max(1.0);
        Self {
            threshold_db: settings.threshold_db.min(0.0),
            knee_db: settings.knee_db.max(0.0),
            slope: 1.0 - 1.0 / ratio,
            attack_coeff: time_coeff(settings.attack_ms, sample_rate),
            release_coeff: time_coeff(settings.release_ms, sample_rate),
            envelope_db: 0.0,
        }
    }

    /// Static curve: desired gain reduction (dB) for an input level (dB)
    fn reduction_for(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        if self.knee_db > 0.0 && 2.0 * over.abs() <= self.knee_db {
            let x = over + self.knee_db / 2.0;
            self.slope * x * x / (2.0 * self.knee_db)
        } else if over > 0.0 {
            self.slope * over
        } else {
            0.0
        }
    }

    /// Process stereo samples in place
    pub fn process(&mut self, samples: &mut [StereoSample]) {
        for sample in samples.iter_mut() {
            let target = self.reduction_for(linear_to_db(sample.peak()));

            let coeff = if target > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = target + (self.envelope_db - target) * coeff;

            if self.envelope_db > 1e-4 {
                *sample *= db_to_linear(-self.envelope_db);
            }
        }
    }

    /// Current gain reduction in dB (0 when idle)
    pub fn gain_reduction_db(&self) -> f32 {
        self.envelope_db
    }

    pub fn reset(&mut self) {
        self.envelope_db = 0.0;
    }
}

/// One-pole coefficient for a time constant: `exp(-1 / (τ · fs))`
fn time_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms.max(0.0) / 1000.0 * sample_rate;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
