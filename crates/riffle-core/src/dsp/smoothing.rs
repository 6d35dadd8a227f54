//! One-pole parameter smoothing
//!
//! Used for preamp, master volume and EQ band parameters so that a jump in a
//! control value becomes a short exponential glide instead of a click.

/// Exponentially smoothed parameter
#[derive(Debug, Clone, Copy)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Per-sample pole: `exp(-1 / (τ · fs))`
    coeff: f32,
}

/// Distance below which a glide snaps onto its target
const SETTLE_EPSILON: f32 = 1e-5;

impl SmoothedParam {
    /// Create a settled parameter with time constant `time_ms`
    pub fn new(value: f32, time_ms: f32, sample_rate: f32) -> Self {
        let tau_samples = (time_ms / 1000.0) * sample_rate;
        let coeff = if tau_samples > 0.0 {
            (-1.0 / tau_samples).exp()
        } else {
            0.0
        };
        Self {
            current: value,
            target: value,
            coeff,
        }
    }

    /// Start gliding toward `target`
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    /// Jump straight to `value`
    pub fn snap(&mut self, value: f32) {
        if value.is_finite() {
            self.current = value;
            self.target = value;
        }
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            self.current = self.target + (self.current - self.target) * self.coeff;
            if (self.current - self.target).abs() < SETTLE_EPSILON {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Advance `n` samples at once (used between coefficient recomputations)
    #[inline]
    pub fn advance(&mut self, n: usize) -> f32 {
        if self.current != self.target {
            self.current = self.target + (self.current - self.target) * self.coeff.powi(n as i32);
            if (self.current - self.target).abs() < SETTLE_EPSILON {
                self.current = self.target;
            }
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
