//! Second-order (biquad) filters
//!
//! Coefficient designs follow the Audio EQ Cookbook (R. Bristow-Johnson).
//! Every design is normalized by `a0`, so the stored feedback polynomial is
//! `1 + a1·z⁻¹ + a2·z⁻²`. Coefficients are kept in f64: they feed both the
//! renderer and the frequency-response analyzer, and low-frequency designs
//! at 48 kHz lose noticeable precision in f32.

use std::f64::consts::PI;

use crate::types::StereoSample;

// ═══════════════════════════════════════════════════════════════════════════════
// Coefficients
// ═══════════════════════════════════════════════════════════════════════════════

/// Normalized biquad coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Intermediate values shared by all cookbook designs
struct Prewarp {
    cos_w0: f64,
    alpha: f64,
}

impl Prewarp {
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        // Keep the design strictly below Nyquist
        let freq = freq.clamp(1.0, sample_rate * 0.49);
        let w0 = 2.0 * PI * freq / sample_rate;
        let q = q.max(1e-3);
        Self {
            cos_w0: w0.cos(),
            alpha: w0.sin() / (2.0 * q),
        }
    }
}

impl BiquadCoeffs {
    /// Build from raw cookbook terms, dividing through by `a0`
    pub fn from_raw(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Unity gain, no filtering
    pub const fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Peaking (bell) filter
    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prewarp::new(freq, q, sample_rate);

        Self::from_raw(
            1.0 + p.alpha * a,
            -2.0 * p.cos_w0,
            1.0 - p.alpha * a,
            1.0 + p.alpha / a,
            -2.0 * p.cos_w0,
            1.0 - p.alpha / a,
        )
    }

    /// Low shelf with an explicit Q
    ///
    /// At Q = 1/√2 this is identical to the shelf-slope S = 1 design.
    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prewarp::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
        let c = p.cos_w0;

        Self::from_raw(
            a * ((a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * c),
            a * ((a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * c),
            (a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha,
        )
    }

    /// High shelf with an explicit Q
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let p = Prewarp::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * p.alpha;
        let c = p.cos_w0;

        Self::from_raw(
            a * ((a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * c),
            a * ((a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * c),
            (a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha,
        )
    }

    /// Second-order low-pass
    pub fn low_pass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        let c = p.cos_w0;

        Self::from_raw(
            (1.0 - c) / 2.0,
            1.0 - c,
            (1.0 - c) / 2.0,
            1.0 + p.alpha,
            -2.0 * c,
            1.0 - p.alpha,
        )
    }

    /// Second-order high-pass
    pub fn high_pass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        let c = p.cos_w0;

        Self::from_raw(
            (1.0 + c) / 2.0,
            -(1.0 + c),
            (1.0 + c) / 2.0,
            1.0 + p.alpha,
            -2.0 * c,
            1.0 - p.alpha,
        )
    }

    /// Notch (band-reject)
    pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        let c = p.cos_w0;

        Self::from_raw(1.0, -2.0 * c, 1.0, 1.0 + p.alpha, -2.0 * c, 1.0 - p.alpha)
    }

    /// All coefficients are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Both poles lie strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.is_finite() && self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Magnitude of the transfer function at `freq` (linear, not dB)
    ///
    /// Evaluates `|B(e^jw)| / |A(e^jw)|`. Returns a non-finite value when the
    /// denominator vanishes; callers decide how to treat that.
    pub fn magnitude(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        (num / den).sqrt()
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::passthrough()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════════

/// Direct form I history for one stereo filter
///
/// Only raw input/output history is stored, so coefficients can be replaced
/// between any two samples without a state transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: [f64; 2],
    x2: [f64; 2],
    y1: [f64; 2],
    y2: [f64; 2],
}

impl BiquadState {
    /// Filter one stereo sample
    #[inline]
    pub fn process(&mut self, input: StereoSample, coeffs: &BiquadCoeffs) -> StereoSample {
        let left = self.tick(0, input.left as f64, coeffs);
        let right = self.tick(1, input.right as f64, coeffs);
        StereoSample::new(left as f32, right as f32)
    }

    #[inline]
    fn tick(&mut self, ch: usize, x: f64, c: &BiquadCoeffs) -> f64 {
        let y = c.b0 * x + c.b1 * self.x1[ch] + c.b2 * self.x2[ch]
            - c.a1 * self.y1[ch]
            - c.a2 * self.y2[ch];
        self.x2[ch] = self.x1[ch];
        self.x1[ch] = x;
        self.y2[ch] = self.y1[ch];
        // Flush denormals so a silent tail doesn't crawl
        self.y1[ch] = if y.abs() < 1e-30 { 0.0 } else { y };
        self.y1[ch]
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
