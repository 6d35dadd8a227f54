//! Filter stages
//!
//! A stage slot holds one of two variants:
//!
//! - **Standard**: a two-pole filter described by (type, frequency, Q, gain).
//!   Parameter changes glide, and coefficients are recomputed every
//!   [`UPDATE_INTERVAL`] samples while a glide is in progress.
//! - **Custom**: a fixed set of analytically derived coefficients. Any change
//!   replaces the whole set; there is no partial update path.
//!
//! [`StageConfig`] is the control-side description of what a slot should be.
//! [`FilterStage`] is the render-side realization.

use super::band::{BandType, EqBand, REFERENCE_Q};
use super::error::EqError;
use crate::dsp::{BiquadCoeffs, BiquadState, SmoothedParam};
use crate::types::StereoSample;

/// Shelf Q within this distance of [`REFERENCE_Q`] still uses the standard variant
pub const Q_TOLERANCE: f32 = 0.01;

/// Samples between coefficient recomputations during a glide
pub const UPDATE_INTERVAL: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// Stage configuration (control side)
// ═══════════════════════════════════════════════════════════════════════════════

/// Desired configuration of one stage slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageConfig {
    Standard {
        kind: BandType,
        frequency: f32,
        q: f32,
        gain_db: f32,
    },
    /// Normalized coefficient arrays: `feedback[0]` is always 1
    Custom {
        feedforward: [f64; 3],
        feedback: [f64; 3],
    },
}

impl StageConfig {
    /// 0 dB bell at 1 kHz: passes everything unchanged
    pub fn neutral() -> Self {
        StageConfig::Standard {
            kind: BandType::Peaking,
            frequency: 1000.0,
            q: REFERENCE_Q,
            gain_db: 0.0,
        }
    }

    /// Decide how slot `i` realizes `bands[i]`
    ///
    /// A missing or disabled band yields [`StageConfig::neutral`]. A shelf
    /// whose Q is off the reference value cannot be expressed by the
    /// standard variant, so its coefficients are derived here.
    pub fn for_band(band: Option<&EqBand>, sample_rate: f64) -> Self {
        let band = match band {
            Some(b) if b.enabled => b,
            _ => return Self::neutral(),
        };

        if band.band_type.is_shelf() && (band.q - REFERENCE_Q).abs() > Q_TOLERANCE {
            let (f, q, g) = (band.frequency as f64, band.q as f64, band.gain as f64);
            let coeffs = match band.band_type {
                BandType::LowShelf => BiquadCoeffs::low_shelf(f, q, g, sample_rate),
                _ => BiquadCoeffs::high_shelf(f, q, g, sample_rate),
            };
            return Self::from_coeffs(&coeffs);
        }

        StageConfig::Standard {
            kind: band.band_type,
            frequency: band.frequency,
            q: band.q,
            gain_db: band.gain,
        }
    }

    pub fn from_coeffs(c: &BiquadCoeffs) -> Self {
        StageConfig::Custom {
            feedforward: [c.b0, c.b1, c.b2],
            feedback: [1.0, c.a1, c.a2],
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, StageConfig::Custom { .. })
    }

    /// Coefficients this configuration settles at
    pub fn coefficients(&self, sample_rate: f64) -> BiquadCoeffs {
        match *self {
            StageConfig::Standard {
                kind,
                frequency,
                q,
                gain_db,
            } => design(kind, frequency as f64, q as f64, gain_db as f64, sample_rate),
            StageConfig::Custom {
                feedforward,
                feedback,
            } => BiquadCoeffs::from_raw(
                feedforward[0],
                feedforward[1],
                feedforward[2],
                feedback[0],
                feedback[1],
                feedback[2],
            ),
        }
    }

    /// Magnitude (linear) at each frequency
    pub fn magnitude_response(
        &self,
        frequencies: &[f32],
        sample_rate: f64,
    ) -> Result<Vec<f64>, EqError> {
        let coeffs = self.coefficients(sample_rate);
        if !coeffs.is_finite() {
            return Err(EqError::NonFiniteCoefficients);
        }
        if !coeffs.is_stable() {
            let (band_type, frequency) = match *self {
                StageConfig::Standard { kind, frequency, .. } => (kind, frequency),
                StageConfig::Custom { .. } => (BandType::Peaking, 0.0),
            };
            return Err(EqError::UnstableFilter {
                band_type,
                frequency,
            });
        }

        frequencies
            .iter()
            .map(|&f| {
                let mag = coeffs.magnitude(f as f64, sample_rate);
                if mag.is_finite() {
                    Ok(mag)
                } else {
                    Err(EqError::NonFiniteResponse { frequency: f })
                }
            })
            .collect()
    }
}

/// Standard two-pole design for a band type
///
/// Shelves use the reference Q here; off-reference shelves never reach the
/// standard variant.
fn design(kind: BandType, freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> BiquadCoeffs {
    match kind {
        BandType::Peaking => BiquadCoeffs::peaking(freq, q, gain_db, sample_rate),
        BandType::LowShelf => {
            BiquadCoeffs::low_shelf(freq, REFERENCE_Q as f64, gain_db, sample_rate)
        }
        BandType::HighShelf => {
            BiquadCoeffs::high_shelf(freq, REFERENCE_Q as f64, gain_db, sample_rate)
        }
        BandType::LowPass => BiquadCoeffs::low_pass(freq, q, sample_rate),
        BandType::HighPass => BiquadCoeffs::high_pass(freq, q, sample_rate),
        BandType::Notch => BiquadCoeffs::notch(freq, q, sample_rate),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Render-side stages
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard variant: smoothed parameters, periodic redesign
#[derive(Debug, Clone)]
pub struct StandardStage {
    kind: BandType,
    /// Smoothed in the log domain so sweeps sound even across octaves
    log_frequency: SmoothedParam,
    q: SmoothedParam,
    gain_db: SmoothedParam,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    sample_rate: f64,
}

impl StandardStage {
    fn redesign(&mut self) {
        let coeffs = design(
            self.kind,
            self.log_frequency.current().exp() as f64,
            self.q.current() as f64,
            self.gain_db.current() as f64,
            self.sample_rate,
        );
        // Clamped cookbook designs are always stable; keep the last good set otherwise
        if coeffs.is_stable() {
            self.coeffs = coeffs;
        }
    }

    fn is_settled(&self) -> bool {
        self.log_frequency.is_settled() && self.q.is_settled() && self.gain_db.is_settled()
    }
}

/// Custom variant: installed coefficient set
#[derive(Debug, Clone)]
pub struct CustomStage {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

/// One slot of the equalizer chain
#[derive(Debug, Clone)]
pub enum FilterStage {
    Standard(StandardStage),
    Custom(CustomStage),
}

impl FilterStage {
    /// Build a stage already settled at `config`
    pub fn new(config: &StageConfig, smoothing_ms: f32, sample_rate: f64) -> Self {
        match *config {
            StageConfig::Standard {
                kind,
                frequency,
                q,
                gain_db,
            } => {
                let sr = sample_rate as f32;
                let mut stage = StandardStage {
                    kind,
                    log_frequency: SmoothedParam::new(frequency.max(1.0).ln(), smoothing_ms, sr),
                    q: SmoothedParam::new(q, smoothing_ms, sr),
                    gain_db: SmoothedParam::new(gain_db, smoothing_ms, sr),
                    coeffs: BiquadCoeffs::passthrough(),
                    state: BiquadState::default(),
                    sample_rate,
                };
                stage.redesign();
                FilterStage::Standard(stage)
            }
            StageConfig::Custom { .. } => FilterStage::Custom(CustomStage {
                coeffs: installable(config.coefficients(sample_rate)),
                state: BiquadState::default(),
            }),
        }
    }

    /// Neutral stage used for unbound slots
    pub fn neutral(smoothing_ms: f32, sample_rate: f64) -> Self {
        Self::new(&StageConfig::neutral(), smoothing_ms, sample_rate)
    }

    /// Update in place if `config` has the same variant as this stage
    ///
    /// Returns `false` when the variant differs; the caller must substitute
    /// a new stage at this position.
    pub fn apply(&mut self, config: &StageConfig) -> bool {
        match (self, *config) {
            (
                FilterStage::Standard(stage),
                StageConfig::Standard {
                    kind,
                    frequency,
                    q,
                    gain_db,
                },
            ) => {
                stage.log_frequency.set_target(frequency.max(1.0).ln());
                stage.q.set_target(q);
                stage.gain_db.set_target(gain_db);
                if stage.kind != kind {
                    stage.kind = kind;
                    stage.redesign();
                }
                true
            }
            (FilterStage::Custom(stage), StageConfig::Custom { .. }) => {
                stage.coeffs = installable(config.coefficients(0.0));
                true
            }
            _ => false,
        }
    }

    /// Replace this stage with a new variant, keeping the signal history
    pub fn substitute(&mut self, config: &StageConfig, smoothing_ms: f32, sample_rate: f64) {
        let history = *self.state();
        let mut next = Self::new(config, smoothing_ms, sample_rate);
        *next.state_mut() = history;
        *self = next;
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, FilterStage::Custom(_))
    }

    /// Coefficients currently in effect
    pub fn coefficients(&self) -> BiquadCoeffs {
        match self {
            FilterStage::Standard(s) => s.coeffs,
            FilterStage::Custom(s) => s.coeffs,
        }
    }

    fn state(&self) -> &BiquadState {
        match self {
            FilterStage::Standard(s) => &s.state,
            FilterStage::Custom(s) => &s.state,
        }
    }

    fn state_mut(&mut self) -> &mut BiquadState {
        match self {
            FilterStage::Standard(s) => &mut s.state,
            FilterStage::Custom(s) => &mut s.state,
        }
    }

    /// Filter samples in place
    pub fn process(&mut self, samples: &mut [StereoSample]) {
        match self {
            FilterStage::Standard(stage) => {
                for chunk in samples.chunks_mut(UPDATE_INTERVAL) {
                    if !stage.is_settled() {
                        stage.log_frequency.advance(chunk.len());
                        stage.q.advance(chunk.len());
                        stage.gain_db.advance(chunk.len());
                        stage.redesign();
                    }
                    for s in chunk.iter_mut() {
                        *s = stage.state.process(*s, &stage.coeffs);
                    }
                }
            }
            FilterStage::Custom(stage) => {
                for s in samples.iter_mut() {
                    *s = stage.state.process(*s, &stage.coeffs);
                }
            }
        }
    }
}

/// Unstable or non-finite sets are replaced by a passthrough so the path
/// never blows up
fn installable(coeffs: BiquadCoeffs) -> BiquadCoeffs {
    if coeffs.is_stable() {
        coeffs
    } else {
        BiquadCoeffs::passthrough()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    fn sine(freq: f32, len: usize) -> Vec<StereoSample> {
        (0..len)
            .map(|i| {
                let v = (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin() * 0.25;
                StereoSample::mono(v)
            })
            .collect()
    }

    fn rms_tail(samples: &[StereoSample]) -> f32 {
        let tail = &samples[samples.len() / 2..];
        (tail.iter().map(|s| s.left * s.left).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn test_missing_or_disabled_band_is_neutral() {
        assert_eq!(StageConfig::for_band(None, SR), StageConfig::neutral());

        let mut band = EqBand::peaking(500.0, 6.0, 2.0);
        band.enabled = false;
        assert_eq!(StageConfig::for_band(Some(&band), SR), StageConfig::neutral());
    }

    #[test]
    fn test_variant_selection() {
        let peak = EqBand::peaking(500.0, 6.0, 4.0);
        assert!(!StageConfig::for_band(Some(&peak), SR).is_custom());

        let shelf = EqBand::new(BandType::LowShelf, 100.0, 6.0, REFERENCE_Q);
        assert!(!StageConfig::for_band(Some(&shelf), SR).is_custom());

        let steep = EqBand::new(BandType::HighShelf, 8000.0, 6.0, 1.5);
        let config = StageConfig::for_band(Some(&steep), SR);
        assert!(config.is_custom());
        if let StageConfig::Custom { feedback, .. } = config {
            assert_eq!(feedback[0], 1.0);
        }
    }

    #[test]
    fn test_variants_agree_at_reference_q() {
        let at_ref = EqBand::new(BandType::LowShelf, 150.0, 5.0, REFERENCE_Q);
        let standard = StageConfig::for_band(Some(&at_ref), SR).coefficients(SR);

        let custom = StageConfig::from_coeffs(&BiquadCoeffs::low_shelf(
            150.0,
            REFERENCE_Q as f64,
            5.0,
            SR,
        ))
        .coefficients(SR);

        assert!((standard.b0 - custom.b0).abs() < 1e-9);
        assert!((standard.a1 - custom.a1).abs() < 1e-9);
    }

    #[test]
    fn test_magnitude_response() {
        let band = EqBand::peaking(1000.0, 6.0, 1.0);
        let mags = StageConfig::for_band(Some(&band), SR)
            .magnitude_response(&[1000.0, 20.0], SR)
            .unwrap();
        assert!((20.0 * mags[0].log10() - 6.0).abs() < 0.01);
        assert!((mags[1] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_unstable_custom_response_is_an_error() {
        let config = StageConfig::Custom {
            feedforward: [1.0, 0.0, 0.0],
            feedback: [1.0, 0.0, 1.5],
        };
        assert!(config.magnitude_response(&[1000.0], SR).is_err());

        let nan = StageConfig::Custom {
            feedforward: [f64::NAN, 0.0, 0.0],
            feedback: [1.0, 0.0, 0.0],
        };
        assert_eq!(
            nan.magnitude_response(&[1000.0], SR),
            Err(EqError::NonFiniteCoefficients)
        );
    }

    #[test]
    fn test_unstable_custom_stage_renders_passthrough() {
        let config = StageConfig::Custom {
            feedforward: [1.0, 0.0, 0.0],
            feedback: [1.0, 0.0, 1.5],
        };
        let stage = FilterStage::new(&config, 20.0, SR);
        assert_eq!(stage.coefficients(), BiquadCoeffs::passthrough());
    }

    #[test]
    fn test_apply_reports_variant_mismatch() {
        let mut stage = FilterStage::neutral(20.0, SR);
        let steep = EqBand::new(BandType::LowShelf, 100.0, 6.0, 2.0);
        let custom = StageConfig::for_band(Some(&steep), SR);

        assert!(!stage.apply(&custom));
        stage.substitute(&custom, 20.0, SR);
        assert!(stage.is_custom());

        // Custom -> custom reinstalls the full set
        let mut louder = steep;
        louder.set_gain(9.0);
        let custom2 = StageConfig::for_band(Some(&louder), SR);
        assert!(stage.apply(&custom2));
        assert_eq!(stage.coefficients(), custom2.coefficients(SR));
    }

    #[test]
    fn test_standard_stage_glides_to_target() {
        let mut stage = FilterStage::neutral(10.0, SR);
        let target = StageConfig::Standard {
            kind: BandType::Peaking,
            frequency: 1000.0,
            q: REFERENCE_Q,
            gain_db: 12.0,
        };
        assert!(stage.apply(&target));

        // Right after the change the stage is still near 0 dB
        let early = stage.coefficients().magnitude(1000.0, SR);
        assert!(early < 1.1);

        let mut buf = sine(1000.0, 48000);
        stage.process(&mut buf);
        let settled = stage.coefficients();
        let expected = target.coefficients(SR).magnitude(1000.0, SR);
        assert!((settled.magnitude(1000.0, SR) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_custom_shelf_boosts_low_sine() {
        let band = EqBand::new(BandType::LowShelf, 500.0, 12.0, 2.0);
        let mut stage = FilterStage::new(&StageConfig::for_band(Some(&band), SR), 20.0, SR);

        let mut buf = sine(50.0, 48000);
        let dry = rms_tail(&buf);
        stage.process(&mut buf);
        let wet = rms_tail(&buf);
        assert!(wet / dry > 3.0, "gain = {}", wet / dry);
    }
}
