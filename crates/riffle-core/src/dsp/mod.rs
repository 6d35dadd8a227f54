//! DSP building blocks used by the playback graph
//!
//! - [`biquad`] - second-order filter designs, analysis and state
//! - [`smoothing`] - one-pole parameter smoothing
//! - [`automation`] - scheduled linear gain ramps
//! - [`limiter`] - output dynamics limiting

pub mod automation;
pub mod biquad;
pub mod limiter;
pub mod smoothing;

pub use automation::GainAutomation;
pub use biquad::{BiquadCoeffs, BiquadState};
pub use limiter::OutputLimiter;
pub use smoothing::SmoothedParam;

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear amplitude factor to decibels (floored at -120 dB)
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 1e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 0.001);
        assert!((linear_to_db(db_to_linear(-3.5)) + 3.5).abs() < 1e-4);
        assert_eq!(linear_to_db(0.0), -120.0);
    }
}
