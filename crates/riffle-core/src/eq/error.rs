//! Equalizer errors

use thiserror::Error;

use super::BandType;

/// Errors from analysing a stage's response
///
/// These never reach the audio path: the analyzer treats a failing band as
/// unity gain and logs the error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EqError {
    #[error("{band_type:?} filter at {frequency} Hz has poles outside the unit circle")]
    UnstableFilter { band_type: BandType, frequency: f32 },

    #[error("custom filter coefficients are not finite")]
    NonFiniteCoefficients,

    #[error("response at {frequency} Hz is not a finite number")]
    NonFiniteResponse { frequency: f32 },
}
