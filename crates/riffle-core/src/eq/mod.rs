//! Parametric equalizer
//!
//! The equalizer is split into a parameter model that lives on the control
//! side and a fixed arena of filter stages that lives in the render graph:
//!
//! - [`EqBand`]/[`EqPreset`] - the user-facing model (clamped on mutation)
//! - [`Equalizer`] - band list, preamp, sync planning and response analysis
//! - [`StageConfig`] - what one stage slot should be (standard or custom)
//! - [`EqChain`] - the 10 render-side stages, rewired on variant changes
//! - [`text`] - EqualizerAPO-style import/export

mod band;
mod chain;
mod equalizer;
mod error;
mod stage;
pub mod text;

pub use band::{
    builtin_presets, BandType, EqBand, EqPreset, MAX_BANDS, MAX_FREQUENCY, MAX_GAIN_DB, MAX_Q,
    MIN_FREQUENCY, MIN_GAIN_DB, MIN_Q, REFERENCE_Q,
};
pub use chain::{EqChain, Link, Reconfigure};
pub use equalizer::Equalizer;
pub use error::EqError;
pub use stage::{FilterStage, StageConfig};
