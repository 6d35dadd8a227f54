//! Riffle Core - Playback graph and equalizer for the Riffle streaming client
//!
//! This crate provides the real-time signal path of the player:
//! - Two alternating playback decks with sample-accurate crossfades
//! - Preamp, 10-band parametric equalizer, master gain and output limiter
//! - Presets, device profiles and EqualizerAPO-style text import/export
//! - Frequency-response analysis for EQ visualization
//! - Change notifications for UI layers
//!
//! The control side ([`engine::EngineController`]) never touches audio memory
//! directly. It sends commands over a lock-free queue to the render side
//! ([`engine::AudioEngine`]), which publishes its state back through atomics.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod eq;
pub mod notify;
pub mod profiles;
pub mod types;

pub use types::*;
