//! Engine configuration
//!
//! Settings that are fixed for the lifetime of a playback graph (sample rate,
//! crossfade length, limiter curve) plus the loudness normalization policy.
//! Everything here is plain serde data persisted as YAML.

mod engine;
mod io;
mod loudness;
mod paths;

pub use engine::{EngineConfig, LimiterSettings};
pub use io::{load_config, save_config};
pub use loudness::LoudnessConfig;
pub use paths::{config_dir, default_engine_config_path, default_profiles_path};
