//! Playback graph settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::LoudnessConfig;
use crate::types::SAMPLE_RATE;

/// Settings of the playback graph, fixed at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate the graph renders at (Hz)
    pub sample_rate: u32,

    /// Default crossfade length in seconds
    pub crossfade_secs: f32,

    /// How long a transition waits for the incoming deck to become ready
    /// before starting anyway (milliseconds)
    pub ready_timeout_ms: u64,

    /// Time constant of preamp, master and EQ parameter smoothing (ms)
    pub smoothing_ms: f32,

    /// Whether the processing context starts suspended and needs an explicit
    /// resume (mirrors platforms that block audio until a user gesture)
    pub start_suspended: bool,

    /// Output limiter curve
    pub limiter: LimiterSettings,

    /// Per-deck loudness compensation
    pub loudness: LoudnessConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            crossfade_secs: 5.0,
            ready_timeout_ms: 3000,
            smoothing_ms: 20.0,
            start_suspended: true,
            limiter: LimiterSettings::default(),
            loudness: LoudnessConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Sample rate as f64 for coefficient math
    pub fn sample_rate_f64(&self) -> f64 {
        self.sample_rate.max(1) as f64
    }

    /// Default crossfade length in frames
    ///
    /// A negative or non-finite `crossfade_secs` counts as an instant switch.
    pub fn crossfade_frames(&self) -> u64 {
        let duration = Duration::try_from_secs_f32(self.crossfade_secs).unwrap_or(Duration::ZERO);
        self.frames_for(duration)
    }

    /// Convert a duration to a frame count at the graph's sample rate
    pub fn frames_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate_f64()).round() as u64
    }

    /// Readiness wait bound
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Output limiter curve
///
/// Configured once when the graph is built; not user adjustable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Level above which gain reduction starts (dBFS)
    pub threshold_db: f32,
    /// Width of the soft knee (dB), 0 for a hard knee
    pub knee_db: f32,
    /// Compression ratio above threshold
    pub ratio: f32,
    /// Attack time (ms)
    pub attack_ms: f32,
    /// Release time (ms)
    pub release_ms: f32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            threshold_db: -1.0,
            knee_db: 0.0,
            ratio: 20.0,
            attack_ms: 3.0,
            release_ms: 250.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_crossfade_frames() {
        let config = EngineConfig::default();
        assert_eq!(config.crossfade_frames(), 240_000);
        assert_eq!(config.ready_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_frames_for_duration() {
        let config = EngineConfig {
            sample_rate: 44100,
            ..Default::default()
        };
        assert_eq!(config.frames_for(Duration::from_millis(500)), 22050);
    }

    #[test]
    fn test_negative_crossfade_is_zero_frames() {
        let config = EngineConfig {
            crossfade_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(config.crossfade_frames(), 0);

        let config = EngineConfig {
            crossfade_secs: f32::INFINITY,
            ..Default::default()
        };
        assert_eq!(config.crossfade_frames(), 0);
    }
}
