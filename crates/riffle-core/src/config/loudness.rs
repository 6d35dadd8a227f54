//! Loudness normalization
//!
//! Tracks arrive with an integrated loudness measurement (EBU R128, LUFS)
//! from the catalogue. Each deck gets a single multiplicative trim so that
//! consecutive tracks play back at a similar perceived level.

use serde::{Deserialize, Serialize};

/// Loudness normalization policy
///
/// Streaming services typically master or normalize to around -14 LUFS,
/// which is the default target here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Target loudness in LUFS
    pub target_lufs: f32,

    /// When disabled every track plays at unity trim
    pub auto_gain_enabled: bool,

    /// Upper bound of the compensation (dB), protects very quiet tracks
    /// from being pushed into the limiter
    pub max_gain_db: f32,

    /// Lower bound of the compensation (dB)
    pub min_gain_db: f32,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            target_lufs: -14.0,
            auto_gain_enabled: true,
            max_gain_db: 6.0,
            min_gain_db: -18.0,
        }
    }
}

impl LoudnessConfig {
    /// Compensation in dB for a track, `None` when there is nothing to apply
    pub fn gain_db(&self, track_lufs: Option<f32>) -> Option<f32> {
        if !self.auto_gain_enabled {
            return None;
        }
        track_lufs
            .filter(|lufs| lufs.is_finite())
            .map(|lufs| (self.target_lufs - lufs).clamp(self.min_gain_db, self.max_gain_db))
    }

    /// Linear deck trim for a track (1.0 when unknown or disabled)
    pub fn gain_linear(&self, track_lufs: Option<f32>) -> f32 {
        self.gain_db(track_lufs)
            .map(|db| 10.0_f32.powf(db / 20.0))
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_track_is_boosted() {
        let config = LoudnessConfig::default();
        // -18 LUFS against a -14 target = +4 dB
        let gain_db = config.gain_db(Some(-18.0)).unwrap();
        assert!((gain_db - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_loud_track_is_cut() {
        let config = LoudnessConfig::default();
        let gain_db = config.gain_db(Some(-8.0)).unwrap();
        assert!((gain_db + 6.0).abs() < 0.001);
    }

    #[test]
    fn test_compensation_is_clamped() {
        let config = LoudnessConfig::default();
        assert_eq!(config.gain_db(Some(-40.0)), Some(6.0));
        assert_eq!(config.gain_db(Some(10.0)), Some(-18.0));
    }

    #[test]
    fn test_unknown_or_disabled_is_unity() {
        let config = LoudnessConfig::default();
        assert_eq!(config.gain_linear(None), 1.0);
        assert_eq!(config.gain_linear(Some(f32::NAN)), 1.0);

        let disabled = LoudnessConfig {
            auto_gain_enabled: false,
            ..Default::default()
        };
        assert!(disabled.gain_db(Some(-20.0)).is_none());
        assert_eq!(disabled.gain_linear(Some(-20.0)), 1.0);
    }

    #[test]
    fn test_linear_conversion() {
        let config = LoudnessConfig {
            target_lufs: -8.0,
            ..Default::default()
        };
        // +6 dB is roughly 2x
        assert!((config.gain_linear(Some(-14.0)) - 2.0).abs() < 0.01);
    }
}
