//! EQ band and preset model

use serde::{Deserialize, Serialize};

/// Maximum number of bands (one per filter stage slot)
pub const MAX_BANDS: usize = 10;

pub const MIN_FREQUENCY: f32 = 20.0;
pub const MAX_FREQUENCY: f32 = 20000.0;
pub const MIN_GAIN_DB: f32 = -12.0;
pub const MAX_GAIN_DB: f32 = 12.0;
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 10.0;

/// Q at which a cookbook shelf equals the plain two-pole shelf (1/√2)
pub const REFERENCE_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Filter shape of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandType {
    #[serde(rename = "peak", alias = "peaking")]
    Peaking,
    LowShelf,
    HighShelf,
    LowPass,
    HighPass,
    Notch,
}

impl BandType {
    /// Parse an EqualizerAPO filter type code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "PK" | "PEQ" => Some(BandType::Peaking),
            "LSC" | "LS" => Some(BandType::LowShelf),
            "HSC" | "HS" => Some(BandType::HighShelf),
            "LP" | "LPQ" => Some(BandType::LowPass),
            "HP" | "HPQ" => Some(BandType::HighPass),
            "NO" => Some(BandType::Notch),
            _ => None,
        }
    }

    /// Canonical code used on export
    pub fn code(self) -> &'static str {
        match self {
            BandType::Peaking => "PK",
            BandType::LowShelf => "LSC",
            BandType::HighShelf => "HSC",
            BandType::LowPass => "LPQ",
            BandType::HighPass => "HPQ",
            BandType::Notch => "NO",
        }
    }

    pub fn is_shelf(self) -> bool {
        matches!(self, BandType::LowShelf | BandType::HighShelf)
    }
}

/// One equalizer band
///
/// Fields are public for display, but mutation through [`EqBand::set_gain`]
/// and friends keeps every value inside its valid range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Center/corner frequency (Hz)
    pub frequency: f32,
    /// Gain (dB)
    pub gain: f32,
    #[serde(rename = "Q")]
    pub q: f32,
    #[serde(rename = "type")]
    pub band_type: BandType,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

/// Clamp into `[min, max]`; a NaN input keeps `current`
#[inline]
fn clamp_or(value: f32, min: f32, max: f32, current: f32) -> f32 {
    if value.is_nan() {
        current
    } else {
        value.clamp(min, max)
    }
}

impl EqBand {
    /// Create a band with every parameter clamped into range
    pub fn new(band_type: BandType, frequency: f32, gain: f32, q: f32) -> Self {
        let mut band = Self {
            band_type,
            ..Self::default()
        };
        band.set_frequency(frequency);
        band.set_gain(gain);
        band.set_q(q);
        band
    }

    pub fn peaking(frequency: f32, gain: f32, q: f32) -> Self {
        Self::new(BandType::Peaking, frequency, gain, q)
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = clamp_or(frequency, MIN_FREQUENCY, MAX_FREQUENCY, self.frequency);
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = clamp_or(gain, MIN_GAIN_DB, MAX_GAIN_DB, self.gain);
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = clamp_or(q, MIN_Q, MAX_Q, self.q);
    }

    /// Re-clamp all fields (used on bands that came from outside, e.g. JSON)
    pub fn clamped(mut self) -> Self {
        let defaults = Self::default();
        self.frequency = clamp_or(self.frequency, MIN_FREQUENCY, MAX_FREQUENCY, defaults.frequency);
        self.gain = clamp_or(self.gain, MIN_GAIN_DB, MAX_GAIN_DB, defaults.gain);
        self.q = clamp_or(self.q, MIN_Q, MAX_Q, defaults.q);
        self
    }
}

impl Default for EqBand {
    /// A neutral 1 kHz bell, the band `add_band` appends
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            gain: 0.0,
            q: 1.0,
            band_type: BandType::Peaking,
            enabled: true,
        }
    }
}

/// A named snapshot of preamp and bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub name: String,
    /// Preamp gain (dB)
    #[serde(default)]
    pub preamp: f32,
    #[serde(default)]
    pub bands: Vec<EqBand>,
}

impl EqPreset {
    /// Build a preset, clamping the preamp and keeping at most 10 bands
    pub fn new(name: impl Into<String>, preamp: f32, bands: Vec<EqBand>) -> Self {
        Self {
            name: name.into(),
            preamp: clamp_or(preamp, MIN_GAIN_DB, MAX_GAIN_DB, 0.0),
            bands: bands.into_iter().take(MAX_BANDS).map(EqBand::clamped).collect(),
        }
    }
}

/// Center frequencies of the built-in graphic presets
const PRESET_FREQUENCIES: [f32; MAX_BANDS] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Q of one-octave graphic bands
const PRESET_Q: f32 = 1.41;

fn graphic_preset(name: &str, gains: [f32; MAX_BANDS]) -> EqPreset {
    let bands = PRESET_FREQUENCIES
        .iter()
        .zip(gains)
        .map(|(&freq, gain)| EqBand::peaking(freq, gain, PRESET_Q))
        .collect();
    EqPreset::new(name, 0.0, bands)
}

/// Presets shipped with the player
pub fn builtin_presets() -> Vec<EqPreset> {
    vec![
        graphic_preset("Flat", [0.0; MAX_BANDS]),
        graphic_preset("Bass Boost", [6.0, 5.0, 3.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        graphic_preset("Treble Boost", [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 4.0, 5.0, 6.0]),
        graphic_preset("V-Shape", [5.0, 4.0, 2.0, 0.0, -2.0, -2.0, 0.0, 2.0, 4.0, 5.0]),
        graphic_preset("Vocal", [-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 3.0, 1.0, 0.0, -1.0]),
    ]
}
