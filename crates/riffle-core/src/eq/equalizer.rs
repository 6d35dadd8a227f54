//! Equalizer parameter model
//!
//! Owns the user-facing band list and preamp. Every mutation clamps its
//! input and never fails; invalid band indices are ignored. The model does
//! not touch the render graph itself: [`Equalizer::sync_filters`] works out
//! which stage slots changed and hands the new [`StageConfig`]s to a
//! delivery callback (the command queue, in the engine).

use super::band::{BandType, EqBand, EqPreset, MAX_BANDS, MAX_GAIN_DB, MIN_GAIN_DB};
use super::chain::EqChain;
use super::stage::StageConfig;
use super::text;
use crate::dsp::db_to_linear;

pub struct Equalizer {
    bands: Vec<EqBand>,
    preamp_db: f32,
    sample_rate: f64,
    /// Last configuration delivered to each slot (`None` = unknown, resend)
    installed: [Option<StageConfig>; MAX_BANDS],
}

impl Equalizer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            bands: Vec::with_capacity(MAX_BANDS),
            preamp_db: 0.0,
            sample_rate,
            installed: [None; MAX_BANDS],
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────

    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }

    pub fn preamp(&self) -> f32 {
        self.preamp_db
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Snapshot as a named preset
    pub fn to_preset(&self, name: &str) -> EqPreset {
        EqPreset::new(name, self.preamp_db, self.bands.clone())
    }

    // ─────────────────────────────────────────────────────────────
    // Band mutation
    // ─────────────────────────────────────────────────────────────

    /// Append a neutral band; no-op once all slots are taken
    pub fn add_band(&mut self) -> Option<usize> {
        if self.bands.len() >= MAX_BANDS {
            log::debug!("eq: add_band ignored, all {} slots in use", MAX_BANDS);
            return None;
        }
        self.bands.push(EqBand::default());
        Some(self.bands.len() - 1)
    }

    /// Remove a band; later bands shift down one slot
    pub fn remove_band(&mut self, index: usize) -> bool {
        if index >= self.bands.len() {
            return false;
        }
        self.bands.remove(index);
        true
    }

    fn band_mut(&mut self, index: usize) -> Option<&mut EqBand> {
        self.bands.get_mut(index)
    }

    pub fn set_band_gain(&mut self, index: usize, gain: f32) -> bool {
        self.band_mut(index).map(|b| b.set_gain(gain)).is_some()
    }

    pub fn set_band_frequency(&mut self, index: usize, frequency: f32) -> bool {
        self.band_mut(index).map(|b| b.set_frequency(frequency)).is_some()
    }

    pub fn set_band_q(&mut self, index: usize, q: f32) -> bool {
        self.band_mut(index).map(|b| b.set_q(q)).is_some()
    }

    pub fn set_band_type(&mut self, index: usize, band_type: BandType) -> bool {
        self.band_mut(index).map(|b| b.band_type = band_type).is_some()
    }

    pub fn set_band_enabled(&mut self, index: usize, enabled: bool) -> bool {
        self.band_mut(index).map(|b| b.enabled = enabled).is_some()
    }

    /// Set the preamp (dB), returning the clamped value
    pub fn set_preamp(&mut self, db: f32) -> f32 {
        if !db.is_nan() {
            self.preamp_db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        }
        self.preamp_db
    }

    // ─────────────────────────────────────────────────────────────
    // Wholesale changes
    // ─────────────────────────────────────────────────────────────

    /// Copy a preset's preamp and (up to 10) bands into the live model
    pub fn apply_preset(&mut self, preset: &EqPreset) {
        self.set_preamp(preset.preamp);
        self.bands = preset
            .bands
            .iter()
            .take(MAX_BANDS)
            .map(|b| b.clamped())
            .collect();
    }

    /// Replace the band list from an EqualizerAPO-style description
    ///
    /// Returns the number of bands imported. Text without a single valid
    /// filter line leaves the model untouched and returns 0.
    pub fn import_from_text(&mut self, input: &str) -> usize {
        let parsed = text::parse(input);
        if parsed.bands.is_empty() {
            log::info!("eq import: no valid filter lines, keeping current bands");
            return 0;
        }
        if let Some(preamp) = parsed.preamp {
            self.set_preamp(preamp);
        }
        self.bands = parsed.bands;
        log::info!("eq import: loaded {} bands", self.bands.len());
        self.bands.len()
    }

    pub fn export_to_text(&self) -> String {
        text::format(self.preamp_db, &self.bands)
    }

    /// Remove all bands and zero the preamp
    pub fn reset_to_flat(&mut self) {
        self.bands.clear();
        self.preamp_db = 0.0;
    }

    // ─────────────────────────────────────────────────────────────
    // Graph synchronization
    // ─────────────────────────────────────────────────────────────

    /// Reconcile every stage slot with the band at the same index
    ///
    /// `deliver(slot, config)` sends one configuration to the render graph
    /// and returns whether it was accepted. Slots are visited in order and
    /// the pass stops at the first refused delivery, so slot `i` is always
    /// settled before slot `i + 1` changes. Undelivered slots are retried on
    /// the next pass. Returns the number of slots delivered.
    pub fn sync_filters<F>(&mut self, mut deliver: F) -> usize
    where
        F: FnMut(usize, &StageConfig) -> bool,
    {
        let mut delivered = 0;
        for slot in 0..MAX_BANDS {
            let desired = StageConfig::for_band(self.bands.get(slot), self.sample_rate);
            let previous = self.installed[slot];
            if previous == Some(desired) {
                continue;
            }

            let was_custom = previous.map(|c| c.is_custom()).unwrap_or(false);
            if was_custom != desired.is_custom() {
                let (upstream, downstream) = EqChain::neighbors(slot);
                log::debug!(
                    "eq: slot {} becomes {} ({} -> slot -> {})",
                    slot,
                    if desired.is_custom() { "custom" } else { "standard" },
                    upstream,
                    downstream
                );
            }

            if !deliver(slot, &desired) {
                log::warn!("eq: slot {} not delivered, will retry on next sync", slot);
                break;
            }
            self.installed[slot] = Some(desired);
            delivered += 1;
        }
        delivered
    }

    /// Forget what was delivered so the next sync resends every slot
    pub fn invalidate(&mut self) {
        self.installed = [None; MAX_BANDS];
    }

    /// Whether every slot matches the model
    pub fn is_synced(&self) -> bool {
        (0..MAX_BANDS).all(|slot| {
            self.installed[slot]
                == Some(StageConfig::for_band(self.bands.get(slot), self.sample_rate))
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────

    /// Net magnitude response (linear) at each frequency
    ///
    /// Product of every enabled band's response, scaled by the preamp. Works
    /// purely from the model; the render graph is not consulted.
    pub fn frequency_response(&self, frequencies: &[f32]) -> Vec<f32> {
        let stages = self
            .bands
            .iter()
            .enumerate()
            .filter(|(_, b)| b.enabled)
            .map(|(i, b)| (i, StageConfig::for_band(Some(b), self.sample_rate)));
        combined_response(stages, frequencies, self.sample_rate, self.preamp_db)
    }
}

/// Multiply per-stage responses; a stage that can't be analysed counts as unity
fn combined_response<I>(
    stages: I,
    frequencies: &[f32],
    sample_rate: f64,
    preamp_db: f32,
) -> Vec<f32>
where
    I: IntoIterator<Item = (usize, StageConfig)>,
{
    let mut response = vec![1.0_f64; frequencies.len()];
    for (index, config) in stages {
        match config.magnitude_response(frequencies, sample_rate) {
            Ok(mags) => {
                for (acc, m) in response.iter_mut().zip(mags) {
                    *acc *= m;
                }
            }
            Err(e) => log::warn!("eq: band {} skipped in response: {}", index, e),
        }
    }

    let preamp = db_to_linear(preamp_db) as f64;
    response.into_iter().map(|m| (m * preamp) as f32).collect()
}
