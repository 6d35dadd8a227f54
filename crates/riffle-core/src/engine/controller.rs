//! Control-side engine service
//!
//! [`EngineController`] is the single owner of playback and EQ state on the
//! control thread. It keeps the parameter model (bands, preamp, volume,
//! trims), turns every change into [`EngineCommand`]s for the render graph,
//! and reads render state back from [`EngineAtomics`]. The render graph
//! itself ([`AudioEngine`]) is built by [`EngineController::initialize`] and
//! handed to whatever drives the output device.
//!
//! # Transitions
//!
//! ```text
//!   Steady(active) ──crossfade_to(other)──▶ Transitioning(active, other)
//!         ▲                                          │
//!         └──────── ramp completes / abort ──────────┘
//! ```
//!
//! Only one transition may be in flight; a second `crossfade_to` is rejected
//! and the first one keeps running.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use basedrop::Owned;
use thiserror::Error;

use super::atomics::{ContextState, EngineAtomics};
use super::command::{command_channel, CommandSender, EngineCommand};
use super::deck::DeckSource;
use super::engine::AudioEngine;
use super::gc::gc_handle;
use crate::config::{load_config, EngineConfig};
use crate::dsp::db_to_linear;
use crate::eq::{BandType, EqBand, EqPreset, Equalizer, MAX_BANDS};
use crate::notify::{ChangeNotifier, Subscription};
use crate::profiles::{JsonFileStorage, ProfileError, ProfileStorage};
use crate::types::{DeckId, NUM_DECKS};

/// How often the readiness wait re-checks the render thread
const READY_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Where the deck pair is in the transition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Steady { active: DeckId },
    Transitioning { from: DeckId, to: DeckId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("playback graph is not initialized")]
    NotInitialized,

    #[error("a transition from {from} to {to} is already in progress")]
    InProgress { from: DeckId, to: DeckId },

    #[error("{0} is already the active deck")]
    AlreadyActive(DeckId),

    #[error("engine command queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    from: DeckId,
    to: DeckId,
    seq: u64,
}

pub struct EngineController {
    config: EngineConfig,
    equalizer: Equalizer,
    storage: Box<dyn ProfileStorage>,
    notifier: ChangeNotifier,
    /// `None` until initialized, and again after shutdown
    sender: Option<CommandSender>,
    atomics: Arc<EngineAtomics>,

    active: DeckId,
    in_flight: Option<InFlight>,
    next_seq: u64,
    /// Expected binding generation per deck (0 = nothing bound)
    generations: [u64; NUM_DECKS],
    next_generation: u64,

    master_volume: f32,
    deck_trim: [f32; NUM_DECKS],
    /// A preamp/volume/trim command was refused and must be resent
    mix_dirty: bool,

    current_device_name: Option<String>,
}

impl EngineController {
    pub fn new(config: EngineConfig, storage: Box<dyn ProfileStorage>) -> Self {
        let initial = if config.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Self {
            equalizer: Equalizer::new(config.sample_rate_f64()),
            config,
            storage,
            notifier: ChangeNotifier::new(),
            sender: None,
            atomics: Arc::new(EngineAtomics::new(initial)),
            active: DeckId::A,
            in_flight: None,
            next_seq: 1,
            generations: [0; NUM_DECKS],
            next_generation: 1,
            master_volume: 1.0,
            deck_trim: [1.0; NUM_DECKS],
            mix_dirty: false,
            current_device_name: None,
        }
    }

    /// Controller with config from `config_path` and profiles in the default store
    pub fn from_config_file(config_path: &Path) -> Self {
        let config: EngineConfig = load_config(config_path);
        Self::new(config, Box::new(JsonFileStorage::default_location()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Build the processing graph
    ///
    /// Returns the render side on the first call; later calls (including
    /// after shutdown) are no-ops returning `None`. The current EQ, preamp,
    /// volume and trims are installed directly, without glides.
    pub fn initialize(
        &mut self,
        source_a: Option<Box<dyn DeckSource>>,
        source_b: Option<Box<dyn DeckSource>>,
    ) -> Option<AudioEngine> {
        if self.sender.is_some() || self.atomics.context_state() == ContextState::Closed {
            log::debug!("initialize: graph already built, ignoring");
            return None;
        }

        let (producer, consumer) = command_channel();
        let mut engine = AudioEngine::new(&self.config, consumer, Arc::clone(&self.atomics));

        for (deck, source) in [(DeckId::A, source_a), (DeckId::B, source_b)] {
            if let Some(source) = source {
                let generation = self.bump_generation();
                self.generations[deck.index()] = generation;
                engine.bind_source(deck, Some(Owned::new(&gc_handle(), source)), generation);
            }
        }
        for deck in DeckId::ALL {
            engine.set_deck_trim(deck, self.deck_trim[deck.index()]);
        }
        engine.snap_preamp(db_to_linear(self.equalizer.preamp()));
        engine.snap_master(self.master_volume);

        self.equalizer.invalidate();
        self.equalizer.sync_filters(|slot, config| {
            engine.configure_stage(slot, config);
            true
        });

        self.sender = Some(CommandSender::new(producer));
        log::info!(
            "initialize: playback graph built ({} Hz, {} EQ stages, context {:?})",
            self.config.sample_rate,
            MAX_BANDS,
            self.atomics.context_state()
        );
        Some(engine)
    }

    pub fn is_initialized(&self) -> bool {
        self.sender.is_some()
    }

    pub fn context_state(&self) -> ContextState {
        self.atomics.context_state()
    }

    /// Resume a suspended context; no-op in any other state
    pub fn resume_context(&mut self) {
        if self.sender.is_none() {
            log::debug!("resume_context: graph not initialized");
            return;
        }
        if self
            .atomics
            .transition_context(ContextState::Suspended, ContextState::Running)
        {
            log::info!("resume_context: audio context resumed");
            self.notifier.notify();
        }
    }

    /// Suspend a running context (output goes silent, automation clock stops)
    pub fn suspend_context(&mut self) {
        if self.sender.is_some()
            && self
                .atomics
                .transition_context(ContextState::Running, ContextState::Suspended)
        {
            log::info!("suspend_context: audio context suspended");
            self.notifier.notify();
        }
    }

    /// Tear the graph down; it renders silence from the next block on
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        self.atomics.set_context_state(ContextState::Closed);
        self.in_flight = None;
        log::info!("shutdown: playback graph closed");
        self.notifier.notify();
    }

    // ─────────────────────────────────────────────────────────────
    // Decks
    // ─────────────────────────────────────────────────────────────

    fn bump_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn send(&mut self, cmd: EngineCommand) -> Result<(), TransitionError> {
        let sender = self.sender.as_mut().ok_or(TransitionError::NotInitialized)?;
        sender.send(cmd).map_err(|_| {
            log::warn!("engine: command queue full, command dropped");
            TransitionError::QueueFull
        })
    }

    /// Bind a new source to a deck
    ///
    /// The deck counts as ready once the render thread has picked the
    /// binding up and the source reports ready.
    pub fn load_deck(
        &mut self,
        deck: DeckId,
        source: Box<dyn DeckSource>,
    ) -> Result<(), TransitionError> {
        let generation = self.next_generation;
        self.send(EngineCommand::BindSource {
            deck,
            source: Some(Owned::new(&gc_handle(), source)),
            generation,
        })?;
        self.next_generation += 1;
        self.generations[deck.index()] = generation;
        log::debug!("load_deck: {} bound (generation {})", deck, generation);
        Ok(())
    }

    /// Remove a deck's source
    pub fn unload_deck(&mut self, deck: DeckId) -> Result<(), TransitionError> {
        self.send(EngineCommand::BindSource {
            deck,
            source: None,
            generation: 0,
        })?;
        self.generations[deck.index()] = 0;
        Ok(())
    }

    pub fn set_deck_playing(&mut self, deck: DeckId, playing: bool) -> Result<(), TransitionError> {
        self.send(EngineCommand::SetDeckPlaying { deck, playing })
    }

    pub fn is_deck_playing(&self, deck: DeckId) -> bool {
        self.atomics.is_deck_playing(deck)
    }

    /// Whether the deck's current binding has been picked up and is ready
    pub fn is_deck_ready(&self, deck: DeckId) -> bool {
        let expected = self.generations[deck.index()];
        expected != 0 && self.atomics.ready_generation(deck) == expected
    }

    /// Set a deck's loudness compensation from the track's integrated loudness
    ///
    /// `None` (unknown loudness) resets the deck to unity trim.
    pub fn set_deck_loudness(&mut self, deck: DeckId, lufs: Option<f32>) {
        let trim = self.config.loudness.gain_linear(lufs);
        self.deck_trim[deck.index()] = trim;
        log::debug!("set_deck_loudness: {} trim {:.3} (lufs {:?})", deck, trim, lufs);
        if self.sender.is_some()
            && self
                .send(EngineCommand::SetDeckTrim { deck, gain: trim })
                .is_err()
        {
            self.mix_dirty = true;
        }
    }

    pub fn deck_trim(&self, deck: DeckId) -> f32 {
        self.deck_trim[deck.index()]
    }

    /// Block (bounded by `ready_timeout`) until `deck` reports ready
    ///
    /// Returns false on timeout; the caller proceeds regardless.
    fn wait_until_ready(&self, deck: DeckId) -> bool {
        if self.generations[deck.index()] == 0 {
            return true;
        }
        let timeout = self.config.ready_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_deck_ready(deck) {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "transition: {} not ready after {:?}, starting anyway",
                    deck,
                    timeout
                );
                return false;
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────

    pub fn active_deck(&self) -> DeckId {
        self.active
    }

    pub fn transition_state(&self) -> TransitionState {
        match self.in_flight {
            Some(t) if self.atomics.completed_transition() < t.seq => {
                TransitionState::Transitioning {
                    from: t.from,
                    to: t.to,
                }
            }
            _ => TransitionState::Steady {
                active: self.active,
            },
        }
    }

    /// Crossfade to `target` over the configured default duration
    pub fn crossfade_to(&mut self, target: DeckId) -> Result<(), TransitionError> {
        let frames = self.config.crossfade_frames();
        self.start_crossfade(target, frames)
    }

    /// Crossfade to `target` over `duration`
    ///
    /// The target becomes the active deck immediately; the ramps run on the
    /// render thread. Rejected while another transition is in flight.
    pub fn crossfade_to_with(
        &mut self,
        target: DeckId,
        duration: Duration,
    ) -> Result<(), TransitionError> {
        let frames = self.config.frames_for(duration);
        self.start_crossfade(target, frames)
    }

    fn start_crossfade(
        &mut self,
        target: DeckId,
        duration_frames: u64,
    ) -> Result<(), TransitionError> {
        if self.sender.is_none() {
            return Err(TransitionError::NotInitialized);
        }
        self.poll();
        if let Some(t) = self.in_flight {
            log::info!(
                "transition: crossfade to {} rejected, {} -> {} in progress",
                target,
                t.from,
                t.to
            );
            return Err(TransitionError::InProgress {
                from: t.from,
                to: t.to,
            });
        }
        if target == self.active {
            return Err(TransitionError::AlreadyActive(target));
        }

        self.wait_until_ready(target);

        let seq = self.next_seq;
        self.send(EngineCommand::Crossfade {
            target,
            duration_frames,
            seq,
        })?;
        self.next_seq += 1;

        let from = self.active;
        self.active = target;
        self.in_flight = Some(InFlight {
            from,
            to: target,
            seq,
        });
        log::info!(
            "transition: crossfade {} -> {} over {} frames ({:.1}s)",
            from,
            target,
            duration_frames,
            duration_frames as f64 / self.config.sample_rate_f64()
        );
        self.notifier.notify();
        Ok(())
    }

    /// Cancel pending ramps and snap gains to the active deck
    pub fn abort_crossfade(&mut self) -> Result<(), TransitionError> {
        let seq = self.next_seq;
        self.send(EngineCommand::AbortCrossfade {
            active: self.active,
            seq,
        })?;
        self.next_seq += 1;
        if self.in_flight.take().is_some() {
            log::info!("transition: crossfade aborted, {} active", self.active);
        }
        self.notifier.notify();
        Ok(())
    }

    /// Switch to `target` instantly, with no fade
    ///
    /// Play and abort are queued together or not at all; on `QueueFull` the
    /// active deck is unchanged.
    pub fn hard_cut_to(&mut self, target: DeckId) -> Result<(), TransitionError> {
        let free = match &self.sender {
            Some(sender) => sender.free_slots(),
            None => return Err(TransitionError::NotInitialized),
        };
        if free < 2 {
            log::warn!("transition: hard cut to {} refused, command queue full", target);
            return Err(TransitionError::QueueFull);
        }
        self.wait_until_ready(target);
        self.send(EngineCommand::SetDeckPlaying {
            deck: target,
            playing: true,
        })?;
        self.active = target;
        log::info!("transition: hard cut to {}", target);
        self.abort_crossfade()
    }

    // ─────────────────────────────────────────────────────────────
    // Volume
    // ─────────────────────────────────────────────────────────────

    /// Set master volume (0.0 to 1.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.master_volume = volume.clamp(0.0, 1.0);
        if self.sender.is_some()
            && self
                .send(EngineCommand::SetMasterVolume {
                    volume: self.master_volume,
                })
                .is_err()
        {
            self.mix_dirty = true;
        }
        self.notifier.notify();
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Resend preamp, volume and trims after a refused command
    fn push_mix_state(&mut self) {
        let mut commands = vec![
            EngineCommand::SetPreamp {
                gain: db_to_linear(self.equalizer.preamp()),
            },
            EngineCommand::SetMasterVolume {
                volume: self.master_volume,
            },
        ];
        for deck in DeckId::ALL {
            commands.push(EngineCommand::SetDeckTrim {
                deck,
                gain: self.deck_trim[deck.index()],
            });
        }
        self.mix_dirty = false;
        for cmd in commands {
            if self.send(cmd).is_err() {
                self.mix_dirty = true;
                break;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Equalizer
    // ─────────────────────────────────────────────────────────────

    fn sync_eq(&mut self) {
        let Self {
            equalizer, sender, ..
        } = self;
        if let Some(sender) = sender.as_mut() {
            equalizer.sync_filters(|slot, config| {
                sender
                    .send(EngineCommand::ConfigureStage {
                        slot,
                        config: *config,
                    })
                    .is_ok()
            });
        }
    }

    fn eq_changed(&mut self) {
        self.sync_eq();
        self.notifier.notify();
    }

    fn preamp_changed(&mut self) {
        if self.sender.is_none() {
            return;
        }
        let gain = db_to_linear(self.equalizer.preamp());
        if self.send(EngineCommand::SetPreamp { gain }).is_err() {
            self.mix_dirty = true;
        }
    }

    pub fn add_band(&mut self) -> Option<usize> {
        let index = self.equalizer.add_band();
        if index.is_some() {
            self.eq_changed();
        }
        index
    }

    pub fn remove_band(&mut self, index: usize) -> bool {
        let removed = self.equalizer.remove_band(index);
        if removed {
            self.eq_changed();
        }
        removed
    }

    pub fn set_band_gain(&mut self, index: usize, gain: f32) -> bool {
        let changed = self.equalizer.set_band_gain(index, gain);
        if changed {
            self.eq_changed();
        }
        changed
    }

    pub fn set_band_frequency(&mut self, index: usize, frequency: f32) -> bool {
        let changed = self.equalizer.set_band_frequency(index, frequency);
        if changed {
            self.eq_changed();
        }
        changed
    }

    pub fn set_band_q(&mut self, index: usize, q: f32) -> bool {
        let changed = self.equalizer.set_band_q(index, q);
        if changed {
            self.eq_changed();
        }
        changed
    }

    pub fn set_band_type(&mut self, index: usize, band_type: BandType) -> bool {
        let changed = self.equalizer.set_band_type(index, band_type);
        if changed {
            self.eq_changed();
        }
        changed
    }

    pub fn set_band_enabled(&mut self, index: usize, enabled: bool) -> bool {
        let changed = self.equalizer.set_band_enabled(index, enabled);
        if changed {
            self.eq_changed();
        }
        changed
    }

    /// Set the preamp in dB (clamped to ±12), smoothed on the render side
    pub fn set_preamp(&mut self, db: f32) -> f32 {
        let applied = self.equalizer.set_preamp(db);
        self.preamp_changed();
        self.notifier.notify();
        applied
    }

    /// Apply a preset's preamp and bands
    pub fn apply_preset(&mut self, preset: &EqPreset) {
        self.equalizer.apply_preset(preset);
        log::info!(
            "apply_preset: {:?} ({} bands, preamp {:.1} dB)",
            preset.name,
            self.equalizer.bands().len(),
            self.equalizer.preamp()
        );
        self.preamp_changed();
        self.eq_changed();
    }

    /// Replace the bands from EqualizerAPO-style text; returns bands imported
    pub fn import_from_text(&mut self, text: &str) -> usize {
        let imported = self.equalizer.import_from_text(text);
        if imported > 0 {
            self.preamp_changed();
            self.eq_changed();
        }
        imported
    }

    pub fn export_to_text(&self) -> String {
        self.equalizer.export_to_text()
    }

    /// Remove all bands and zero the preamp
    pub fn reset_to_flat(&mut self) {
        self.equalizer.reset_to_flat();
        self.preamp_changed();
        self.eq_changed();
    }

    pub fn bands(&self) -> &[EqBand] {
        self.equalizer.bands()
    }

    pub fn preamp(&self) -> f32 {
        self.equalizer.preamp()
    }

    /// Net magnitude response (linear) of preamp and enabled bands
    pub fn frequency_response(&self, frequencies: &[f32]) -> Vec<f32> {
        self.equalizer.frequency_response(frequencies)
    }

    // ─────────────────────────────────────────────────────────────
    // Device profiles
    // ─────────────────────────────────────────────────────────────

    /// Store the current preamp and bands under `name` and make it current
    pub fn save_device_profile(&mut self, name: &str) -> Result<(), ProfileError> {
        let name = name.trim();
        let preset = self.equalizer.to_preset(name);
        self.storage.set(name, &preset)?;
        log::info!("profiles: saved {:?}", name);
        self.current_device_name = Some(name.to_string());
        self.notifier.notify();
        Ok(())
    }

    /// Apply the profile stored under `name`; `Ok(false)` if there is none
    pub fn load_device_profile(&mut self, name: &str) -> Result<bool, ProfileError> {
        let name = name.trim();
        let Some(preset) = self.storage.get(name)? else {
            log::warn!("profiles: no profile named {:?}", name);
            return Ok(false);
        };
        self.apply_preset(&preset);
        self.current_device_name = Some(name.to_string());
        Ok(true)
    }

    /// Delete a stored profile; clears the current device if it was this one
    pub fn delete_device_profile(&mut self, name: &str) -> Result<bool, ProfileError> {
        let name = name.trim();
        let deleted = self.storage.delete(name)?;
        if deleted {
            log::info!("profiles: deleted {:?}", name);
            if self.current_device_name.as_deref() == Some(name) {
                self.current_device_name = None;
            }
            self.notifier.notify();
        }
        Ok(deleted)
    }

    pub fn device_profile_names(&self) -> Result<Vec<String>, ProfileError> {
        self.storage.names()
    }

    /// Name of the profile last saved or loaded (edits since don't clear it)
    pub fn current_device_name(&self) -> Option<&str> {
        self.current_device_name.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // Notifications and metering
    // ─────────────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Periodic tick from the host's control loop
    ///
    /// Picks up transitions completed on the render thread and retries
    /// commands that were refused by a full queue.
    pub fn poll(&mut self) {
        let mut changed = false;
        if let Some(t) = self.in_flight {
            if self.atomics.completed_transition() >= t.seq {
                log::info!("transition: {} -> {} complete", t.from, t.to);
                self.in_flight = None;
                changed = true;
            }
        }
        if self.sender.is_some() {
            if self.mix_dirty {
                self.push_mix_state();
            }
            if !self.equalizer.is_synced() {
                self.sync_eq();
            }
        }
        if changed {
            self.notifier.notify();
        }
    }

    pub fn deck_gain(&self, deck: DeckId) -> f32 {
        self.atomics.deck_gain(deck)
    }

    pub fn limiter_reduction_db(&self) -> f32 {
        self.atomics.limiter_reduction_db()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.atomics.frames_rendered()
    }

    pub fn atomics(&self) -> Arc<EngineAtomics> {
        Arc::clone(&self.atomics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::deck::BufferSource;
    use crate::profiles::MemoryStorage;
    use crate::types::{StereoBuffer, StereoSample};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Never reports ready
    struct Buffering;

    impl DeckSource for Buffering {
        fn render(&mut self, _out: &mut [StereoSample]) -> usize {
            0
        }

        fn is_ready(&self) -> bool {
            false
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 8000,
            crossfade_secs: 0.5,
            ready_timeout_ms: 50,
            ..Default::default()
        }
    }

    fn dc(value: f32) -> Box<dyn DeckSource> {
        Box::new(BufferSource::new(vec![StereoSample::mono(value); 80_000]))
    }

    fn controller() -> EngineController {
        EngineController::new(test_config(), Box::new(MemoryStorage::new()))
    }

    fn setup() -> (EngineController, AudioEngine) {
        let mut ctl = controller();
        let engine = ctl.initialize(Some(dc(0.2)), Some(dc(0.6))).unwrap();
        ctl.resume_context();
        (ctl, engine)
    }

    fn render(engine: &mut AudioEngine, frames: usize) -> StereoBuffer {
        let mut out = StereoBuffer::silence(frames);
        engine.process(&mut out);
        out
    }

    fn counter(ctl: &EngineController) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = ctl.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut ctl = controller();
        assert!(ctl.initialize(None, None).is_some());
        assert!(ctl.initialize(None, None).is_none());
        assert!(ctl.is_initialized());
    }

    #[test]
    fn test_resume_context() {
        let mut ctl = controller();
        // Resume before initialize is a no-op
        ctl.resume_context();
        assert_eq!(ctl.context_state(), ContextState::Suspended);

        let mut engine = ctl.initialize(Some(dc(0.5)), None).unwrap();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        let out = render(&mut engine, 256);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(ctl.frames_rendered(), 0);

        let (count, _sub) = counter(&ctl);
        ctl.resume_context();
        ctl.resume_context();
        assert_eq!(ctl.context_state(), ContextState::Running);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let out = render(&mut engine, 256);
        assert!((out[255].left - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_crossfade_to_other_deck() {
        let (mut ctl, mut engine) = setup();
        let (count, _sub) = counter(&ctl);
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        render(&mut engine, 800);

        ctl.crossfade_to(DeckId::B).unwrap();
        assert_eq!(ctl.active_deck(), DeckId::B);
        assert_eq!(
            ctl.transition_state(),
            TransitionState::Transitioning {
                from: DeckId::A,
                to: DeckId::B
            }
        );

        // 0.5 s at 8 kHz
        render(&mut engine, 2000);
        assert!(ctl.deck_gain(DeckId::A) > 0.0);
        let out = render(&mut engine, 2100);
        ctl.poll();

        assert_eq!(ctl.transition_state(), TransitionState::Steady { active: DeckId::B });
        assert!(ctl.deck_gain(DeckId::A) < 1e-6);
        assert!((ctl.deck_gain(DeckId::B) - 1.0).abs() < 1e-6);
        assert!(!ctl.is_deck_playing(DeckId::A));
        assert!((out[2099].left - 0.6).abs() < 1e-3);
        // Start and completion
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_crossfade_rejected_while_transitioning() {
        let (mut ctl, mut engine) = setup();
        ctl.crossfade_to(DeckId::B).unwrap();
        render(&mut engine, 1000);

        assert_eq!(
            ctl.crossfade_to(DeckId::A),
            Err(TransitionError::InProgress {
                from: DeckId::A,
                to: DeckId::B
            })
        );
        assert_eq!(ctl.active_deck(), DeckId::B);

        render(&mut engine, 3500);
        ctl.poll();
        assert_eq!(ctl.transition_state(), TransitionState::Steady { active: DeckId::B });
        assert_eq!(ctl.deck_gain(DeckId::B), 1.0);

        // Now a new transition is accepted
        assert!(ctl.crossfade_to(DeckId::A).is_ok());
    }

    #[test]
    fn test_crossfade_to_active_deck_is_rejected() {
        let (mut ctl, _engine) = setup();
        assert_eq!(
            ctl.crossfade_to(DeckId::A),
            Err(TransitionError::AlreadyActive(DeckId::A))
        );
    }

    #[test]
    fn test_abort_mid_transition_snaps() {
        let (mut ctl, mut engine) = setup();
        ctl.crossfade_to(DeckId::B).unwrap();
        render(&mut engine, 1000);
        assert!(ctl.deck_gain(DeckId::B) > 0.0 && ctl.deck_gain(DeckId::B) < 1.0);

        ctl.abort_crossfade().unwrap();
        assert_eq!(ctl.transition_state(), TransitionState::Steady { active: DeckId::B });

        render(&mut engine, 64);
        assert_eq!(ctl.deck_gain(DeckId::A), 0.0);
        assert_eq!(ctl.deck_gain(DeckId::B), 1.0);

        render(&mut engine, 8000);
        assert_eq!(ctl.deck_gain(DeckId::A), 0.0);
    }

    #[test]
    fn test_hard_cut() {
        let (mut ctl, mut engine) = setup();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        render(&mut engine, 256);

        ctl.hard_cut_to(DeckId::B).unwrap();
        assert_eq!(ctl.transition_state(), TransitionState::Steady { active: DeckId::B });

        let out = render(&mut engine, 256);
        assert_eq!(ctl.deck_gain(DeckId::B), 1.0);
        assert_eq!(ctl.deck_gain(DeckId::A), 0.0);
        assert!(!ctl.is_deck_playing(DeckId::A));
        assert!((out[0].left - 0.6).abs() < 1e-4);
    }

    #[test]
    fn test_hard_cut_with_one_free_slot_changes_nothing() {
        let (mut ctl, mut engine) = setup();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        render(&mut engine, 64);
        for _ in 0..(crate::engine::COMMAND_QUEUE_CAPACITY - 1) {
            ctl.set_master_volume(1.0);
        }

        assert_eq!(ctl.hard_cut_to(DeckId::B), Err(TransitionError::QueueFull));
        assert_eq!(ctl.active_deck(), DeckId::A);

        render(&mut engine, 64);
        ctl.poll();
        render(&mut engine, 64);
        assert_eq!(ctl.transition_state(), TransitionState::Steady { active: DeckId::A });
        assert_eq!(ctl.deck_gain(DeckId::A), 1.0);
        assert_eq!(ctl.deck_gain(DeckId::B), 0.0);
        assert!(!ctl.is_deck_playing(DeckId::B));

        // Once the queue drains the cut goes through
        ctl.hard_cut_to(DeckId::B).unwrap();
        render(&mut engine, 64);
        assert_eq!(ctl.deck_gain(DeckId::B), 1.0);
        assert_eq!(ctl.deck_gain(DeckId::A), 0.0);
    }

    #[test]
    fn test_huge_crossfade_duration() {
        let (mut ctl, mut engine) = setup();
        ctl.crossfade_to_with(DeckId::B, Duration::MAX).unwrap();
        render(&mut engine, 8000);
        assert_eq!(
            ctl.transition_state(),
            TransitionState::Transitioning {
                from: DeckId::A,
                to: DeckId::B
            }
        );
        assert!(ctl.deck_gain(DeckId::A) > 0.999);

        ctl.abort_crossfade().unwrap();
        render(&mut engine, 64);
        assert_eq!(ctl.deck_gain(DeckId::B), 1.0);
    }

    #[test]
    fn test_not_initialized() {
        let mut ctl = controller();
        assert_eq!(ctl.crossfade_to(DeckId::B), Err(TransitionError::NotInitialized));
        assert_eq!(ctl.hard_cut_to(DeckId::B), Err(TransitionError::NotInitialized));
        assert_eq!(ctl.abort_crossfade(), Err(TransitionError::NotInitialized));
        assert!(ctl.load_deck(DeckId::A, dc(0.1)).is_err());

        // The EQ model works without a graph
        assert_eq!(ctl.add_band(), Some(0));
        ctl.set_master_volume(0.3);
        assert_eq!(ctl.master_volume(), 0.3);
    }

    #[test]
    fn test_readiness_timeout_proceeds() {
        let (mut ctl, mut engine) = setup();
        ctl.load_deck(DeckId::B, Box::new(Buffering)).unwrap();
        render(&mut engine, 64);
        assert!(!ctl.is_deck_ready(DeckId::B));

        let started = Instant::now();
        assert!(ctl.crossfade_to(DeckId::B).is_ok());
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(ctl.active_deck(), DeckId::B);
    }

    #[test]
    fn test_loaded_deck_becomes_ready() {
        let (mut ctl, mut engine) = setup();
        ctl.load_deck(DeckId::B, dc(0.4)).unwrap();
        // Not picked up by the render thread yet
        assert!(!ctl.is_deck_ready(DeckId::B));
        render(&mut engine, 64);
        assert!(ctl.is_deck_ready(DeckId::B));

        ctl.crossfade_to_with(DeckId::B, Duration::ZERO).unwrap();
        let out = render(&mut engine, 64);
        assert!((out[63].left - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_shutdown() {
        let (mut ctl, mut engine) = setup();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        ctl.shutdown();

        assert_eq!(ctl.context_state(), ContextState::Closed);
        assert_eq!(render(&mut engine, 128).peak(), 0.0);
        assert_eq!(ctl.crossfade_to(DeckId::B), Err(TransitionError::NotInitialized));
        assert!(ctl.initialize(None, None).is_none());
        ctl.resume_context();
        assert_eq!(ctl.context_state(), ContextState::Closed);
    }

    #[test]
    fn test_eq_changes_reach_the_graph() {
        let (mut ctl, mut engine) = setup();
        let (count, _sub) = counter(&ctl);

        let band = ctl.add_band().unwrap();
        ctl.set_band_type(band, BandType::LowShelf);
        ctl.set_band_q(band, 2.0);
        render(&mut engine, 16);
        assert!(engine.eq().stage(0).unwrap().is_custom());
        assert_eq!(count.load(Ordering::SeqCst), 3);

        ctl.set_band_q(band, 0.7071);
        render(&mut engine, 16);
        assert!(!engine.eq().stage(0).unwrap().is_custom());

        ctl.reset_to_flat();
        assert!(ctl.bands().is_empty());
        assert_eq!(ctl.preamp(), 0.0);
    }

    #[test]
    fn test_initialize_installs_existing_eq() {
        let mut ctl = controller();
        ctl.import_from_text("Filter 1: ON HSC Fc 6000 Hz Gain 3 dB Q 1.5");
        let engine = ctl.initialize(None, None).unwrap();
        assert!(engine.eq().stage(0).unwrap().is_custom());
    }

    #[test]
    fn test_preamp_and_volume_clamp() {
        let (mut ctl, mut engine) = setup();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        assert_eq!(ctl.set_preamp(20.0), 12.0);
        assert_eq!(ctl.set_preamp(-6.0), -6.0);
        ctl.set_master_volume(4.0);
        assert_eq!(ctl.master_volume(), 1.0);

        // 0.2 at -6 dB
        let out = render(&mut engine, 4000);
        assert!((out[3999].left - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_loudness_trim() {
        let (mut ctl, mut engine) = setup();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        // -20 LUFS against the -14 target: +6 dB
        ctl.set_deck_loudness(DeckId::A, Some(-20.0));
        assert!((ctl.deck_trim(DeckId::A) - 1.995).abs() < 0.01);

        let out = render(&mut engine, 64);
        assert!((out[63].left - 0.399).abs() < 0.01);

        ctl.set_deck_loudness(DeckId::A, None);
        assert_eq!(ctl.deck_trim(DeckId::A), 1.0);
    }

    #[test]
    fn test_device_profiles() {
        let (mut ctl, _engine) = setup();
        ctl.import_from_text("Preamp: -2 dB\nFilter 1: ON PK Fc 300 Hz Gain 4 dB Q 2");
        ctl.save_device_profile("Desk").unwrap();
        assert_eq!(ctl.current_device_name(), Some("Desk"));

        ctl.reset_to_flat();
        assert!(ctl.load_device_profile("Desk").unwrap());
        assert_eq!(ctl.bands().len(), 1);
        assert_eq!(ctl.bands()[0].frequency, 300.0);
        assert_eq!(ctl.preamp(), -2.0);
        assert_eq!(ctl.current_device_name(), Some("Desk"));

        assert!(!ctl.load_device_profile("Car").unwrap());
        assert_eq!(ctl.device_profile_names().unwrap(), vec!["Desk".to_string()]);

        assert!(ctl.delete_device_profile("Desk").unwrap());
        assert_eq!(ctl.current_device_name(), None);
        assert!(ctl.device_profile_names().unwrap().is_empty());
        assert!(matches!(ctl.save_device_profile(" "), Err(ProfileError::EmptyName)));
    }

    #[test]
    fn test_full_queue_is_retried_on_poll() {
        let (mut ctl, mut engine) = setup();
        for i in 0..(crate::engine::COMMAND_QUEUE_CAPACITY + 8) {
            ctl.set_master_volume((i % 10) as f32 / 10.0);
        }
        ctl.set_master_volume(0.25);

        ctl.add_band();
        ctl.set_band_type(0, BandType::HighShelf);
        ctl.set_band_q(0, 3.0);

        render(&mut engine, 16);
        assert!(!engine.eq().stage(0).unwrap().is_custom());

        ctl.poll();
        render(&mut engine, 16);
        assert!(engine.eq().stage(0).unwrap().is_custom());
    }
}
