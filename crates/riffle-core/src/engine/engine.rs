//! Render-side playback graph
//!
//! ```text
//!   deck A ─ trim × gain ─┐
//!                         ├─▶ preamp ─▶ EQ stage 0…9 ─▶ master ─▶ limiter ─▶ out
//!   deck B ─ trim × gain ─┘
//! ```
//!
//! Owned exclusively by the render thread. All changes arrive through the
//! command queue and are applied at the start of [`AudioEngine::process`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::atomics::{ContextState, EngineAtomics};
use super::command::EngineCommand;
use super::deck::{Deck, DeckSource};
use crate::config::EngineConfig;
use crate::dsp::{OutputLimiter, SmoothedParam};
use crate::eq::{EqChain, StageConfig};
use crate::types::{DeckId, StereoBuffer, StereoSample, NUM_DECKS};

use basedrop::Owned;

/// Largest block rendered in one pass; longer host buffers are split
pub const MAX_BUFFER_SIZE: usize = 8192;

/// A crossfade whose ramps are still running
#[derive(Debug, Clone, Copy)]
struct PendingTransition {
    seq: u64,
    end_frame: u64,
    outgoing: DeckId,
}

pub struct AudioEngine {
    decks: [Deck; NUM_DECKS],
    preamp: SmoothedParam,
    master: SmoothedParam,
    eq: EqChain,
    limiter: OutputLimiter,
    /// Frames rendered while running; automation is scheduled against it
    clock: u64,
    transition: Option<PendingTransition>,
    commands: rtrb::Consumer<EngineCommand>,
    atomics: Arc<EngineAtomics>,
}

impl AudioEngine {
    pub fn new(
        config: &EngineConfig,
        commands: rtrb::Consumer<EngineCommand>,
        atomics: Arc<EngineAtomics>,
    ) -> Self {
        let sr = config.sample_rate_f64();
        let smoothing = config.smoothing_ms;
        let engine = Self {
            decks: std::array::from_fn(|i| Deck::new(DeckId::ALL[i], MAX_BUFFER_SIZE)),
            preamp: SmoothedParam::new(1.0, smoothing, sr as f32),
            master: SmoothedParam::new(1.0, smoothing, sr as f32),
            eq: EqChain::new(smoothing, sr),
            limiter: OutputLimiter::new(&config.limiter, sr as f32),
            clock: 0,
            transition: None,
            commands,
            atomics,
        };
        engine.publish();
        engine
    }

    // ─────────────────────────────────────────────────────────────
    // Direct setup (before the engine is handed to the render thread)
    // ─────────────────────────────────────────────────────────────

    pub fn bind_source(
        &mut self,
        deck: DeckId,
        source: Option<Owned<Box<dyn DeckSource>>>,
        generation: u64,
    ) {
        self.decks[deck.index()].bind(source, generation);
        self.publish();
    }

    pub fn set_deck_playing(&mut self, deck: DeckId, playing: bool) {
        self.decks[deck.index()].set_playing(playing);
    }

    pub fn set_deck_trim(&mut self, deck: DeckId, gain: f32) {
        self.decks[deck.index()].set_trim(gain);
    }

    /// Set preamp without a glide
    pub fn snap_preamp(&mut self, gain: f32) {
        self.preamp.snap(gain);
    }

    /// Set master volume without a glide
    pub fn snap_master(&mut self, volume: f32) {
        self.master.snap(volume.clamp(0.0, 1.0));
    }

    pub fn configure_stage(&mut self, slot: usize, config: &StageConfig) {
        self.eq.configure(slot, config);
    }

    pub fn deck(&self, deck: DeckId) -> &Deck {
        &self.decks[deck.index()]
    }

    pub fn eq(&self) -> &EqChain {
        &self.eq
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    // ─────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                EngineCommand::BindSource {
                    deck,
                    source,
                    generation,
                } => {
                    // The replaced source is dropped here and freed by the collector
                    self.decks[deck.index()].bind(source, generation);
                }
                EngineCommand::SetDeckPlaying { deck, playing } => {
                    self.decks[deck.index()].set_playing(playing);
                }
                EngineCommand::SetDeckTrim { deck, gain } => {
                    self.decks[deck.index()].set_trim(gain);
                }
                EngineCommand::Crossfade {
                    target,
                    duration_frames,
                    seq,
                } => self.start_crossfade(target, duration_frames, seq),
                EngineCommand::AbortCrossfade { active, seq } => {
                    self.abort_crossfade(active, seq);
                }
                EngineCommand::SetMasterVolume { volume } => {
                    self.master.set_target(volume.clamp(0.0, 1.0));
                }
                EngineCommand::SetPreamp { gain } => {
                    self.preamp.set_target(gain);
                }
                EngineCommand::ConfigureStage { slot, config } => {
                    self.eq.configure(slot, &config);
                }
            }
        }
    }

    fn start_crossfade(&mut self, target: DeckId, duration: u64, seq: u64) {
        let now = self.clock;
        let outgoing = target.other();

        for deck in &mut self.decks {
            deck.gain_mut().cancel_scheduled(now);
        }
        self.decks[target.index()]
            .gain_mut()
            .linear_ramp(0.0, 1.0, now, duration);
        self.decks[outgoing.index()]
            .gain_mut()
            .linear_ramp(1.0, 0.0, now, duration);
        self.decks[target.index()].set_playing(true);

        self.transition = Some(PendingTransition {
            seq,
            end_frame: now.saturating_add(duration),
            outgoing,
        });
    }

    fn abort_crossfade(&mut self, active: DeckId, seq: u64) {
        let now = self.clock;
        for deck in &mut self.decks {
            deck.gain_mut().cancel_scheduled(now);
        }
        self.decks[active.index()].gain_mut().set_value(1.0);
        self.decks[active.other().index()].gain_mut().set_value(0.0);
        self.decks[active.other().index()].set_playing(false);

        self.transition = None;
        self.atomics
            .completed_transition
            .fetch_max(seq, Ordering::Relaxed);
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────

    /// Render one host buffer
    ///
    /// Commands are applied first. While the context is suspended or closed
    /// the output is silence and the clock stands still.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        self.process_commands();

        if self.atomics.context_state() != ContextState::Running {
            output.fill_silence();
            self.publish();
            return;
        }

        for block in output.as_mut_slice().chunks_mut(MAX_BUFFER_SIZE) {
            self.render_block(block);
        }
        self.publish();
    }

    fn render_block(&mut self, out: &mut [StereoSample]) {
        let start = self.clock;
        out.fill(StereoSample::silence());

        for deck in &mut self.decks {
            deck.mix_into(out, start);
        }

        for s in out.iter_mut() {
            *s *= self.preamp.next();
        }
        self.eq.process(out);
        for s in out.iter_mut() {
            *s *= self.master.next();
        }
        self.limiter.process(out);

        self.clock += out.len() as u64;
        self.finish_transition_if_done();
    }

    fn finish_transition_if_done(&mut self) {
        let Some(t) = self.transition else {
            return;
        };
        if self.clock < t.end_frame {
            return;
        }
        self.decks[t.outgoing.index()].set_playing(false);
        self.transition = None;
        self.atomics
            .completed_transition
            .fetch_max(t.seq, Ordering::Relaxed);
    }

    /// Publish render state for the control thread
    fn publish(&self) {
        let a = &self.atomics;
        a.frames_rendered.store(self.clock, Ordering::Relaxed);
        for (i, deck) in self.decks.iter().enumerate() {
            a.deck_gain[i].store(deck.gain().value_at(self.clock).to_bits(), Ordering::Relaxed);
            a.deck_playing[i].store(deck.is_playing(), Ordering::Relaxed);
            a.ready_generation[i].store(deck.ready_generation(), Ordering::Relaxed);
        }
        a.limiter_reduction
            .store(self.limiter.gain_reduction_db().to_bits(), Ordering::Relaxed);
    }
}
