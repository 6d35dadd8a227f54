//! Render state published to the control thread
//!
//! Written by the render thread once per block (and by the controller for
//! the context state), read without locks. All accesses use
//! `Ordering::Relaxed`: readers only need eventual visibility of each value.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::types::{DeckId, NUM_DECKS};

/// Lifecycle of the processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    /// Not rendering yet (or paused by the host); output is silence
    Suspended = 0,
    Running = 1,
    /// Torn down; output stays silent for good
    Closed = 2,
}

impl ContextState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ContextState::Running,
            2 => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }
}

pub struct EngineAtomics {
    /// Frames rendered while running (the automation clock)
    pub frames_rendered: AtomicU64,
    /// [`ContextState`] as u8
    pub context_state: AtomicU8,
    /// Automated deck gain at the end of the last block (f32 bits)
    pub deck_gain: [AtomicU32; NUM_DECKS],
    pub deck_playing: [AtomicBool; NUM_DECKS],
    /// Generation of the bound source once it reports ready, 0 otherwise
    pub ready_generation: [AtomicU64; NUM_DECKS],
    /// Sequence number of the last transition that completed or was aborted
    pub completed_transition: AtomicU64,
    /// Limiter gain reduction in dB (f32 bits)
    pub limiter_reduction: AtomicU32,
}

impl EngineAtomics {
    pub fn new(initial: ContextState) -> Self {
        Self {
            frames_rendered: AtomicU64::new(0),
            context_state: AtomicU8::new(initial as u8),
            deck_gain: [AtomicU32::new(1.0_f32.to_bits()), AtomicU32::new(0.0_f32.to_bits())],
            deck_playing: [AtomicBool::new(false), AtomicBool::new(false)],
            ready_generation: [AtomicU64::new(0), AtomicU64::new(0)],
            completed_transition: AtomicU64::new(0),
            limiter_reduction: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    #[inline]
    pub fn context_state(&self) -> ContextState {
        ContextState::from_u8(self.context_state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_context_state(&self, state: ContextState) {
        self.context_state.store(state as u8, Ordering::Relaxed);
    }

    /// Atomically move from `from` to `to`; false if the state was different
    pub fn transition_context(&self, from: ContextState, to: ContextState) -> bool {
        self.context_state
            .compare_exchange(from as u8, to as u8, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn deck_gain(&self, deck: DeckId) -> f32 {
        f32::from_bits(self.deck_gain[deck.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_deck_playing(&self, deck: DeckId) -> bool {
        self.deck_playing[deck.index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ready_generation(&self, deck: DeckId) -> u64 {
        self.ready_generation[deck.index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn completed_transition(&self) -> u64 {
        self.completed_transition.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn limiter_reduction_db(&self) -> f32 {
        f32::from_bits(self.limiter_reduction.load(Ordering::Relaxed))
    }
}

impl Default for EngineAtomics {
    fn default() -> Self {
        Self::new(ContextState::Suspended)
    }
}
