//! Decks: source port and render-side deck state
//!
//! The core does not decode audio. A host binds something that can produce
//! stereo frames (a platform decoder, a network stream, a pre-decoded
//! buffer) through the [`DeckSource`] trait.

use basedrop::Owned;

use crate::dsp::GainAutomation;
use crate::types::{DeckId, StereoBuffer, StereoSample};

/// Audio provider bound to a deck
///
/// Called on the render thread: implementations must not block or allocate
/// in `render`.
pub trait DeckSource: Send {
    /// Fill `out` with the next frames; returns how many were written.
    /// Frames past the returned count are treated as silence.
    fn render(&mut self, out: &mut [StereoSample]) -> usize;

    /// Whether media is buffered enough to start playback
    fn is_ready(&self) -> bool {
        true
    }
}

/// Pre-decoded audio held in memory
pub struct BufferSource {
    samples: Vec<StereoSample>,
    position: usize,
}

impl BufferSource {
    pub fn new(samples: Vec<StereoSample>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Build from interleaved `[L, R, L, R, ...]` data
    pub fn from_interleaved(interleaved: &[f32]) -> Self {
        Self::new(StereoBuffer::from_interleaved(interleaved).as_slice().to_vec())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl DeckSource for BufferSource {
    fn render(&mut self, out: &mut [StereoSample]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        n
    }
}

/// Render-side state of one deck
pub struct Deck {
    id: DeckId,
    source: Option<Owned<Box<dyn DeckSource>>>,
    /// Binding generation of `source`, 0 when unbound
    generation: u64,
    playing: bool,
    /// Loudness compensation (linear)
    trim: f32,
    gain: GainAutomation,
    buffer: StereoBuffer,
}

impl Deck {
    /// Deck A starts audible (gain 1), deck B silent (gain 0)
    pub fn new(id: DeckId, max_block: usize) -> Self {
        let initial_gain = match id {
            DeckId::A => 1.0,
            DeckId::B => 0.0,
        };
        Self {
            id,
            source: None,
            generation: 0,
            playing: false,
            trim: 1.0,
            gain: GainAutomation::new(initial_gain),
            buffer: StereoBuffer::silence(max_block),
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Replace the source; the previous one is reclaimed off-thread
    pub fn bind(&mut self, source: Option<Owned<Box<dyn DeckSource>>>, generation: u64) {
        self.generation = if source.is_some() { generation } else { 0 };
        self.source = source;
    }

    /// Generation to publish as "ready" (0 if unbound or still buffering)
    pub fn ready_generation(&self) -> u64 {
        match &self.source {
            Some(source) if source.is_ready() => self.generation,
            _ => 0,
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_trim(&mut self, trim: f32) {
        if trim.is_finite() && trim >= 0.0 {
            self.trim = trim;
        }
    }

    pub fn gain(&self) -> &GainAutomation {
        &self.gain
    }

    pub fn gain_mut(&mut self) -> &mut GainAutomation {
        &mut self.gain
    }

    /// Pull `len` frames from the source into the deck buffer
    fn pull(&mut self, len: usize) {
        self.buffer.set_len_from_capacity(len);
        let out = self.buffer.as_mut_slice();

        let written = match &mut self.source {
            Some(source) if self.playing && source.is_ready() => source.render(out).min(len),
            _ => 0,
        };
        out[written..].fill(StereoSample::silence());
    }

    /// Render `out.len()` frames and add them, scaled by trim × automated
    /// gain, onto `out`. `start_frame` is the clock position of `out[0]`.
    pub fn mix_into(&mut self, out: &mut [StereoSample], start_frame: u64) {
        self.pull(out.len());
        if !self.playing {
            return;
        }
        for (i, (dst, src)) in out.iter_mut().zip(self.buffer.iter()).enumerate() {
            let g = self.trim * self.gain.value_at(start_frame + i as u64);
            *dst += *src * g;
        }
    }
}
