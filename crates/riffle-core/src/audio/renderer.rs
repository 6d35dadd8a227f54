//! Interleaved output adapter for the render graph

use crate::engine::{AudioEngine, MAX_BUFFER_SIZE};
use crate::types::StereoBuffer;

/// Owns the render graph on the output thread
///
/// Renders into a pre-allocated stereo buffer and spreads it over device
/// frames: channel 0 gets left, channel 1 right, any further channels
/// silence. A mono device gets the left/right average.
pub struct OutputRenderer {
    engine: AudioEngine,
    buffer: StereoBuffer,
}

impl OutputRenderer {
    pub fn new(engine: AudioEngine) -> Self {
        Self {
            engine,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    /// Fill an interleaved device buffer with `channels` channels per frame
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            data.fill(0.0);
            return;
        }

        // Device buffers may exceed the pre-allocated block; render in pieces
        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            self.buffer.set_len_from_capacity(n_frames);
            self.engine.process(&mut self.buffer);

            for (frame, sample) in chunk.chunks_mut(channels).zip(self.buffer.iter()) {
                if channels == 1 {
                    frame[0] = (sample.left + sample.right) * 0.5;
                    continue;
                }
                frame[0] = sample.left;
                frame[1] = sample.right;
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
            // Trailing partial frame
            let whole = n_frames * channels;
            chunk[whole..].fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{BufferSource, DeckSource, EngineController};
    use crate::profiles::MemoryStorage;
    use crate::types::{DeckId, StereoSample};

    fn renderer_with_tone(left: f32, right: f32) -> (EngineController, OutputRenderer) {
        let config = EngineConfig {
            sample_rate: 8000,
            start_suspended: false,
            ..Default::default()
        };
        let mut ctl = EngineController::new(config, Box::new(MemoryStorage::new()));
        let source: Box<dyn DeckSource> =
            Box::new(BufferSource::new(vec![StereoSample::new(left, right); 40_000]));
        let engine = ctl.initialize(Some(source), None).unwrap();
        ctl.set_deck_playing(DeckId::A, true).unwrap();
        (ctl, OutputRenderer::new(engine))
    }

    #[test]
    fn test_stereo_interleave() {
        let (_ctl, mut out) = renderer_with_tone(0.25, -0.5);
        let mut data = vec![1.0f32; 64];
        out.render_interleaved(&mut data, 2);
        assert!((data[0] - 0.25).abs() < 1e-4);
        assert!((data[1] + 0.5).abs() < 1e-4);
        assert_eq!(out.engine().clock(), 32);
    }

    #[test]
    fn test_extra_channels_are_silent() {
        let (_ctl, mut out) = renderer_with_tone(0.25, 0.25);
        let mut data = vec![1.0f32; 4 * 16];
        out.render_interleaved(&mut data, 4);
        for frame in data.chunks(4) {
            assert!((frame[0] - 0.25).abs() < 1e-4);
            assert_eq!(frame[2], 0.0);
            assert_eq!(frame[3], 0.0);
        }
    }

    #[test]
    fn test_mono_device_gets_average() {
        let (_ctl, mut out) = renderer_with_tone(0.4, 0.2);
        let mut data = vec![0.0f32; 16];
        out.render_interleaved(&mut data, 1);
        assert!((data[15] - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_large_device_buffer() {
        let (_ctl, mut out) = renderer_with_tone(0.1, 0.1);
        let frames = MAX_BUFFER_SIZE + 100;
        let mut data = vec![0.0f32; frames * 2];
        out.render_interleaved(&mut data, 2);
        assert_eq!(out.engine().clock(), frames as u64);
        assert!((data[data.len() - 1] - 0.1).abs() < 1e-4);
    }
}
