//! Lock-free command queue from the control thread to the render thread
//!
//! The controller never touches render state directly. Each operation is
//! turned into an [`EngineCommand`] and pushed onto an `rtrb` SPSC ring
//! buffer; the render thread drains the queue at the start of every block,
//! so commands take effect on block boundaries and never mid-block.
//!
//! Pushing and popping are wait-free and allocation-free. Replaced deck
//! sources travel as `basedrop::Owned` so their memory is released on the
//! collector thread, not on the render thread.

use basedrop::Owned;

use super::deck::DeckSource;
use crate::eq::StageConfig;
use crate::types::DeckId;

/// Commands sent from the control thread to the render thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Decks
    // ─────────────────────────────────────────────────────────────
    /// Bind (or with `None`, unbind) a deck's source
    ///
    /// `generation` identifies this binding; the render side publishes it
    /// back once the source reports ready.
    BindSource {
        deck: DeckId,
        source: Option<Owned<Box<dyn DeckSource>>>,
        generation: u64,
    },
    /// Start or pause pulling audio from a deck's source
    SetDeckPlaying { deck: DeckId, playing: bool },
    /// Loudness compensation trim (linear)
    SetDeckTrim { deck: DeckId, gain: f32 },

    // ─────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────
    /// Cancel pending automation and ramp `target` 0→1, the other deck 1→0
    Crossfade {
        target: DeckId,
        duration_frames: u64,
        seq: u64,
    },
    /// Cancel pending automation and snap gains to 1 (`active`) / 0 (other)
    AbortCrossfade { active: DeckId, seq: u64 },

    // ─────────────────────────────────────────────────────────────
    // Gain stages and EQ
    // ─────────────────────────────────────────────────────────────
    /// Master volume (0.0 to 1.0), smoothed
    SetMasterVolume { volume: f32 },
    /// Preamp gain (linear), smoothed
    SetPreamp { gain: f32 },
    /// Reconfigure one stage slot of the EQ chain
    ConfigureStage { slot: usize, config: StageConfig },
}

/// Capacity of the command queue
///
/// A full EQ resync is 10 stage commands plus a preamp change. 1024 leaves
/// room for many UI gestures between two render blocks.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Create a new command channel (producer/consumer pair)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Sending half of the command queue, owned by the control thread
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Send a command to the render thread
    ///
    /// Returns the command back if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Free slots in the queue
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_round_trip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::SetMasterVolume { volume: 0.5 }).unwrap();

        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::SetMasterVolume { volume } if volume == 0.5));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_sender_returns_command_when_full() {
        let (tx, _rx) = command_channel();
        let mut sender = CommandSender::new(tx);
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            assert!(sender.send(EngineCommand::SetPreamp { gain: 1.0 }).is_ok());
        }
        assert_eq!(sender.free_slots(), 0);

        let rejected = sender.send(EngineCommand::SetPreamp { gain: 2.0 });
        assert!(matches!(rejected, Err(EngineCommand::SetPreamp { gain }) if gain == 2.0));
    }

    #[test]
    fn test_command_size() {
        // The largest variant is a custom stage (six f64 coefficients plus slot)
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 72, "EngineCommand is {} bytes, expected <= 72", size);
    }
}
