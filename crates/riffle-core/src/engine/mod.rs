//! Playback engine: control side, render side and the plumbing between them
//!
//! ```text
//!   EngineController ──EngineCommand (rtrb)──▶ AudioEngine (render thread)
//!          ▲                                          │
//!          └──────────── EngineAtomics ◀──────────────┘
//! ```

mod atomics;
mod command;
mod controller;
mod deck;
mod engine;
pub mod gc;

pub use atomics::{ContextState, EngineAtomics};
pub use command::{command_channel, CommandSender, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use controller::{EngineController, TransitionError, TransitionState};
pub use deck::{BufferSource, Deck, DeckSource};
pub use engine::{AudioEngine, MAX_BUFFER_SIZE};
