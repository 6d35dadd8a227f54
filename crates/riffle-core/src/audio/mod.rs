//! Audio output
//!
//! The render graph is device agnostic: anything that can call
//! [`AudioEngine::process`](crate::engine::AudioEngine::process) with a
//! buffer drives it. [`OutputRenderer`] adapts the graph to interleaved
//! device buffers with any channel count; the optional CPAL backend
//! (`cpal-backend` feature) opens a real output stream around it.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ EngineController │───push()───────────►│   Command Queue     │
//! │  (control thread)│                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  EngineAtomics   │◄────────────────────│  Output callback    │
//! │   (lock-free)    │                     │ (owns AudioEngine)  │
//! └──────────────────┘                     └─────────────────────┘
//! ```

mod error;
mod renderer;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

pub use error::{AudioError, AudioResult};
pub use renderer::OutputRenderer;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{output_device_names, start_output, OutputHandle, OutputOptions};
