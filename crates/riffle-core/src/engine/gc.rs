//! Deferred reclamation of deck sources
//!
//! A deck source can own a whole decoded track. Freeing that on the render
//! thread when a deck is rebound would stall the audio callback, so sources
//! are sent across as `basedrop::Owned` and dropping one only enqueues it.
//! A background thread owns the `Collector` and frees queued values.
//!
//! ```ignore
//! use basedrop::Owned;
//! use riffle_core::engine::gc::gc_handle;
//!
//! let source: Box<dyn DeckSource> = Box::new(BufferSource::new(samples));
//! let owned = Owned::new(&gc_handle(), source);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Collection interval of the background thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("riffle-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created on the thread that runs it
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("gc: collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn riffle-gc thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for allocating `Owned`/`Shared` values that are freed off the render thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
