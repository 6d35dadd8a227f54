//! Change notifications for UI layers
//!
//! Listeners take no payload: a notification means "something changed, read
//! the state you display again". Delivery is synchronous on the thread that
//! triggered the change.
//!
//! A listener may subscribe, unsubscribe or trigger another notification
//! while being called. Nested notifications are coalesced into one extra
//! round after the current round finishes, instead of recursing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Redelivery rounds allowed for one top-level `notify` call
const MAX_ROUNDS: usize = 4;

struct Inner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    delivering: AtomicBool,
    pending: AtomicBool,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: u64) {
        self.listeners().retain(|(lid, _)| *lid != id);
    }
}

/// Clears the delivery flags when a `notify` call ends, even by unwinding
struct DeliveryGuard<'a>(&'a Inner);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.pending.store(false, Ordering::Release);
        self.0.delivering.store(false, Ordering::Release);
    }
}

/// Publish/subscribe hub
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                delivering: AtomicBool::new(false),
                pending: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Call every listener
    pub fn notify(&self) {
        if self.inner.delivering.swap(true, Ordering::AcqRel) {
            // Already inside a delivery on this hub: fold into one more round
            self.inner.pending.store(true, Ordering::Release);
            return;
        }
        let _guard = DeliveryGuard(&self.inner);

        let mut rounds = 0;
        loop {
            self.inner.pending.store(false, Ordering::Release);

            // Snapshot so listeners can (un)subscribe while being called
            let snapshot: Vec<Listener> = self
                .inner
                .listeners()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            for listener in snapshot {
                listener();
            }

            rounds += 1;
            if !self.inner.pending.load(Ordering::Acquire) {
                break;
            }
            if rounds >= MAX_ROUNDS {
                log::warn!(
                    "notify: listeners kept re-triggering, stopped after {} rounds",
                    rounds
                );
                break;
            }
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_subscribe_and_notify() {
        let notifier = ChangeNotifier::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        let _sa = notifier.subscribe(fa);
        let _sb = notifier.subscribe(fb);

        notifier.notify();
        notifier.notify();
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_and_drop() {
        let notifier = ChangeNotifier::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        let sa = notifier.subscribe(fa);
        {
            let _sb = notifier.subscribe(fb);
            assert_eq!(notifier.listener_count(), 2);
        }
        assert_eq!(notifier.listener_count(), 1);

        sa.unsubscribe();
        notifier.notify();
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_reentrant_notify_is_coalesced() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let n = notifier.clone();
        let c = Arc::clone(&calls);
        let _s = notifier.subscribe(move || {
            // First delivery triggers two nested notifications
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                n.notify();
                n.notify();
            }
        });

        notifier.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_runaway_listener_is_bounded() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let n = notifier.clone();
        let c = Arc::clone(&calls);
        let _s = notifier.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
            n.notify();
        });

        notifier.notify();
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ROUNDS);

        // The hub is usable again afterwards
        notifier.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 2 * MAX_ROUNDS);
    }

    #[test]
    fn test_panicking_listener_does_not_wedge_the_hub() {
        let notifier = ChangeNotifier::new();
        let (count, fc) = counter();
        let _ok = notifier.subscribe(fc);
        let bad = notifier.subscribe(|| panic!("listener failed"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| notifier.notify()));
        assert!(result.is_err());

        bad.unsubscribe();
        notifier.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_during_delivery() {
        let notifier = ChangeNotifier::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let s = Arc::clone(&slot);
        let sub = notifier.subscribe(move || {
            s.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        notifier.notify();
        assert_eq!(notifier.listener_count(), 0);
    }
}
