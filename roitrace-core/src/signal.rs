//! Synchronous observer lists.
//!
//! [`Signal`] is the change-notification primitive used by mutable masks
//! and by [`crate::maskset::MaskSet`]. Dispatch is synchronous, on the
//! caller's thread, in registration order, and iterates over a snapshot of
//! the subscriber list so that a callback may subscribe or unsubscribe
//! re-entrantly without invalidating the running emission.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered list of callback slots fired synchronously.
pub struct Signal<T: ?Sized = ()> {
    slots: Mutex<Vec<(u64, Slot<T>)>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Signal<T> {
    /// Creates an empty signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Appends a callback slot; slots fire in registration order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, Arc::new(callback)));
        SubscriberId(id)
    }

    /// Removes a slot; returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id.0);
        slots.len() != before
    }

    /// Fires every registered slot with `arg`, in registration order.
    ///
    /// The slot list is snapshotted first, so callbacks may mutate the
    /// subscriber list; such mutations take effect from the next emission.
    pub fn emit(&self, arg: &T) {
        let snapshot: Vec<Slot<T>> = self.lock().iter().map(|(_, f)| Arc::clone(f)).collect();
        for slot in snapshot {
            slot(arg);
        }
    }

    /// Number of registered slots.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Slot<T>)>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_registration_order() {
        let signal = Signal::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        signal.subscribe(move |v: &u32| l.lock().unwrap().push(("first", *v)));
        let l = Arc::clone(&log);
        signal.subscribe(move |v: &u32| l.lock().unwrap().push(("second", *v)));

        signal.emit(&7);
        assert_eq!(*log.lock().unwrap(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let signal = Signal::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = signal.subscribe(move |(): &()| *c.lock().unwrap() += 1);

        signal.emit(&());
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.emit(&());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_reentrant_subscribe_does_not_fire_mid_emission() {
        let signal = Arc::new(Signal::new());
        let count = Arc::new(Mutex::new(0));

        let s = Arc::clone(&signal);
        let c = Arc::clone(&count);
        signal.subscribe(move |(): &()| {
            let c2 = Arc::clone(&c);
            s.subscribe(move |(): &()| *c2.lock().unwrap() += 1);
        });

        signal.emit(&());
        assert_eq!(*count.lock().unwrap(), 0);
        assert_eq!(signal.subscriber_count(), 2);

        signal.emit(&());
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
