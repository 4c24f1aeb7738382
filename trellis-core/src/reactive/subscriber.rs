//! Subscriber registry shared by signals and maps.
//!
//! Every handler is registered under a [`Lifetime`]. When that lifetime
//! terminates the handler is dropped from the registry, so subscriptions
//! never need to be removed by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::lifetime::Lifetime;

/// Unique identifier for a subscriber.
///
/// Each registered handler gets a unique ID so it can be found again when
/// its lifetime terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber<H: ?Sized> {
    id: SubscriberId,
    lifetime: Lifetime,
    handler: Arc<H>,
}

type SubscriberList<H> = Mutex<Vec<Subscriber<H>>>;

/// Snapshot of live handlers taken before delivery.
pub type Snapshot<H> = SmallVec<[(Lifetime, Arc<H>); 4]>;

/// A list of lifetime-scoped handlers of type `H`.
///
/// `H` is usually an unsized closure type such as `dyn Fn(&T) + Send + Sync`.
/// Delivery works on a snapshot, so handlers may subscribe or terminate
/// lifetimes while an event is being delivered without deadlocking.
pub struct Subscribers<H: ?Sized> {
    list: Arc<SubscriberList<H>>,
}

impl<H> Subscribers<H>
where
    H: ?Sized + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            list: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register `handler` for as long as `lifetime` is alive.
    ///
    /// Returns `None` without registering anything when the lifetime is
    /// already terminated.
    pub fn add(&self, lifetime: &Lifetime, handler: Arc<H>) -> Option<SubscriberId> {
        if !lifetime.is_alive() {
            return None;
        }

        let id = SubscriberId::new();
        self.list.lock().push(Subscriber {
            id,
            lifetime: lifetime.clone(),
            handler,
        });

        // Runs immediately if the lifetime died since the check above.
        let list: Weak<SubscriberList<H>> = Arc::downgrade(&self.list);
        lifetime.on_termination(move || {
            if let Some(list) = list.upgrade() {
                // Dropped after the lock is released.
                let removed = {
                    let mut guard = list.lock();
                    guard
                        .iter()
                        .position(|s| s.id == id)
                        .map(|pos| guard.remove(pos))
                };
                drop(removed);
            }
        });

        tracing::debug!(subscriber = ?id, lifetime = %lifetime.id(), "subscriber registered");
        Some(id)
    }

    /// Handlers whose lifetimes are still alive, in registration order.
    pub fn snapshot(&self) -> Snapshot<H> {
        self.list
            .lock()
            .iter()
            .filter(|s| s.lifetime.is_alive())
            .map(|s| (s.lifetime.clone(), Arc::clone(&s.handler)))
            .collect()
    }

    /// Get the number of subscribers.
    pub fn len(&self) -> usize {
        self.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> Default for Subscribers<H>
where
    H: ?Sized + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> Clone for Subscribers<H> {
    fn clone(&self) -> Self {
        Self {
            list: Arc::clone(&self.list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Handler = dyn Fn(i32) + Send + Sync;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn terminated_lifetime_removes_subscriber() {
        let subscribers: Subscribers<Handler> = Subscribers::new();
        let lifetime = Lifetime::new();

        assert!(subscribers.add(&lifetime, Arc::new(|_: i32| {})).is_some());
        assert_eq!(subscribers.len(), 1);

        lifetime.terminate();
        assert!(subscribers.is_empty());
        assert!(subscribers.snapshot().is_empty());
    }

    #[test]
    fn add_under_dead_lifetime_is_noop() {
        let subscribers: Subscribers<Handler> = Subscribers::new();
        let lifetime = Lifetime::new();
        lifetime.terminate();

        assert!(subscribers.add(&lifetime, Arc::new(|_: i32| {})).is_none());
        assert!(subscribers.is_empty());
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        use std::sync::atomic::AtomicI32;

        let subscribers: Subscribers<Handler> = Subscribers::new();
        let lifetime = Lifetime::new();
        let last = Arc::new(AtomicI32::new(0));

        for n in 1..=3 {
            let last = last.clone();
            subscribers.add(
                &lifetime,
                Arc::new(move |_: i32| {
                    assert_eq!(last.swap(n, Ordering::SeqCst), n - 1);
                }),
            );
        }

        for (_, handler) in subscribers.snapshot() {
            handler(0);
        }
        assert_eq!(last.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn only_matching_lifetime_is_removed() {
        let subscribers: Subscribers<Handler> = Subscribers::new();
        let short = Lifetime::new();
        let long = Lifetime::new();

        subscribers.add(&short, Arc::new(|_: i32| {}));
        subscribers.add(&long, Arc::new(|_: i32| {}));

        short.terminate();
        let snapshot = subscribers.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, long);
    }
}
