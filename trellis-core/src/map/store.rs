//! ReactiveMap Implementation
//!
//! The in-memory backing store behind [`ViewableMap`].
//!
//! # Delivery
//!
//! A mutation changes the store and appends its event to a per-map queue in
//! one step, under the `entries` lock, so the queue order is the mutation
//! order. Events are then delivered from the queue, in FIFO order, by
//! whichever caller holds the `delivery` lock:
//!
//! - A top-level caller waits for the `delivery` lock and drains the queue
//!   before returning, so its own events have reached every handler.
//!
//! - A caller running inside a handler (of any map, on this thread) only
//!   tries the lock. If another delivery of this map is in progress, the
//!   event stays queued and that delivery picks it up after the current
//!   event has reached every handler.
//!
//! Nested callers never wait on a `delivery` lock, which keeps maps that
//! feed each other (see [`crate::wire`]) free of lock-order cycles.
//!
//! The `entries` lock is never held while handlers run, so handlers can read
//! the map freely. The store may already be ahead of the event being
//! delivered.
//!
//! Entries keep insertion order.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::lifetime::Lifetime;
use crate::reactive::Subscribers;

use super::config::MapConfig;
use super::event::MapEvent;
use super::table::LifetimeTable;
use super::viewable::ViewableMap;
use super::{MapKey, MapValue};

type MapHandler<K, V> = dyn for<'a> Fn(MapEvent<'a, K, V>) + Send + Sync;

thread_local! {
    /// Map deliveries in progress on this thread, across all maps.
    static DELIVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as delivering map events until dropped.
struct DeliveryScope;

impl DeliveryScope {
    fn enter() -> Self {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DeliveryScope
    }

    fn active() -> bool {
        DELIVERY_DEPTH.with(|depth| depth.get() > 0)
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// An owned event waiting in the delivery queue.
enum QueuedEvent<K, V> {
    Add { key: K, new_value: V },
    Update { key: K, old_value: V, new_value: V },
    Remove { key: K, old_value: V },
}

impl<K, V> QueuedEvent<K, V> {
    fn as_event(&self) -> MapEvent<'_, K, V> {
        match self {
            QueuedEvent::Add { key, new_value } => MapEvent::Add { key, new_value },
            QueuedEvent::Update {
                key,
                old_value,
                new_value,
            } => MapEvent::Update {
                key,
                old_value,
                new_value,
            },
            QueuedEvent::Remove { key, old_value } => MapEvent::Remove { key, old_value },
        }
    }
}

/// An insertion-ordered observable map.
///
/// # Example
///
/// ```rust
/// use trellis_core::lifetime::Lifetime;
/// use trellis_core::map::{ReactiveMap, ViewableMap};
///
/// let map = ReactiveMap::new();
/// let lifetime = Lifetime::new();
///
/// map.view(&lifetime, |entry, key: &String, value: &i32| {
///     println!("{key} = {value}");
///     let key = key.clone();
///     entry.on_termination(move || println!("{key} removed"));
/// });
///
/// map.set("a".to_string(), 1); // prints "a = 1"
/// map.remove(&"a".to_string()); // prints "a removed"
/// ```
pub struct ReactiveMap<K, V>
where
    K: MapKey,
    V: MapValue,
{
    entries: Mutex<IndexMap<K, V>>,
    pending: Mutex<VecDeque<QueuedEvent<K, V>>>,
    delivery: Mutex<()>,
    subscribers: Subscribers<MapHandler<K, V>>,
    table: LifetimeTable<K>,
    config: MapConfig,
}

impl<K, V> ReactiveMap<K, V>
where
    K: MapKey,
    V: MapValue,
{
    /// Create an empty map with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    pub fn with_config(config: MapConfig) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            pending: Mutex::new(VecDeque::new()),
            delivery: Mutex::new(()),
            subscribers: Subscribers::new(),
            table: LifetimeTable::new(),
            config,
        }
    }

    pub fn config(&self) -> MapConfig {
        self.config
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Cloned entries in insertion order.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drain the queue, or leave it to the delivery already in progress
    /// when called from inside a handler.
    fn deliver(&self) {
        let nested = DeliveryScope::active();
        loop {
            let delivery = if nested {
                match self.delivery.try_lock() {
                    Some(guard) => guard,
                    None => return,
                }
            } else {
                self.delivery.lock()
            };

            let scope = DeliveryScope::enter();
            loop {
                let next = self.pending.lock().pop_front();
                let Some(event) = next else {
                    break;
                };
                self.fire(event.as_event());
            }
            drop(scope);
            drop(delivery);

            // An event queued by a nested caller after the last pop above
            // would otherwise be stranded.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    /// Deliver one event to every live handler.
    fn fire(&self, event: MapEvent<'_, K, V>) {
        tracing::trace!(%event, "map event");
        for (lifetime, handler) in self.subscribers.snapshot() {
            if lifetime.is_alive() {
                handler(event);
            }
        }
    }
}

impl<K, V> ViewableMap<K, V> for ReactiveMap<K, V>
where
    K: MapKey,
    V: MapValue,
{
    fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: for<'a> Fn(MapEvent<'a, K, V>) + Send + Sync + 'static,
    {
        let handler: Arc<MapHandler<K, V>> = Arc::new(handler);
        self.subscribers.add(lifetime, handler);
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: K, value: V) -> Option<V> {
        let previous = {
            let mut entries = self.entries.lock();
            let previous = entries.insert(key.clone(), value.clone());
            let event = match &previous {
                None => Some(QueuedEvent::Add {
                    key,
                    new_value: value,
                }),
                Some(old) if self.config.notify_on_equal || *old != value => {
                    Some(QueuedEvent::Update {
                        key,
                        old_value: old.clone(),
                        new_value: value,
                    })
                }
                Some(_) => None,
            };
            if let Some(event) = event {
                self.pending.lock().push_back(event);
            }
            previous
        };
        self.deliver();
        previous
    }

    fn remove(&self, key: &K) -> Option<V> {
        let removed = {
            let mut entries = self.entries.lock();
            let (key, old_value) = entries.shift_remove_entry(key)?;
            self.pending.lock().push_back(QueuedEvent::Remove {
                key,
                old_value: old_value.clone(),
            });
            old_value
        };
        self.deliver();
        Some(removed)
    }

    fn clear(&self) {
        {
            let mut entries = self.entries.lock();
            let mut pending = self.pending.lock();
            while let Some((key, old_value)) = entries.pop() {
                pending.push_back(QueuedEvent::Remove { key, old_value });
            }
        }
        self.deliver();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn view_table(&self) -> &LifetimeTable<K> {
        &self.table
    }
}

impl<K, V> Default for ReactiveMap<K, V>
where
    K: MapKey,
    V: MapValue,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ReactiveMap<K, V>
where
    K: MapKey,
    V: MapValue,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveMap")
            .field("entries", &*self.entries.lock())
            .field("subscriber_count", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
