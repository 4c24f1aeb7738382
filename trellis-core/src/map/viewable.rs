//! The observable map contract.
//!
//! Implementors provide storage, `advise` and the side table; the derived
//! subscriptions `advise_add_remove`, `view` and `view_pairs` are built here
//! on top of `advise`.

use crate::error::ConsistencyError;
use crate::lifetime::Lifetime;

use super::event::{AddRemove, MapEvent};
use super::table::LifetimeTable;
use super::{MapKey, MapValue};

/// A keyed container whose mutations are broadcast to lifetime-scoped
/// subscribers.
///
/// Events are delivered synchronously: `set`, `remove` and `clear` return
/// only after every live handler has observed the change. A mutation made
/// from inside a handler is the exception: its events are delivered once
/// the event in progress has reached every handler, so each subscriber
/// still sees an entry's events in order.
pub trait ViewableMap<K: MapKey, V: MapValue>: Send + Sync {
    /// Register `handler` for every later mutation while `lifetime` is alive.
    ///
    /// Existing contents are not replayed. Advising under a terminated
    /// lifetime does nothing.
    fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: for<'a> Fn(MapEvent<'a, K, V>) + Send + Sync + 'static;

    fn get(&self, key: &K) -> Option<V>;

    /// Insert or replace. Returns the previous value, if any.
    fn set(&self, key: K, value: V) -> Option<V>;

    /// Remove `key`. Removing an absent key returns `None` and emits nothing.
    fn remove(&self, key: &K) -> Option<V>;

    /// Remove every entry, emitting one Remove per entry.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child lifetimes created by `view` subscriptions on this map.
    fn view_table(&self) -> &LifetimeTable<K>;

    /// Subscribe to additions and removals only.
    ///
    /// An Update is reported as a Remove of the old value followed by an
    /// Add of the new one.
    fn advise_add_remove<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(AddRemove, &K, &V) + Send + Sync + 'static,
    {
        self.advise(lifetime, move |event| match event {
            MapEvent::Add { key, new_value } => handler(AddRemove::Add, key, new_value),
            MapEvent::Update {
                key,
                old_value,
                new_value,
            } => {
                handler(AddRemove::Remove, key, old_value);
                handler(AddRemove::Add, key, new_value);
            }
            MapEvent::Remove { key, old_value } => handler(AddRemove::Remove, key, old_value),
        });
    }

    /// Bind each observed entry to its own child lifetime.
    ///
    /// On every Add the handler receives a fresh child of `lifetime`; that
    /// child is terminated when the entry is removed (or replaced), or when
    /// `lifetime` itself terminates.
    ///
    /// # Panics
    ///
    /// Panics if the map reports two Adds for a key without a Remove in
    /// between, or a Remove for a key that was never added.
    fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, &K, &V) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }

        let table = self.view_table().clone();
        let view_key = table.open(lifetime);
        let owner = lifetime.clone();

        self.advise_add_remove(lifetime, move |kind, key, value| match kind {
            AddRemove::Add => match table.track(view_key, &owner, key) {
                Ok(Some(child)) => {
                    tracing::debug!(view = ?view_key, child = %child.id(), "view entry added");
                    handler(&child, key, value);
                }
                Ok(None) => {}
                Err(err) => fail(err),
            },
            AddRemove::Remove => match table.untrack(view_key, key) {
                Ok(Some(child)) => child.terminate(),
                Ok(None) => {}
                Err(err) => fail(err),
            },
        });
    }

    /// `view` with the entry passed as a `(key, value)` pair.
    fn view_pairs<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, (&K, &V)) + Send + Sync + 'static,
    {
        self.view(lifetime, move |child, key, value| handler(child, (key, value)));
    }
}

fn fail(err: ConsistencyError) -> ! {
    tracing::error!(%err, "viewable map bookkeeping is inconsistent");
    panic!("{err}");
}
