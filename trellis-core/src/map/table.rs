//! Per-subscription child lifetimes for `view`.
//!
//! Each `view` call opens a `ViewKey` slot holding one child lifetime per
//! key currently observed through that subscription. The slot is purged when
//! the subscriber lifetime terminates; the child lifetimes themselves are
//! nested in the subscriber lifetime and die with it.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::error::ConsistencyError;
use crate::lifetime::{Lifetime, LifetimeId};

/// Identifies one `view` subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ViewKey {
    lifetime: LifetimeId,
    view: u64,
}

/// Side table mapping (subscriber lifetime, view) to key → child lifetime.
///
/// Map implementors own one and hand it out through
/// [`ViewableMap::view_table`](super::ViewableMap::view_table); only `view`
/// writes to it. Cloning shares the table.
///
/// ```compile_fail
/// use trellis_core::lifetime::Lifetime;
/// use trellis_core::map::LifetimeTable;
///
/// let table: LifetimeTable<u32> = LifetimeTable::new();
/// table.open(&Lifetime::new());
/// ```
pub struct LifetimeTable<K> {
    slots: Arc<DashMap<ViewKey, IndexMap<K, Lifetime>>>,
    next_view: Arc<AtomicU64>,
}

impl<K> LifetimeTable<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_view: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a slot for a new view under `owner`.
    ///
    /// The slot is dropped when `owner` terminates.
    pub(crate) fn open(&self, owner: &Lifetime) -> ViewKey {
        let view_key = ViewKey {
            lifetime: owner.id(),
            view: self.next_view.fetch_add(1, Ordering::Relaxed),
        };
        self.slots.insert(view_key, IndexMap::new());

        let slots = Arc::downgrade(&self.slots);
        owner.on_termination(move || {
            if let Some(slots) = slots.upgrade() {
                slots.remove(&view_key);
            }
        });
        view_key
    }

    /// Create and record a child lifetime of `owner` for `key`.
    ///
    /// Returns `Ok(None)` when the slot is already gone (the owner died
    /// while the event was in flight).
    pub(crate) fn track(
        &self,
        view_key: ViewKey,
        owner: &Lifetime,
        key: &K,
    ) -> Result<Option<Lifetime>, ConsistencyError> {
        let Some(mut slot) = self.slots.get_mut(&view_key) else {
            return Ok(None);
        };
        if slot.contains_key(key) {
            return Err(ConsistencyError::DuplicateKey {
                lifetime: view_key.lifetime,
                key: format!("{key:?}"),
            });
        }
        let child = owner.create_nested();
        slot.insert(key.clone(), child.clone());
        Ok(Some(child))
    }

    /// Remove and return the child lifetime recorded for `key`.
    ///
    /// The caller terminates it after the table lock is released.
    pub(crate) fn untrack(&self, view_key: ViewKey, key: &K) -> Result<Option<Lifetime>, ConsistencyError> {
        let Some(mut slot) = self.slots.get_mut(&view_key) else {
            return Ok(None);
        };
        match slot.shift_remove(key) {
            Some(child) => Ok(Some(child)),
            None => Err(ConsistencyError::MissingKey {
                lifetime: view_key.lifetime,
                key: format!("{key:?}"),
            }),
        }
    }

    /// Number of keys tracked by one view, if its slot is open.
    #[cfg(test)]
    pub(crate) fn tracked(&self, view_key: ViewKey) -> Option<usize> {
        self.slots.get(&view_key).map(|slot| slot.len())
    }

    /// Number of open view slots.
    pub fn open_views(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for LifetimeTable<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for LifetimeTable<K> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            next_view: Arc::clone(&self.next_view),
        }
    }
}
