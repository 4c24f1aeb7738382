//! Map change notifications.
//!
//! A [`MapEvent`] borrows its key and values from the mutation that produced
//! it. Handlers receive it by value for the duration of one call and cannot
//! keep it: the borrow ends when the handler returns.

use std::fmt;

/// An addition, update or removal of one map entry.
pub enum MapEvent<'a, K, V> {
    /// The key was absent and now maps to `new_value`.
    Add { key: &'a K, new_value: &'a V },

    /// The key was present and its value changed.
    Update {
        key: &'a K,
        old_value: &'a V,
        new_value: &'a V,
    },

    /// The key was present and has been removed.
    Remove { key: &'a K, old_value: &'a V },
}

impl<'a, K, V> MapEvent<'a, K, V> {
    pub fn key(&self) -> &'a K {
        match *self {
            MapEvent::Add { key, .. } => key,
            MapEvent::Update { key, .. } => key,
            MapEvent::Remove { key, .. } => key,
        }
    }

    /// The value the key held before the change. `None` for Add.
    pub fn old_value(&self) -> Option<&'a V> {
        match *self {
            MapEvent::Add { .. } => None,
            MapEvent::Update { old_value, .. } => Some(old_value),
            MapEvent::Remove { old_value, .. } => Some(old_value),
        }
    }

    /// The value the key holds after the change. `None` for Remove.
    pub fn new_value(&self) -> Option<&'a V> {
        match *self {
            MapEvent::Add { new_value, .. } => Some(new_value),
            MapEvent::Update { new_value, .. } => Some(new_value),
            MapEvent::Remove { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MapEvent::Add { .. } => "Add",
            MapEvent::Update { .. } => "Update",
            MapEvent::Remove { .. } => "Remove",
        }
    }
}

// Manual impls: the event only holds references, so K and V need not be Copy.
impl<K, V> Clone for MapEvent<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for MapEvent<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapEvent<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEvent::Add { key, new_value } => f
                .debug_struct("Add")
                .field("key", key)
                .field("new_value", new_value)
                .finish(),
            MapEvent::Update {
                key,
                old_value,
                new_value,
            } => f
                .debug_struct("Update")
                .field("key", key)
                .field("old_value", old_value)
                .field("new_value", new_value)
                .finish(),
            MapEvent::Remove { key, old_value } => f
                .debug_struct("Remove")
                .field("key", key)
                .field("old_value", old_value)
                .finish(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Display for MapEvent<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEvent::Add { key, new_value } => write!(f, "Add {key:?}:{new_value:?}"),
            MapEvent::Update {
                key,
                old_value,
                new_value,
            } => write!(f, "Update {key:?}:{old_value:?}->{new_value:?}"),
            MapEvent::Remove { key, old_value } => write!(f, "Remove {key:?}:{old_value:?}"),
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for MapEvent<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.kind_name() == other.kind_name()
            && self.key() == other.key()
            && self.old_value() == other.old_value()
            && self.new_value() == other.new_value()
    }
}

/// The two-valued notification used by `advise_add_remove` and `view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddRemove {
    Add,
    Remove,
}

impl fmt::Display for AddRemove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddRemove::Add => f.write_str("ADD"),
            AddRemove::Remove => f.write_str("REMOVE"),
        }
    }
}
