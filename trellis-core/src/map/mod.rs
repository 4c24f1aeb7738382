//! Observable Maps
//!
//! A viewable map is a keyed container whose every mutation is broadcast as
//! a [`MapEvent`] to subscribers registered under a [`Lifetime`].
//!
//! # Subscription modes
//!
//! - `advise`: raw Add / Update / Remove events.
//! - `advise_add_remove`: Add / Remove only; an Update arrives as a Remove of
//!   the old value followed by an Add of the new one.
//! - `view`: each entry gets its own child lifetime, terminated exactly once
//!   when the entry leaves the map. Resources attached to that child are
//!   released with it.
//!
//! # Entry state machine
//!
//! A key is either absent or present. `set` moves it to present (Add) or
//! keeps it present (Update); `remove` and `clear` move it back to absent
//! (Remove). No other transitions exist, and `view` treats any other
//! sequence as a fatal bookkeeping error.
//!
//! [`Lifetime`]: crate::lifetime::Lifetime

mod config;
mod event;
mod store;
mod table;
mod viewable;

use std::fmt::Debug;
use std::hash::Hash;

pub use config::MapConfig;
pub use event::{AddRemove, MapEvent};
pub use store::ReactiveMap;
pub use table::LifetimeTable;
pub use viewable::ViewableMap;

/// Capabilities a map key must have.
pub trait MapKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> MapKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Capabilities a map value must have.
pub trait MapValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> MapValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
