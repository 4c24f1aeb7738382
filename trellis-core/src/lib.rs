//! Trellis Core
//!
//! This crate provides the reactive synchronization core used to mirror a
//! mutable mapping (such as a model's property tree) between two processes.
//! It implements:
//!
//! - Revocable, nestable lifetimes with exactly-once cleanup
//! - Lifetime-scoped subscriptions and signals
//! - Observable maps with Add / Update / Remove notifications
//! - Per-entry child lifetimes through `view`
//! - A MessagePack delta boundary for the wire layer
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `lifetime`: Lifetimes and their termination tree
//! - `reactive`: Subscriber registry and signals
//! - `map`: The observable map contract and its in-memory store
//! - `wire`: Conversion between map events and encoded deltas
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use trellis_core::lifetime::Lifetime;
//! use trellis_core::map::{ReactiveMap, ViewableMap};
//!
//! let map: ReactiveMap<&str, i32> = ReactiveMap::new();
//! let lifetime = Lifetime::new();
//! let live = Arc::new(AtomicUsize::new(0));
//!
//! // Count entries that are currently present.
//! let counter = live.clone();
//! map.view(&lifetime, move |entry, _key, _value| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     let counter = counter.clone();
//!     entry.on_termination(move || {
//!         counter.fetch_sub(1, Ordering::SeqCst);
//!     });
//! });
//!
//! map.set("a", 1);
//! map.set("b", 2);
//! map.remove(&"a");
//! assert_eq!(live.load(Ordering::SeqCst), 1);
//!
//! // Terminating the subscription releases every per-entry lifetime.
//! lifetime.terminate();
//! assert_eq!(live.load(Ordering::SeqCst), 0);
//! ```

pub mod error;
pub mod lifetime;
pub mod map;
pub mod reactive;
pub mod wire;

pub use error::{ConsistencyError, LifetimeError, WireError};
pub use lifetime::{Lifetime, LifetimeGuard};
pub use map::{AddRemove, MapConfig, MapEvent, ReactiveMap, ViewableMap};
pub use reactive::Signal;
