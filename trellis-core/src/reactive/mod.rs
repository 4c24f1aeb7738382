//! Reactive Primitives
//!
//! This module holds the delivery machinery shared by every observable
//! source in Trellis.
//!
//! # Concepts
//!
//! ## Subscribers
//!
//! A subscriber is a handler registered under a [`Lifetime`]. The
//! registration lives exactly as long as the lifetime: terminating it
//! removes the handler, and registering under a dead lifetime is a no-op.
//!
//! ## Signals
//!
//! A Signal broadcasts values to its subscribers. Delivery is synchronous:
//! `fire` does not return until every live handler has seen the value.
//! Signals carry raw payloads between the wire layer and the maps.
//!
//! [`Lifetime`]: crate::lifetime::Lifetime

mod signal;
mod subscriber;

pub use signal::Signal;
pub use subscriber::{Snapshot, SubscriberId, Subscribers};
