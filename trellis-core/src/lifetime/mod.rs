//! Lifetimes
//!
//! A lifetime is the unit of resource ownership in Trellis. Every
//! subscription is registered under a lifetime and every observed map entry
//! gets a nested lifetime of its own. Terminating a lifetime releases
//! everything attached to it, exactly once.
//!
//! # Concepts
//!
//! ## Termination
//!
//! Cleanup actions run in reverse registration order (LIFO), like
//! destructors of values declared in sequence. Attaching an action to an
//! already terminated lifetime runs it on the spot, so an action is never
//! silently lost.
//!
//! ## Nesting
//!
//! `create_nested` builds a tree. Terminating a node terminates its whole
//! subtree; terminating a leaf early detaches it from its parent.

mod definition;

pub use definition::{Lifetime, LifetimeGuard, LifetimeId};
