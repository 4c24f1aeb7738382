//! Error types.
//!
//! Most operations in this crate cannot fail: removing an absent key,
//! clearing an empty map or subscribing under a dead lifetime are all
//! defined no-ops. The types here cover the few places where a caller can
//! be told "no", plus the fatal bookkeeping violations that are reported
//! through a panic.

use thiserror::Error;

use crate::lifetime::LifetimeId;

/// Errors raised by [`Lifetime`](crate::lifetime::Lifetime) registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifetimeError {
    /// The lifetime has already started (or finished) terminating.
    #[error("lifetime {0} is already terminated")]
    Terminated(LifetimeId),
}

/// A contradiction between delivered map events and the per-key
/// Add/Remove state machine.
///
/// These are never returned to callers. They are built at the point of
/// detection, logged, and turned into a panic, since continuing would leave
/// every subscriber of the map with corrupted bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// An Add arrived for a key that already owns a child lifetime.
    #[error("child lifetime already exists in viewable map under lifetime {lifetime} by key: {key}")]
    DuplicateKey { lifetime: LifetimeId, key: String },

    /// A Remove arrived for a key that has no child lifetime.
    #[error("attempting to remove non-existing lifetime in viewable map under lifetime {lifetime} by key: {key}")]
    MissingKey { lifetime: LifetimeId, key: String },
}

/// Errors from the MessagePack delta codec.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode map delta: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode map delta: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
