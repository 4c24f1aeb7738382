//! Signal Implementation
//!
//! A Signal is the simplest reactive source: it holds no value, it only
//! broadcasts the values fired into it to every handler registered under a
//! live lifetime.
//!
//! # How Signals Work
//!
//! 1. `advise(lifetime, handler)` registers a handler for as long as the
//!    lifetime is alive.
//!
//! 2. `fire(&value)` delivers the value to every live handler, synchronously
//!    and in registration order, before returning.
//!
//! 3. When a lifetime terminates, its handlers are dropped.
//!
//! # Thread Safety
//!
//! Signals are designed to be thread-safe. Handlers are stored behind a
//! `parking_lot::Mutex` that is released before any handler runs, so a
//! handler may advise or fire again from inside a delivery.

use std::fmt::Debug;
use std::sync::Arc;

use crate::lifetime::Lifetime;

use super::subscriber::Subscribers;

type SignalHandler<T> = dyn Fn(&T) + Send + Sync;

/// A lifetime-scoped broadcast of values of type `T`.
///
/// # Example
///
/// ```rust
/// use trellis_core::lifetime::Lifetime;
/// use trellis_core::reactive::Signal;
///
/// let signal = Signal::new();
/// let lifetime = Lifetime::new();
///
/// signal.advise(&lifetime, |value: &i32| println!("got {value}"));
/// signal.fire(&5); // prints "got 5"
///
/// lifetime.terminate();
/// signal.fire(&6); // nothing
/// ```
pub struct Signal<T>
where
    T: ?Sized + 'static,
{
    subscribers: Subscribers<SignalHandler<T>>,
}

impl<T> Signal<T>
where
    T: ?Sized + 'static,
{
    /// Create a new signal with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Subscribers::new(),
        }
    }

    /// Register a handler for as long as `lifetime` is alive.
    ///
    /// Advising under a terminated lifetime does nothing.
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribers.add(lifetime, Arc::new(handler));
    }

    /// Deliver `value` to every live handler.
    pub fn fire(&self, value: &T) {
        for (lifetime, handler) in self.subscribers.snapshot() {
            // A previous handler may have terminated this one's lifetime.
            if lifetime.is_alive() {
                handler(value);
            }
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for Signal<T>
where
    T: ?Sized + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T>
where
    T: ?Sized + 'static,
{
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: ?Sized + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
