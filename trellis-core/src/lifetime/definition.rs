//! Lifetime Implementation
//!
//! A [`Lifetime`] is a revocable token. Cleanup actions and nested lifetimes
//! are attached to it, and terminating it runs all of them exactly once, in
//! reverse order of registration.
//!
//! # Ownership
//!
//! A parent holds strong handles to its nested lifetimes (as entries in its
//! action list). A nested lifetime only holds a weak reference back to its
//! parent, used to detach itself when it is terminated early. There are no
//! reference cycles between a lifetime and its children.
//!
//! # Thread Safety
//!
//! All state sits behind a single `parking_lot::Mutex`. Registration and
//! the start of termination take the same lock, so an action is either
//! queued before termination begins (and run by it) or observes the
//! terminated state and runs immediately. The lock is never held while an
//! action runs.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::LifetimeError;

/// Process-unique identifier of a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LifetimeId(u64);

impl LifetimeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LifetimeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for LifetimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Alive,
    Terminating,
    Terminated,
}

type ActionId = u64;

enum Action {
    Callback(Box<dyn FnOnce() + Send>),
    Nested(Lifetime),
}

impl Action {
    fn run(self) {
        match self {
            Action::Callback(f) => f(),
            Action::Nested(child) => child.terminate(),
        }
    }
}

struct State {
    status: Status,
    next_action: ActionId,
    /// Pending actions in registration order.
    actions: IndexMap<ActionId, Action>,
    /// Back link used to detach from the parent on early termination.
    parent: Option<(Weak<Inner>, ActionId)>,
}

struct Inner {
    id: LifetimeId,
    state: Mutex<State>,
}

impl Inner {
    /// Queue an action, or hand it back if termination already started.
    fn push(&self, action: Action) -> Result<ActionId, Action> {
        let mut state = self.state.lock();
        if state.status != Status::Alive {
            return Err(action);
        }
        let id = state.next_action;
        state.next_action += 1;
        state.actions.insert(id, action);
        Ok(id)
    }

    fn detach(&self, action: ActionId) {
        // Dropped outside the lock: a nested handle may be the last owner.
        let _removed = self.state.lock().actions.shift_remove(&action);
    }
}

/// A revocable scope bounding how long subscriptions and derived
/// resources stay registered.
///
/// `Lifetime` is a cheap handle; clones share the same underlying scope and
/// compare equal.
///
/// # Example
///
/// ```rust
/// use trellis_core::lifetime::Lifetime;
///
/// let root = Lifetime::new();
/// let child = root.create_nested();
/// child.on_termination(|| println!("released"));
///
/// root.terminate();
/// assert!(!child.is_alive());
/// ```
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<Inner>,
}

impl Lifetime {
    /// Create a new root lifetime.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: LifetimeId::next(),
                state: Mutex::new(State {
                    status: Status::Alive,
                    next_action: 0,
                    actions: IndexMap::new(),
                    parent: None,
                }),
            }),
        }
    }

    /// Create a root lifetime that terminates when the returned guard drops.
    pub fn new_guarded() -> LifetimeGuard {
        Self::new().guard()
    }

    pub fn id(&self) -> LifetimeId {
        self.inner.id
    }

    /// True until termination starts.
    pub fn is_alive(&self) -> bool {
        self.inner.state.lock().status == Status::Alive
    }

    /// Create a lifetime that terminates no later than this one.
    ///
    /// If this lifetime is already terminated, the nested lifetime is
    /// returned already terminated.
    pub fn create_nested(&self) -> Lifetime {
        let child = Lifetime::new();
        match self.inner.push(Action::Nested(child.clone())) {
            Ok(action) => {
                child.inner.state.lock().parent = Some((Arc::downgrade(&self.inner), action));
            }
            Err(action) => action.run(),
        }
        child
    }

    /// Register a cleanup action.
    ///
    /// The action runs exactly once: when the lifetime terminates, or right
    /// away if it already has.
    pub fn on_termination<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(action) = self.inner.push(Action::Callback(Box::new(action))) {
            action.run();
        }
    }

    /// Register a cleanup action, failing instead of running it when the
    /// lifetime is already terminated.
    pub fn try_on_termination<F>(&self, action: F) -> Result<(), LifetimeError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .push(Action::Callback(Box::new(action)))
            .map(|_| ())
            .map_err(|_| LifetimeError::Terminated(self.id()))
    }

    /// Terminate this lifetime.
    ///
    /// The first call runs every pending action (terminating nested
    /// lifetimes) in reverse registration order. Later calls do nothing.
    pub fn terminate(&self) {
        let (actions, parent) = {
            let mut state = self.inner.state.lock();
            if state.status != Status::Alive {
                return;
            }
            state.status = Status::Terminating;
            (mem::take(&mut state.actions), state.parent.take())
        };

        tracing::trace!(lifetime = %self.id(), actions = actions.len(), "terminating lifetime");

        for (_, action) in actions.into_iter().rev() {
            action.run();
        }

        self.inner.state.lock().status = Status::Terminated;

        if let Some((parent, action)) = parent {
            if let Some(parent) = parent.upgrade() {
                parent.detach(action);
            }
        }
    }

    /// Wrap this lifetime in a guard that terminates it on drop.
    pub fn guard(self) -> LifetimeGuard {
        LifetimeGuard { lifetime: self }
    }

    /// Number of actions (including nested lifetimes) still pending.
    pub fn pending_actions(&self) -> usize {
        self.inner.state.lock().actions.len()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Lifetime {}

impl std::hash::Hash for Lifetime {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Lifetime")
            .field("id", &self.inner.id)
            .field("status", &state.status)
            .field("pending_actions", &state.actions.len())
            .finish()
    }
}

/// Terminates its lifetime when dropped.
#[must_use = "dropping the guard terminates the lifetime immediately"]
pub struct LifetimeGuard {
    lifetime: Lifetime,
}

impl LifetimeGuard {
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}

impl std::ops::Deref for LifetimeGuard {
    type Target = Lifetime;

    fn deref(&self) -> &Lifetime {
        &self.lifetime
    }
}

impl Drop for LifetimeGuard {
    fn drop(&mut self) {
        self.lifetime.terminate();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &'static str| {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(name)) as Box<dyn FnOnce() + Send>
        };
        (log, make)
    }

    #[test]
    fn actions_run_in_reverse_order() {
        let (log, make) = recorder();
        let lifetime = Lifetime::new();

        lifetime.on_termination(make("first"));
        lifetime.on_termination(make("second"));
        lifetime.on_termination(make("third"));
        assert!(log.lock().is_empty());

        lifetime.terminate();
        assert_eq!(*log.lock(), vec!["third", "second", "first"]);
    }

    #[test]
    fn terminate_is_idempotent() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        let lifetime = Lifetime::new();
        lifetime.on_termination(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        lifetime.terminate();
        lifetime.terminate();
        lifetime.clone().terminate();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!lifetime.is_alive());
    }

    #[test]
    fn action_on_terminated_lifetime_runs_immediately() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        let lifetime = Lifetime::new();
        lifetime.terminate();
        lifetime.on_termination(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_on_termination_fails_when_terminated() {
        let lifetime = Lifetime::new();
        assert!(lifetime.try_on_termination(|| {}).is_ok());

        lifetime.terminate();
        assert_eq!(
            lifetime.try_on_termination(|| panic!("must not run")),
            Err(LifetimeError::Terminated(lifetime.id()))
        );
    }

    #[test]
    fn parent_termination_cascades_to_children() {
        let parent = Lifetime::new();
        let child = parent.create_nested();
        let grandchild = child.create_nested();

        let released = Arc::new(AtomicUsize::new(0));
        let released_clone = released.clone();
        grandchild.on_termination(move || {
            released_clone.fetch_add(1, Ordering::SeqCst);
        });

        parent.terminate();

        assert!(!child.is_alive());
        assert!(!grandchild.is_alive());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn children_terminate_in_reverse_order_with_callbacks() {
        let (log, make) = recorder();
        let parent = Lifetime::new();

        parent.on_termination(make("callback"));
        let child = parent.create_nested();
        child.on_termination(make("child"));
        parent.on_termination(make("last"));

        parent.terminate();
        assert_eq!(*log.lock(), vec!["last", "child", "callback"]);
    }

    #[test]
    fn nested_of_terminated_parent_is_terminated() {
        let parent = Lifetime::new();
        parent.terminate();

        let child = parent.create_nested();
        assert!(!child.is_alive());
    }

    #[test]
    fn terminated_child_detaches_from_parent() {
        let parent = Lifetime::new();
        let child = parent.create_nested();
        assert_eq!(parent.pending_actions(), 1);

        child.terminate();
        assert_eq!(parent.pending_actions(), 0);
        assert!(parent.is_alive());
    }

    #[test]
    fn guard_terminates_on_drop() {
        let lifetime = {
            let guard = Lifetime::new_guarded();
            assert!(guard.is_alive());
            guard.lifetime().clone()
        };
        assert!(!lifetime.is_alive());
    }

    #[test]
    fn clones_share_identity() {
        let a = Lifetime::new();
        let b = a.clone();
        let c = Lifetime::new();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn concurrent_registration_runs_every_action_once() {
        let lifetime = Lifetime::new();
        let count = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let lifetime = lifetime.clone();
                let count = count.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        let count = count.clone();
                        lifetime.on_termination(move || {
                            count.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        lifetime.terminate();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1000);
    }
}
