//! Map configuration.

use serde::{Deserialize, Serialize};

/// Options for [`ReactiveMap`](super::ReactiveMap).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Emit an Update even when `set` stores a value equal to the current
    /// one. Off by default, which is what lets two mirrored maps settle
    /// instead of echoing deltas back and forth forever.
    pub notify_on_equal: bool,
}

impl MapConfig {
    pub fn notify_on_equal(mut self, notify: bool) -> Self {
        self.notify_on_equal = notify;
        self
    }
}
