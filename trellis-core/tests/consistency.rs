//! Bookkeeping violations in `view`.
//!
//! `ReactiveMap` never breaks the entry state machine, so these tests drive
//! `view` through a map that replays a fixed event script instead.

use std::sync::Arc;

use trellis_core::lifetime::Lifetime;
use trellis_core::map::{LifetimeTable, MapEvent, ViewableMap};
use trellis_core::reactive::Subscribers;

type Handler = dyn for<'a> Fn(MapEvent<'a, u32, u32>) + Send + Sync;

enum Step {
    Add(u32, u32),
    Remove(u32, u32),
}

/// A map that only forwards scripted events to its subscribers.
#[derive(Default)]
struct ScriptedMap {
    subscribers: Subscribers<Handler>,
    table: LifetimeTable<u32>,
}

impl ScriptedMap {
    fn play(&self, steps: &[Step]) {
        for step in steps {
            for (_, handler) in self.subscribers.snapshot() {
                match step {
                    Step::Add(key, value) => handler(MapEvent::Add {
                        key,
                        new_value: value,
                    }),
                    Step::Remove(key, value) => handler(MapEvent::Remove {
                        key,
                        old_value: value,
                    }),
                }
            }
        }
    }
}

impl ViewableMap<u32, u32> for ScriptedMap {
    fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: for<'a> Fn(MapEvent<'a, u32, u32>) + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        self.subscribers.add(lifetime, handler);
    }

    fn get(&self, _key: &u32) -> Option<u32> {
        None
    }

    fn set(&self, _key: u32, _value: u32) -> Option<u32> {
        None
    }

    fn remove(&self, _key: &u32) -> Option<u32> {
        None
    }

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn view_table(&self) -> &LifetimeTable<u32> {
        &self.table
    }
}

fn viewed() -> (ScriptedMap, Lifetime) {
    let map = ScriptedMap::default();
    let lifetime = Lifetime::new();
    map.view(&lifetime, |_, _, _| {});
    (map, lifetime)
}

#[test]
fn well_formed_script_is_accepted() {
    let (map, _lifetime) = viewed();
    map.play(&[Step::Add(1, 1), Step::Remove(1, 1), Step::Add(1, 2)]);
}

#[test]
#[should_panic(expected = "child lifetime already exists")]
fn duplicate_add_is_fatal() {
    let (map, _lifetime) = viewed();
    map.play(&[Step::Add(1, 1), Step::Add(1, 2)]);
}

#[test]
#[should_panic(expected = "attempting to remove non-existing lifetime")]
fn remove_without_add_is_fatal() {
    let (map, _lifetime) = viewed();
    map.play(&[Step::Remove(7, 0)]);
}

#[test]
fn events_after_lifetime_termination_are_ignored() {
    let (map, lifetime) = viewed();
    map.play(&[Step::Add(1, 1)]);
    lifetime.terminate();
    // The subscription is gone, so an unmatched Remove reaches nobody.
    map.play(&[Step::Remove(9, 9)]);
    assert_eq!(map.view_table().open_views(), 0);
}
