//! Wire boundary.
//!
//! This module is the seam between a [`ViewableMap`] and the transport that
//! mirrors it to a peer. Outbound, every map event becomes one
//! MessagePack-encoded [`MapDelta`] fired on a byte [`Signal`]. Inbound,
//! payloads fired on a byte signal are decoded and applied through `set` /
//! `remove`. Framing, routing and reconnection belong to the transport.
//!
//! Two maps can be mirrored both ways. The echo of a delta comes back as a
//! `set` of an equal value, which emits nothing under the default
//! [`MapConfig`](crate::map::MapConfig), so the exchange settles.
//!
//! Both sides of a mirror may be written from different threads. A delta
//! applied from inside the other map's delivery never waits for the target
//! map's own delivery to finish; it is queued there instead.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::lifetime::Lifetime;
use crate::map::{MapEvent, MapKey, MapValue, ViewableMap};
use crate::reactive::Signal;

/// An owned, serializable form of a map event.
///
/// Old values are not transmitted: the peer holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapDelta<K, V> {
    Add { key: K, value: V },
    Update { key: K, value: V },
    Remove { key: K },
}

impl<K, V> MapDelta<K, V>
where
    K: MapKey,
    V: MapValue,
{
    pub fn from_event(event: MapEvent<'_, K, V>) -> Self {
        match event {
            MapEvent::Add { key, new_value } => MapDelta::Add {
                key: key.clone(),
                value: new_value.clone(),
            },
            MapEvent::Update { key, new_value, .. } => MapDelta::Update {
                key: key.clone(),
                value: new_value.clone(),
            },
            MapEvent::Remove { key, .. } => MapDelta::Remove { key: key.clone() },
        }
    }

    pub fn key(&self) -> &K {
        match self {
            MapDelta::Add { key, .. } | MapDelta::Update { key, .. } | MapDelta::Remove { key } => {
                key
            }
        }
    }

    /// Apply the delta to `map` through its mutation surface.
    pub fn apply<M>(self, map: &M)
    where
        M: ViewableMap<K, V> + ?Sized,
    {
        match self {
            MapDelta::Add { key, value } | MapDelta::Update { key, value } => {
                map.set(key, value);
            }
            MapDelta::Remove { key } => {
                map.remove(&key);
            }
        }
    }
}

impl<K, V> MapDelta<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Fire one encoded delta on `outbox` per event of `map`, while `lifetime`
/// is alive.
pub fn forward<K, V, M>(lifetime: &Lifetime, map: &M, outbox: &Signal<Vec<u8>>)
where
    K: MapKey + Serialize + DeserializeOwned,
    V: MapValue + Serialize + DeserializeOwned,
    M: ViewableMap<K, V>,
{
    let outbox = outbox.clone();
    map.advise(lifetime, move |event| {
        match MapDelta::from_event(event).encode() {
            Ok(bytes) => outbox.fire(&bytes),
            Err(err) => tracing::warn!(%err, key = ?event.key(), "dropping outbound map delta"),
        }
    });
}

/// Apply every payload fired on `inbox` to `map`, while `lifetime` is alive.
///
/// Payloads that fail to decode are logged and dropped.
pub fn receive<K, V, M>(lifetime: &Lifetime, inbox: &Signal<Vec<u8>>, map: Arc<M>)
where
    K: MapKey + Serialize + DeserializeOwned,
    V: MapValue + Serialize + DeserializeOwned,
    M: ViewableMap<K, V> + 'static,
{
    inbox.advise(lifetime, move |bytes: &Vec<u8>| match MapDelta::<K, V>::decode(bytes) {
        Ok(delta) => {
            tracing::trace!(key = ?delta.key(), "applying inbound map delta");
            delta.apply(&*map);
        }
        Err(err) => tracing::warn!(%err, len = bytes.len(), "dropping inbound map delta"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::ReactiveMap;
    use parking_lot::Mutex;

    #[test]
    fn delta_follows_event_kind() {
        let (key, old, new) = ("k".to_string(), 1, 2);

        let update = MapEvent::Update {
            key: &key,
            old_value: &old,
            new_value: &new,
        };
        assert_eq!(
            MapDelta::from_event(update),
            MapDelta::Update {
                key: "k".to_string(),
                value: 2
            }
        );

        let remove = MapEvent::Remove { key: &key, old_value: &old };
        assert_eq!(MapDelta::from_event(remove), MapDelta::<String, i32>::Remove { key: "k".to_string() });
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(MapDelta::<String, i32>::decode(&[0xc1, 0x00]).is_err());
    }

    #[test]
    fn forward_fires_one_payload_per_event() {
        let map: ReactiveMap<String, i32> = ReactiveMap::new();
        let outbox = Signal::new();
        let lifetime = Lifetime::new();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let sent_clone = sent.clone();
        outbox.advise(&lifetime, move |bytes: &Vec<u8>| {
            sent_clone.lock().push(MapDelta::<String, i32>::decode(bytes).unwrap());
        });
        forward(&lifetime, &map, &outbox);

        map.set("a".to_string(), 1);
        map.set("a".to_string(), 2);
        map.remove(&"a".to_string());

        assert_eq!(
            *sent.lock(),
            vec![
                MapDelta::Add { key: "a".to_string(), value: 1 },
                MapDelta::Update { key: "a".to_string(), value: 2 },
                MapDelta::Remove { key: "a".to_string() },
            ]
        );
    }

    #[test]
    fn receive_applies_payloads_and_skips_bad_ones() {
        let map: Arc<ReactiveMap<String, i32>> = Arc::new(ReactiveMap::new());
        let inbox = Signal::new();
        let lifetime = Lifetime::new();
        receive(&lifetime, &inbox, map.clone());

        let add = MapDelta::Add { key: "x".to_string(), value: 7 };
        inbox.fire(&add.encode().unwrap());
        inbox.fire(&vec![0xc1]);

        assert_eq!(map.get(&"x".to_string()), Some(7));

        lifetime.terminate();
        let remove = MapDelta::<String, i32>::Remove { key: "x".to_string() };
        inbox.fire(&remove.encode().unwrap());
        assert_eq!(map.len(), 1);
    }
}
