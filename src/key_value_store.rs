//! The keyspace.
//!
//! Every key maps to a [`Value`] holding the stored bytes and an optional
//! absolute expiry. Expiry is enforced lazily: an entry whose deadline has
//! passed is evicted by the first operation that touches it, and is never
//! reported as present. Deadlines use the monotonic clock, so wall-clock
//! adjustments have no effect on them.
//!
//! The whole map sits behind one mutex. Each operation takes the lock for the
//! duration of the map access only, which makes every single operation atomic
//! with respect to the others.

use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: Bytes,
    pub expiration: Option<Instant>,
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expiration, Some(expiration) if expiration <= now)
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: Mutex<HashMap<Bytes, Value>>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or overwrites `key`.
    ///
    /// Without a `ttl` the key becomes persistent, clearing any expiry left
    /// by an earlier `set`.
    pub async fn set(&self, key: Bytes, data: Bytes, ttl: Option<Duration>) {
        let expiration = ttl.map(|ttl| Instant::now() + ttl);

        let mut entries = self.entries.lock().await;
        entries.insert(key, Value { data, expiration });
    }

    /// Returns the value stored under `key`, evicting it first if it expired.
    pub async fn get(&self, key: &[u8]) -> Option<Bytes> {
        let mut entries = self.entries.lock().await;

        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|value| value.data.clone())
    }

    /// Removes every key in `keys` and returns how many of them were present.
    ///
    /// Entries that had already expired are removed but not counted.
    pub async fn del(&self, keys: &[Bytes]) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        keys.iter()
            .filter_map(|key| entries.remove(key))
            .filter(|value| !value.is_expired(now))
            .count()
    }

    /// Returns the raw entry for `key` without applying expiry.
    pub async fn peek(&self, key: &[u8]) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Number of entries currently held, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
