//! TTL-bounded in-memory record stores.
//!
//! A [`Store`] is a single `tokio::sync::Mutex<HashMap<String, V>>` plus a fixed
//! TTL. Records are never expired by a timer: lookups evict what they find
//! stale (lazy expiry) and callers run [`Store::sweep`] before operations that
//! grow the map, so the map never holds more than one TTL window of traffic.
//!
//! Every operation takes the store lock exactly once, which makes each of them
//! a single atomic map operation. Separate stores never share a lock.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Records kept in a [`Store`] expose their creation instant.
pub trait Expiring {
    fn created_at(&self) -> Instant;

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at().elapsed() > ttl
    }
}

pub struct Store<V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<HashMap<String, V>>,
}

impl<V: Expiring> Store<V> {
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert or overwrite a record. Keys are expected to be collision resistant.
    pub async fn put(&self, key: String, value: V) {
        self.entries.lock().await.insert(key, value);
    }

    /// Remove a record regardless of its age.
    pub async fn delete(&self, key: &str) -> Option<V> {
        self.entries.lock().await.remove(key)
    }

    /// Remove and return a record only if it is still live.
    pub async fn take(&self, key: &str) -> Option<V> {
        let value = self.entries.lock().await.remove(key)?;
        if value.is_expired(self.ttl) {
            debug!(store = self.name, "discarded expired record on take");
            None
        } else {
            Some(value)
        }
    }

    /// Remove and return a live record when `accept` approves it.
    ///
    /// A record that is present but rejected by `accept` stays in place.
    pub async fn take_if<F>(&self, key: &str, accept: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut entries = self.lock().await;
        let accepted = match entries.entry(key) {
            Slot::Live(value) => accept(value),
            Slot::Expired | Slot::Absent => false,
        };
        if accepted {
            entries.remove(key)
        } else {
            None
        }
    }

    /// Drop every record older than the TTL and return how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, value| !value.is_expired(ttl));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(store = self.name, removed, "swept expired records");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Hold the store lock for a multi-step read-modify-write.
    pub async fn lock(&self) -> Entries<'_, V> {
        Entries {
            name: self.name,
            ttl: self.ttl,
            guard: self.entries.lock().await,
        }
    }
}

impl<V: Expiring + Clone> Store<V> {
    /// Return a copy of a live record; a stale one is evicted and reported absent.
    pub async fn get(&self, key: &str) -> Option<V> {
        match self.lock().await.entry(key) {
            Slot::Live(value) => Some(value.clone()),
            Slot::Expired | Slot::Absent => None,
        }
    }
}

/// Result of looking a key up while holding the lock.
#[derive(Debug)]
pub enum Slot<'e, V> {
    Live(&'e mut V),
    /// The record existed but was past its TTL; it has been removed.
    Expired,
    Absent,
}

/// Exclusive view over a store's map for the lifetime of the guard.
pub struct Entries<'a, V> {
    name: &'static str,
    ttl: Duration,
    guard: MutexGuard<'a, HashMap<String, V>>,
}

impl<V: Expiring> Entries<'_, V> {
    pub fn entry(&mut self, key: &str) -> Slot<'_, V> {
        let expired = match self.guard.get(key) {
            None => return Slot::Absent,
            Some(value) => value.is_expired(self.ttl),
        };

        if expired {
            self.guard.remove(key);
            debug!(store = self.name, "evicted expired record on lookup");
            return Slot::Expired;
        }

        match self.guard.get_mut(key) {
            Some(value) => Slot::Live(value),
            None => Slot::Absent,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.guard.remove(key)
    }
}
