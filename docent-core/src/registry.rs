//! Keyed singleton registry.
//!
//! A name → instance cache where every key is initialized at most once and the
//! resulting instance is shared by reference for the lifetime of the registry. The
//! shard lock of the map is only held to find or create the per-key slot; construction
//! runs under the slot's own [`OnceLock`], so building one instance never blocks
//! lookups of another key.
//!
//! Instances are accessors, not data: nothing is ever evicted or invalidated.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;

type Slot<T> = Arc<OnceLock<Arc<T>>>;

pub struct Registry<T> {
    slots: DashMap<String, Slot<T>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { slots: DashMap::new() }
    }

    /// Returns the instance for `key`, building it with `init` on first access.
    ///
    /// Concurrent first accesses to the same key run `init` exactly once; every caller
    /// receives the same `Arc`.
    pub fn get_or_init(&self, key: &str, init: impl FnOnce() -> T) -> Arc<T> {
        self.slot(key)
            .get_or_init(|| {
                tracing::debug!(target: "docent::registry", key, "initializing registry entry");
                Arc::new(init())
            })
            .clone()
    }

    /// Returns the instance for `key` if it has been initialized.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.slots
            .get(key)
            .and_then(|slot| slot.value().get().cloned())
    }

    // The slot is cloned out so the shard lock is released before `init` runs.
    fn slot(&self, key: &str) -> Slot<T> {
        if let Some(slot) = self.slots.get(key) {
            return slot.value().clone();
        }
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .value()
            .clone()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .slots
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();

        f.debug_struct("Registry").field("keys", &keys).finish()
    }
}
