//! In-memory data store: `key -> (signed_item, updated_at, accessed_at)`.

use std::collections::HashMap;

use drogulus_types::{Identifier, SignedItem};

/// One stored entry and its freshness timestamps.
///
/// `updated_at` tracks the last successful `Store`; `accessed_at` tracks
/// the last externally-driven `Get` (via [`DataStore::touch`]) and is what
/// the republish timer uses to tell active keys from inert ones.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub item: SignedItem,
    pub updated_at: f64,
    pub accessed_at: f64,
}

#[derive(Debug, Default)]
pub struct DataStore {
    entries: HashMap<Identifier, StoreEntry>,
}

impl DataStore {
    pub fn new() -> Self {
        DataStore::default()
    }

    /// Insert or replace the entry for `item.key`. `accessed_at` is
    /// preserved across a replace; a brand-new key starts at `0.0`.
    pub fn set(&mut self, item: SignedItem, now: f64) {
        let accessed_at = self
            .entries
            .get(&item.key)
            .map(|entry| entry.accessed_at)
            .unwrap_or(0.0);
        self.entries.insert(
            item.key,
            StoreEntry {
                item,
                updated_at: now,
                accessed_at,
            },
        );
    }

    pub fn get(&self, key: &Identifier) -> Option<&StoreEntry> {
        self.entries.get(key)
    }

    /// Mark `key` as accessed at `now`. A no-op if absent.
    pub fn touch(&mut self, key: &Identifier, now: f64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.accessed_at = now;
        }
    }

    pub fn delete(&mut self, key: &Identifier) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &Identifier) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Identifier> {
        self.entries.keys()
    }
}
