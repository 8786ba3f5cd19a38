//! Least recently used cache of key lookups.

use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_CACHE_SIZE: usize = 5000;

struct Entry {
    server: String,
    tick: u64,
}

/// Bounded key -> server map that evicts the least recently used key.
pub struct LookupCache {
    capacity: usize,
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    tick: u64,
}

impl LookupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn get(&mut self, key: &str) -> Option<&str> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key.to_string());
        Some(entry.server.as_str())
    }

    /// Returns the cached value without touching recency.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.server.as_str())
    }

    pub fn insert(&mut self, key: &str, server: &str) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            entry.server = server.to_string();
            self.order.insert(tick, key.to_string());
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                server: server.to_string(),
                tick,
            },
        );
        self.order.insert(tick, key.to_string());
    }

    /// Points every entry cached for `from` at `to`. Recency is unchanged.
    pub fn replace_value(&mut self, from: &str, to: &str) -> usize {
        let mut replaced = 0;
        for entry in self.entries.values_mut() {
            if entry.server == from {
                entry.server = to.to_string();
                replaced += 1;
            }
        }
        replaced
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        LookupCache::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LookupCache::new(2);
        cache.insert("a", "s1");
        cache.insert("b", "s2");
        assert_eq!(cache.get("a"), Some("s1"));
        cache.insert("c", "s3");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("b"), None);
        assert_eq!(cache.peek("a"), Some("s1"));
        assert_eq!(cache.peek("c"), Some("s3"));
    }

    #[test]
    fn overwrite_does_not_evict() {
        let mut cache = LookupCache::new(2);
        cache.insert("a", "s1");
        cache.insert("b", "s2");
        cache.insert("a", "s9");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("a"), Some("s9"));
        assert_eq!(cache.peek("b"), Some("s2"));
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let mut cache = LookupCache::new(0);
        cache.insert("a", "s1");
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn replaces_values_and_clears() {
        let mut cache = LookupCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CACHE_SIZE);
        cache.insert("a", "old");
        cache.insert("b", "old");
        cache.insert("c", "other");
        assert_eq!(cache.replace_value("old", "new"), 2);
        assert_eq!(cache.peek("a"), Some("new"));
        assert_eq!(cache.peek("c"), Some("other"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
