//! Stale shelf: last-known-good payloads that left the hot tier.
//!
//! Never consulted by normal lookups. Only the fetch fallback chain reads it,
//! when the provider is unreachable and old data beats no data.

use std::collections::{HashMap, VecDeque};

use crate::cache::{CacheEntry, CacheKey};
use crate::models::ValidatedPayload;

/// FIFO, byte-budgeted store of retired payloads.
#[derive(Debug)]
pub struct StaleShelf {
    entries: HashMap<CacheKey, ValidatedPayload>,
    order: VecDeque<CacheKey>,
    bytes: usize,
    budget: usize,
}

impl StaleShelf {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            bytes: 0,
            budget: budget_bytes,
        }
    }

    /// Parks a retired entry, dropping the oldest parked payloads to fit.
    pub fn park(&mut self, entry: CacheEntry) {
        self.remove(&entry.key);
        if entry.size_bytes > self.budget {
            return;
        }
        while self.bytes + entry.size_bytes > self.budget {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(old) = self.entries.remove(&oldest) {
                self.bytes -= old.size_bytes();
            }
        }
        self.bytes += entry.size_bytes;
        self.order.push_back(entry.key.clone());
        self.entries.insert(entry.key, entry.payload);
    }

    pub fn get(&self, key: &CacheKey) -> Option<ValidatedPayload> {
        self.entries.get(key).cloned()
    }

    /// Fresh data for the key was admitted; the parked copy is obsolete.
    pub fn remove(&mut self, key: &CacheKey) {
        if let Some(old) = self.entries.remove(key) {
            self.bytes -= old.size_bytes();
            self.order.retain(|k| k != key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::entry_of_size;
    use crate::cache::Tier;

    #[tokio::test]
    async fn test_park_and_get() {
        let mut shelf = StaleShelf::new(10_000);
        shelf.park(entry_of_size("a", 100, Tier::Hot));
        assert!(shelf.get(&CacheKey::from("a")).is_some());
        assert!(shelf.get(&CacheKey::from("b")).is_none());
    }

    #[tokio::test]
    async fn test_oldest_dropped_first() {
        let sample = entry_of_size("sample", 100, Tier::Hot);
        let mut shelf = StaleShelf::new(sample.size_bytes * 2);
        shelf.park(entry_of_size("a", 100, Tier::Hot));
        shelf.park(entry_of_size("b", 100, Tier::Hot));
        shelf.park(entry_of_size("c", 100, Tier::Hot));

        assert_eq!(shelf.len(), 2);
        assert!(shelf.get(&CacheKey::from("a")).is_none());
        assert!(shelf.get(&CacheKey::from("c")).is_some());
        assert!(shelf.bytes() <= sample.size_bytes * 2);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let mut shelf = StaleShelf::new(10_000);
        shelf.park(entry_of_size("a", 100, Tier::Hot));
        shelf.park(entry_of_size("b", 100, Tier::Hot));
        shelf.remove(&CacheKey::from("a"));
        assert_eq!(shelf.len(), 1);

        shelf.clear();
        assert!(shelf.is_empty());
        assert_eq!(shelf.bytes(), 0);
    }
}
