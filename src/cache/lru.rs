//! LRU Tracker Module
//!
//! Recency ordering for session-tier eviction.

use std::collections::{BTreeMap, HashMap};

use crate::cache::CacheKey;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Every touch stamps the key with a fresh, strictly increasing sequence
/// number, so the smallest stamp is always the least recently used key and
/// keys never touched since insertion fall out in insertion order.
#[derive(Debug, Default)]
pub struct LruTracker {
    next_seq: u64,
    by_seq: BTreeMap<u64, CacheKey>,
    seq_of: HashMap<CacheKey, u64>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if new.
    pub fn touch(&mut self, key: &CacheKey) {
        if let Some(old) = self.seq_of.remove(key) {
            self.by_seq.remove(&old);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key.clone());
        self.seq_of.insert(key.clone(), seq);
    }

    // == Remove ==
    pub fn remove(&mut self, key: &CacheKey) {
        if let Some(seq) = self.seq_of.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.by_seq.pop_first()?;
        self.seq_of.remove(&key);
        Some(key)
    }

    /// Least recently used key, without removing it.
    pub fn peek_oldest(&self) -> Option<&CacheKey> {
        self.by_seq.values().next()
    }

    pub fn len(&self) -> usize {
        self.seq_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq_of.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.seq_of.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.seq_of.clear();
    }
}
