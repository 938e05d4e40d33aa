//! Bounded LRU Cache
//!
//! The hot half of the storage engine: a bounded map from key to value with a
//! total recency order. Every hit promotes the entry to most-recent; inserting
//! past capacity evicts the least-recent entry.
//!
//! The recency list is a doubly linked list laid out in an arena of slots
//! addressed by stable indices, with a `HashMap` from key to slot index. That
//! keeps promotion, insertion and eviction O(1) without a single raw pointer.

use bytes::Bytes;
use std::collections::HashMap;

/// Outcome of a [`LruCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was not present and a new entry was created.
    Inserted,
    /// The key existed and its value was replaced.
    Updated,
}

/// One occupied slot in the recency list.
#[derive(Debug)]
struct Node {
    key: Bytes,
    value: Bytes,
    /// Towards most-recent.
    prev: Option<usize>,
    /// Towards least-recent.
    next: Option<usize>,
}

/// A bounded key-value map with least-recently-used eviction.
///
/// Not internally synchronized; the engine wraps it in a mutex.
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    map: HashMap<Bytes, usize>,
    /// Most-recent end of the list.
    head: Option<usize>,
    /// Least-recent end of the list; the eviction candidate.
    tail: Option<usize>,
}

impl LruCache {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is legal: every `put` stores the entry and then
    /// immediately evicts it, after any existing entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
            map: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Looks up `key`, promoting it to most-recent on a hit.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        let idx = *self.map.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        Some(self.node(idx).value.clone())
    }

    /// Inserts or updates `key`, promoting it to most-recent.
    ///
    /// If the insertion pushes the cache past capacity, least-recent entries
    /// are evicted until the bound holds again.
    pub fn put(&mut self, key: Bytes, value: Bytes) -> PutOutcome {
        if let Some(&idx) = self.map.get(&key) {
            self.node_mut(idx).value = value;
            self.unlink(idx);
            self.push_front(idx);
            return PutOutcome::Updated;
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(Node {
                    key: key.clone(),
                    value,
                    prev: None,
                    next: None,
                });
                idx
            }
            None => {
                self.slots.push(Some(Node {
                    key: key.clone(),
                    value,
                    prev: None,
                    next: None,
                }));
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);

        while self.map.len() > self.capacity {
            self.evict_tail();
        }

        PutOutcome::Inserted
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.map.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.release(idx);
                true
            }
            None => false,
        }
    }

    /// Drops every entry, keeping the configured capacity.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.map.clear();
        self.head = None;
        self.tail = None;
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The configured capacity; invariant for the cache's lifetime.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if `key` is cached, without touching recency.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Iterates over cached keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.map.keys()
    }

    fn node(&self, idx: usize) -> &Node {
        self.slots[idx].as_ref().expect("linked slot occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.slots[idx].as_mut().expect("linked slot occupied")
    }

    /// Detaches `idx` from the recency list, fixing up its neighbors.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    /// Links a detached `idx` in at the most-recent end.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.node_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Evicts the least-recent entry.
    fn evict_tail(&mut self) {
        if let Some(idx) = self.tail {
            self.unlink(idx);
            let key = self.node(idx).key.clone();
            self.map.remove(&key);
            self.release(idx);
        }
    }

    /// Returns a vacated slot to the free list.
    fn release(&mut self, idx: usize) {
        self.slots[idx] = None;
        self.free.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn put_and_get() {
        let mut cache = LruCache::new(2);
        assert_eq!(cache.put(b("apple"), b("red")), PutOutcome::Inserted);
        assert_eq!(cache.put(b("banana"), b("yellow")), PutOutcome::Inserted);

        assert_eq!(cache.get(b"apple"), Some(b("red")));
        assert_eq!(cache.get(b"banana"), Some(b("yellow")));
        assert_eq!(cache.get(b"cherry"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn update_replaces_value_in_place() {
        let mut cache = LruCache::new(2);
        cache.put(b("k"), b("v1"));
        assert_eq!(cache.put(b("k"), b("v2")), PutOutcome::Updated);
        assert_eq!(cache.get(b"k"), Some(b("v2")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn overflow_evicts_least_recent() {
        let mut cache = LruCache::new(2);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));
        cache.put(b("c"), b("3"));

        assert_eq!(cache.get(b"a"), None);
        assert_eq!(cache.get(b"b"), Some(b("2")));
        assert_eq!(cache.get(b"c"), Some(b("3")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn get_promotes_entry() {
        let mut cache = LruCache::new(2);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get(b"a"), Some(b("1")));
        cache.put(b("c"), b("3"));

        assert_eq!(cache.get(b"a"), Some(b("1")));
        assert_eq!(cache.get(b"b"), None);
    }

    #[test]
    fn put_promotes_existing_entry() {
        let mut cache = LruCache::new(2);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));
        cache.put(b("a"), b("1x"));
        cache.put(b("c"), b("3"));

        assert_eq!(cache.get(b"a"), Some(b("1x")));
        assert_eq!(cache.get(b"b"), None);
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut cache = LruCache::new(2);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));

        assert!(cache.remove(b"a"));
        assert!(!cache.remove(b"a"));
        assert_eq!(cache.len(), 1);

        // The freed slot is reusable without evicting "b".
        cache.put(b("c"), b("3"));
        assert_eq!(cache.get(b"b"), Some(b("2")));
        assert_eq!(cache.get(b"c"), Some(b("3")));
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let mut cache = LruCache::new(3);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));
        cache.put(b("c"), b("3"));

        assert!(cache.remove(b"b")); // middle
        assert!(cache.remove(b"c")); // head (most recent)
        assert!(cache.remove(b"a")); // tail (least recent)
        assert!(cache.is_empty());

        cache.put(b("d"), b("4"));
        assert_eq!(cache.get(b"d"), Some(b("4")));
    }

    #[test]
    fn capacity_bound_holds_under_churn() {
        let mut cache = LruCache::new(8);
        for i in 0..100 {
            cache.put(b(&format!("key{}", i)), b("v"));
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn zero_capacity_evicts_immediately() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.put(b("k"), b("v")), PutOutcome::Inserted);
        assert!(cache.is_empty());
        assert_eq!(cache.get(b"k"), None);
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache = LruCache::new(4);
        cache.put(b("a"), b("1"));
        cache.put(b("b"), b("2"));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(b"a"), None);
        assert_eq!(cache.capacity(), 4);

        cache.put(b("c"), b("3"));
        assert_eq!(cache.get(b"c"), Some(b("3")));
    }
}
