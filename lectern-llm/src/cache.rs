//! Bounded TTL cache placed in front of the external services.
//!
//! Entries are content-addressed, so reuse comes from duplicate submissions
//! (retried uploads) rather than access recency. Eviction is therefore plain
//! FIFO by insertion order, and expiry is checked lazily on read.

use lectern_core::{Clock, SharedClock, SystemClock, Timestamp};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A cached value with the time it was stored.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Timestamp,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Keys in insertion order; always the same key set as `entries`.
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }
}

/// Key-value store with per-entry expiry and capacity-based FIFO eviction.
/// Thread-safe via a single Mutex; no lock is held outside a method call.
pub struct TtlCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    capacity: usize,
    ttl: Duration,
    clock: SharedClock,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache reading the wall clock.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of live entries
    /// * `ttl` - Age after which an entry is never served
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, SystemClock::shared())
    }

    /// Create a cache with an injected clock.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, stored_at: Timestamp, now: Timestamp) -> bool {
        // A stored_at in the future (clock stepped back) counts as fresh.
        match (now - stored_at).to_std() {
            Ok(age) => age > self.ttl,
            Err(_) => false,
        }
    }

    /// Get a cached value.
    ///
    /// # Returns
    /// * `Some(V)` - If present and unexpired
    /// * `None` - If absent, or expired (the entry is removed)
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();
        let stored_at = state.entries.get(key)?.stored_at;
        if self.is_expired(stored_at, now) {
            state.remove(key);
            return None;
        }
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite a value stamped with the current time.
    ///
    /// A new key that would push the cache over capacity first evicts the
    /// oldest-inserted key. Overwriting keeps the key's original position.
    pub fn set(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let stored_at = self.clock.now();
        let mut state = self.lock();

        if let Some(entry) = state.entries.get_mut(&key) {
            *entry = CacheEntry { value, stored_at };
            return;
        }

        if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, CacheEntry { value, stored_at });
    }

    /// Remove an entry, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry.stored_at, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("current_size", &self.len())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_test_utils::ManualClock;
    use std::sync::Arc;

    fn cache_with(capacity: usize, ttl_secs: u64) -> (TtlCache<String, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::with_clock(capacity, Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_set_basic() {
        let (cache, _) = cache_with(10, 60);
        assert!(cache.is_empty());
        cache.set("k".to_string(), "v".to_string());
        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_key_is_none() {
        let (cache, _) = cache_with(10, 60);
        assert_eq!(cache.get(&"nope".to_string()), None);
    }

    #[test]
    fn test_expired_entry_is_removed_lazily() {
        let (cache, clock) = cache_with(10, 60);
        cache.set("k".to_string(), "v".to_string());

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_fifo_eviction_drops_first_inserted() {
        let (cache, _) = cache_with(3, 60);
        for key in ["a", "b", "c"] {
            cache.set(key.to_string(), key.to_uppercase());
        }
        // Reading "a" does not refresh it: this is FIFO, not LRU.
        assert!(cache.get(&"a".to_string()).is_some());

        cache.set("d".to_string(), "D".to_string());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"a".to_string()), None);
        for key in ["b", "c", "d"] {
            assert!(cache.get(&key.to_string()).is_some(), "{} evicted", key);
        }
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, _) = cache_with(2, 60);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());
        cache.set("a".to_string(), "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), Some("3".to_string()));
        assert_eq!(cache.get(&"b".to_string()), Some("2".to_string()));

        // "a" keeps its original slot and is still the oldest.
        cache.set("c".to_string(), "4".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn test_overwrite_refreshes_timestamp() {
        let (cache, clock) = cache_with(2, 10);
        cache.set("a".to_string(), "1".to_string());
        clock.advance(chrono::Duration::seconds(8));
        cache.set("a".to_string(), "2".to_string());
        clock.advance(chrono::Duration::seconds(8));
        assert_eq!(cache.get(&"a".to_string()), Some("2".to_string()));
    }

    #[test]
    fn test_reinsert_after_expiry_goes_to_back() {
        let (cache, clock) = cache_with(2, 10);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(cache.get(&"a".to_string()), None);

        cache.set("a".to_string(), "3".to_string());
        cache.set("c".to_string(), "4".to_string());
        // "b" was the oldest surviving insertion.
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), Some("3".to_string()));
        assert_eq!(cache.get(&"c".to_string()), Some("4".to_string()));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let (cache, _) = cache_with(0, 60);
        cache.set("a".to_string(), "1".to_string());
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache_with(10, 10);
        cache.set("old".to_string(), "1".to_string());
        clock.advance(chrono::Duration::seconds(5));
        cache.set("new".to_string(), "2".to_string());
        clock.advance(chrono::Duration::seconds(6));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&"new".to_string()).is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let (cache, _) = cache_with(10, 60);
        cache.set("a".to_string(), "1".to_string());
        cache.set("b".to_string(), "2".to_string());
        assert_eq!(cache.remove(&"a".to_string()), Some("1".to_string()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_sets_respect_capacity() {
        let cache = Arc::new(TtlCache::<u32, u32>::new(16, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
