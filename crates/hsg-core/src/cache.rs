//! Bounded, TTL'd caches for query results, vector bytes, and salience.
//!
//! A single `lru::LruCache` behind a `Mutex`, generalized with an explicit
//! per-entry TTL so the same wrapper serves the query-result, vector-byte,
//! and salience caches the engine needs.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// An LRU cache with a uniform time-to-live applied to every entry. A hit on
/// an expired entry is treated as a miss and the stale entry is evicted.
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Returns a clone of the cached value if present and not yet expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock().expect("cache lock poisoned");
        match guard.get(key) {
            Some((value, inserted_at)) if inserted_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache lock poisoned");
        guard.put(key, (value, Instant::now()));
    }

    pub fn invalidate(&self, key: &K) {
        let mut guard = self.inner.lock().expect("cache lock poisoned");
        guard.pop(key);
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("cache lock poisoned");
        guard.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a stable cache key for a query, scoped by `k` and the caller's
/// namespace, sector, and minimum-salience filters.
pub fn query_cache_key(
    query: &str,
    k: usize,
    namespaces: &std::collections::BTreeSet<String>,
    sectors: &std::collections::BTreeSet<crate::model::Sector>,
    min_salience: Option<f64>,
) -> String {
    let sectors_key = sectors.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");
    let salience_key = min_salience.map(|s| format!("{s:.6}")).unwrap_or_default();
    format!(
        "{query}\u{1}{k}\u{1}{}\u{1}{sectors_key}\u{1}{salience_key}",
        crate::metadata::namespaces_key(namespaces)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_after_ttl() {
        let cache: TtlCache<String, i32> = TtlCache::new(4, Duration::from_millis(20));
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn eviction_respects_capacity() {
        let cache: TtlCache<i32, i32> = TtlCache::new(2, Duration::from_secs(60));
        cache.put(1, 1);
        cache.put(2, 2);
        cache.put(3, 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn query_cache_key_differs_by_namespace() {
        use std::collections::BTreeSet;
        let a = query_cache_key("hello", 5, &BTreeSet::from(["team-a".to_string()]), &BTreeSet::new(), None);
        let b = query_cache_key("hello", 5, &BTreeSet::from(["team-b".to_string()]), &BTreeSet::new(), None);
        assert_ne!(a, b);
    }

    #[test]
    fn query_cache_key_differs_by_sectors_and_min_salience() {
        use crate::model::Sector;
        use std::collections::BTreeSet;
        let base = query_cache_key("hello", 5, &BTreeSet::new(), &BTreeSet::new(), None);
        let with_sector = query_cache_key("hello", 5, &BTreeSet::new(), &BTreeSet::from([Sector::Semantic]), None);
        let with_salience = query_cache_key("hello", 5, &BTreeSet::new(), &BTreeSet::new(), Some(0.5));
        assert_ne!(base, with_sector);
        assert_ne!(base, with_salience);
    }
}
