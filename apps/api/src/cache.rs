#![allow(dead_code)]

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A small TTL cache: key → (value, expiry).
///
/// Injected as a dependency (not a module-level static) so privilege checks
/// can be unit-tested and invalidated deterministically.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value if present and not expired. Expired entries
    /// are evicted on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some((v, expiry)) if *expiry > Instant::now() => Some(v.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now() + self.ttl);
    }

    /// Inserts with an explicit expiry instant. Tests use this to exercise
    /// expiration without sleeping.
    pub fn insert_at(&self, key: K, value: V, expiry: Instant) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, (value, expiry));
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().expect("cache lock poisoned").remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", true);
        assert_eq!(cache.get(&"k"), Some(true));
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_at("k", true, Instant::now() - Duration::from_secs(1));
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 7);
        cache.invalidate(&"k");
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache: TtlCache<&str, bool> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get(&"nope"), None);
    }
}
