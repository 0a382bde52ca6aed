//! A named, LRU-bounded cache with per-entry TTL expiration.
//!
//! Grounded on kumomta's `lruttl` crate: a `parking_lot::Mutex`-guarded
//! `lru::LruCache` where eviction is strict LRU-on-access and expired
//! entries are treated as a miss (and removed) on read. Unlike the
//! teacher crate this does not hook into a process-wide memory-pressure
//! purge registry — that concern has no counterpart in this workspace.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// A single named cache namespace.
///
/// `name` exists purely for diagnostics (log lines, metrics-free as this
/// is); it plays the role that spec.md §4.1 calls a "namespace".
pub struct LruCacheWithTtl<K: Hash + Eq, V: Clone> {
    name: &'static str,
    default_ttl: Duration,
    inner: Mutex<LruCache<K, Entry<V>>>,
}

impl<K: Hash + Eq, V: Clone> LruCacheWithTtl<K, V> {
    pub fn new_named(name: &'static str, max_size: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        tracing::debug!("registered cache {name} capacity={max_size} ttl={default_ttl:?}");
        Self {
            name,
            default_ttl,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the cached value if present and not expired. A read that
    /// races a concurrent write for the same key observes either the old
    /// or the new value, never a torn one, because both hold the same
    /// mutex for the duration of the operation.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.get(key) {
            Some(entry) => entry.is_expired(),
            None => return None,
        };
        if expired {
            inner.pop(key);
            None
        } else {
            inner.get(key).map(|e| e.value.clone())
        }
    }

    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        inner.put(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn delete(&self, key: &K) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Get an existing, non-expired value, or compute and insert one.
    /// Held atomically with respect to other callers of this method.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&self, key: K, func: F) -> V
    where
        K: Clone,
    {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.get(&key) {
            if !entry.is_expired() {
                return entry.value.clone();
            }
        }
        let value = func();
        inner.put(
            key,
            Entry {
                value: value.clone(),
                stored_at: Instant::now(),
                ttl: self.default_ttl,
            },
        );
        value
    }
}
