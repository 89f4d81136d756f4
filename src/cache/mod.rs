//! Result Cache - bounded LRU of resolved and in-flight queries
//!
//! Keys are `entity|endpoint|query|limit`. Values are either resolved rows or
//! a pending shared fetch, so two callers asking for the same key while the
//! first request is still on the wire await the same future instead of
//! issuing a second request.
//!
//! Pending entries carry a generation number. Completion and cancellation
//! only touch the entry if it still holds the same generation, so a stale
//! fetch can never overwrite a newer entry under the same key.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::LookupError;
use crate::row::Rows;

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: String,
    pub endpoint: String,
    pub query: String,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(
        entity: impl Into<String>,
        endpoint: Option<&str>,
        query: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            entity: entity.into(),
            endpoint: endpoint.unwrap_or_default().to_string(),
            query: query.into(),
            limit,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.entity, self.endpoint, self.query, self.limit
        )
    }
}

/// Result of one network fetch, shared by every waiter
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Rows(Rows),
    Failed(LookupError),
}

/// Future shared by every caller awaiting the same key
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// An in-flight query stored in the cache
#[derive(Clone)]
pub struct PendingQuery {
    pub(crate) generation: u64,
    pub(crate) fetch: SharedFetch,
    pub(crate) waiters: Arc<AtomicUsize>,
}

impl PendingQuery {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQuery")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Cache value: resolved rows or an in-flight query
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Ready(Rows),
    Pending(PendingQuery),
}

/// Result of [`LookupCache::claim`]
#[derive(Debug, Clone)]
pub enum Claim {
    /// Resolved rows were cached
    Ready(Rows),
    /// Another caller's fetch is in flight; await it
    Joined(PendingQuery),
    /// This caller registered a new fetch and must drive it
    Started(PendingQuery),
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

struct CacheInner {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    next_generation: u64,
}

/// Thread-safe LRU cache shared by every binding of one engine
pub struct LookupCache {
    inner: Mutex<CacheInner>,
}

impl LookupCache {
    /// Create a cache holding at most `capacity` keys (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                next_generation: 1,
            }),
        }
    }

    /// Look up a key, marking it most recently used
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(entry) => {
                inner.hits += 1;
                Some(entry)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace, evicting the least recently used key when full
    pub fn set(&self, key: CacheKey, entry: CacheEntry) {
        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.entries.push(key.clone(), entry) {
            if evicted != key {
                inner.evictions += 1;
                tracing::debug!(key = %evicted, "Evicted least recently used lookup");
            }
        }
    }

    pub fn delete(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.lock().entries.pop(key)
    }

    /// Allocate a generation number for a new pending entry
    pub fn next_generation(&self) -> u64 {
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        generation
    }

    /// Atomically read a key or register a new pending fetch for it
    ///
    /// `start` receives a fresh generation and only runs on a miss. The
    /// returned [`Claim`] tells the caller whether it owns the new fetch.
    /// A pending claim already counts the caller as a waiter; the caller must
    /// release that count when it stops awaiting.
    pub fn claim(&self, key: &CacheKey, start: impl FnOnce(u64) -> PendingQuery) -> Claim {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(key).cloned() {
            inner.hits += 1;
            return match entry {
                CacheEntry::Ready(rows) => Claim::Ready(rows),
                CacheEntry::Pending(pending) => {
                    pending.waiters.fetch_add(1, Ordering::SeqCst);
                    Claim::Joined(pending)
                }
            };
        }

        inner.misses += 1;
        let generation = inner.next_generation;
        inner.next_generation += 1;
        let pending = start(generation);
        pending.waiters.fetch_add(1, Ordering::SeqCst);
        if let Some((evicted, _)) = inner
            .entries
            .push(key.clone(), CacheEntry::Pending(pending.clone()))
        {
            if &evicted != key {
                inner.evictions += 1;
                tracing::debug!(key = %evicted, "Evicted least recently used lookup");
            }
        }
        Claim::Started(pending)
    }

    /// Replace a pending entry with its rows if it is still the same fetch
    pub fn complete_pending(&self, key: &CacheKey, generation: u64, rows: Rows) -> bool {
        let mut inner = self.inner.lock();
        let is_same = matches!(
            inner.entries.peek(key),
            Some(CacheEntry::Pending(p)) if p.generation == generation
        );
        if is_same {
            inner.entries.put(key.clone(), CacheEntry::Ready(rows));
        }
        is_same
    }

    /// Drop a pending entry if it is still the same fetch
    pub fn remove_pending(&self, key: &CacheKey, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        let is_same = matches!(
            inner.entries.peek(key),
            Some(CacheEntry::Pending(p)) if p.generation == generation
        );
        if is_same {
            inner.entries.pop(key);
        }
        is_same
    }

    /// Peek without touching recency or counters
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn is_ready(&self, key: &CacheKey) -> bool {
        matches!(
            self.inner.lock().entries.peek(key),
            Some(CacheEntry::Ready(_))
        )
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    /// Clear all entries and counters
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            len: inner.entries.len(),
            capacity: inner.entries.cap().get(),
        }
    }
}

impl fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::ResultRow;
    use futures::FutureExt;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(q: &str) -> CacheKey {
        CacheKey::new("items", None, q, 50)
    }

    fn rows(labels: &[&str]) -> Rows {
        labels
            .iter()
            .map(|l| ResultRow::from_value(json!({ "name": l })))
            .collect::<Vec<_>>()
            .into()
    }

    fn pending(cache: &LookupCache) -> PendingQuery {
        let fetch = async { FetchOutcome::Rows(Vec::new().into()) }
            .boxed()
            .shared();
        PendingQuery {
            generation: cache.next_generation(),
            fetch,
            waiters: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn test_key_display() {
        let k = CacheKey::new("items", Some("/x"), "appl", 50);
        assert_eq!(k.to_string(), "items|/x|appl|50");
        assert_eq!(key("appl").to_string(), "items||appl|50");
    }

    #[test]
    fn test_get_set_delete() {
        let cache = LookupCache::new(4);
        assert!(cache.get(&key("a")).is_none());

        cache.set(key("a"), CacheEntry::Ready(rows(&["Apple"])));
        match cache.get(&key("a")) {
            Some(CacheEntry::Ready(r)) => assert_eq!(r[0].label(), "Apple"),
            other => panic!("expected ready entry, got {:?}", other),
        }

        assert!(cache.delete(&key("a")).is_some());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_lru_evicts_oldest_accessed() {
        let cache = LookupCache::new(2);
        cache.set(key("a"), CacheEntry::Ready(rows(&["A"])));
        cache.set(key("b"), CacheEntry::Ready(rows(&["B"])));

        // Touch "a" so "b" becomes least recently used
        assert!(cache.get(&key("a")).is_some());
        cache.set(key("c"), CacheEntry::Ready(rows(&["C"])));

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_same_key_is_not_an_eviction() {
        let cache = LookupCache::new(1);
        cache.set(key("a"), CacheEntry::Ready(rows(&["A"])));
        cache.set(key("a"), CacheEntry::Ready(rows(&["A2"])));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_complete_pending_same_generation() {
        let cache = LookupCache::new(4);
        let p = pending(&cache);
        let generation = p.generation();
        cache.set(key("a"), CacheEntry::Pending(p));

        assert!(cache.complete_pending(&key("a"), generation, rows(&["A"])));
        assert!(cache.is_ready(&key("a")));
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let cache = LookupCache::new(4);
        let old = pending(&cache);
        let old_generation = old.generation();
        let new = pending(&cache);
        cache.set(key("a"), CacheEntry::Pending(new));

        assert!(!cache.complete_pending(&key("a"), old_generation, rows(&["old"])));
        assert!(!cache.remove_pending(&key("a"), old_generation));
        assert!(matches!(cache.get(&key("a")), Some(CacheEntry::Pending(_))));
    }

    #[test]
    fn test_complete_after_eviction_does_not_resurrect() {
        let cache = LookupCache::new(1);
        let p = pending(&cache);
        let generation = p.generation();
        cache.set(key("a"), CacheEntry::Pending(p));
        cache.set(key("b"), CacheEntry::Ready(rows(&["B"])));

        assert!(!cache.complete_pending(&key("a"), generation, rows(&["A"])));
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn test_claim_starts_then_joins() {
        let cache = LookupCache::new(4);
        let make = |generation| PendingQuery {
            generation,
            fetch: async { FetchOutcome::Rows(Vec::new().into()) }
                .boxed()
                .shared(),
            waiters: Arc::new(AtomicUsize::new(0)),
        };

        let first = match cache.claim(&key("a"), make) {
            Claim::Started(p) => p.generation(),
            other => panic!("expected Started, got {:?}", other),
        };
        match cache.claim(&key("a"), |_| panic!("must not start a second fetch")) {
            Claim::Joined(p) => {
                assert_eq!(p.generation(), first);
                // Starter and joiner are both counted before the lock is released
                assert_eq!(p.waiters.load(Ordering::SeqCst), 2);
            }
            other => panic!("expected Joined, got {:?}", other),
        }

        cache.complete_pending(&key("a"), first, rows(&["A"]));
        assert!(matches!(
            cache.claim(&key("a"), |_| panic!("ready entries never start a fetch")),
            Claim::Ready(_)
        ));
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let cache = LookupCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = LookupCache::new(2);
        cache.set(key("a"), CacheEntry::Ready(rows(&["A"])));
        cache.get(&key("a"));
        cache.clear();
        assert_eq!(
            cache.stats(),
            CacheStats {
                capacity: 2,
                ..CacheStats::default()
            }
        );
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 1usize..8, queries in proptest::collection::vec("[a-e]{1,2}", 0..40)) {
            let cache = LookupCache::new(capacity);
            for q in &queries {
                cache.set(key(q), CacheEntry::Ready(rows(&[q.as_str()])));
                prop_assert!(cache.len() <= capacity);
            }
            if let Some(last) = queries.last() {
                prop_assert!(cache.contains(&key(last)));
            }
        }
    }
}
