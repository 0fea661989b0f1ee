//! Short-lived memo of verification outcomes.
//!
//! Failed outcomes are cached as well as successful ones, so an identity
//! whose indexers keep failing does not trigger a fresh round of slow
//! provider calls on every request.

use crate::verify::data_types::VerificationResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default freshness window (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// A cached outcome.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Identity the outcome belongs to.
    pub identity: String,
    /// The outcome, returned verbatim on a hit.
    pub result: VerificationResult,
    /// When it was stored.
    pub cached_at: Instant,
}

/// Backing map for the verification cache.
pub trait ResultStore: Send + Sync {
    /// Fetch the entry for `identity` regardless of age.
    fn load(&self, identity: &str) -> Option<CacheEntry>;

    /// Insert or overwrite an entry.
    fn store(&self, entry: CacheEntry);

    /// Remove the entry for `identity`, returning whether one existed.
    fn remove(&self, identity: &str) -> bool;

    /// Remove everything, returning how many entries were dropped.
    fn clear(&self) -> usize;

    /// Number of stored entries, stale ones included.
    fn len(&self) -> usize;

    /// True if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-process LRU map.
pub struct LruResultStore {
    inner: Mutex<LruCache<String, CacheEntry>>,
}

impl LruResultStore {
    /// Create a store holding at most `capacity` identities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }
}

impl Default for LruResultStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResultStore for LruResultStore {
    fn load(&self, identity: &str) -> Option<CacheEntry> {
        self.inner.lock().get(identity).cloned()
    }

    fn store(&self, entry: CacheEntry) {
        self.inner.lock().put(entry.identity.clone(), entry);
    }

    fn remove(&self, identity: &str) -> bool {
        self.inner.lock().pop(identity).is_some()
    }

    fn clear(&self) -> usize {
        let mut cache = self.inner.lock();
        let size = cache.len();
        cache.clear();
        size
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Lookups that found an expired entry.
    pub stale: u64,
    /// Entries written.
    pub additions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.stale;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = (self.hits as f64 / total as f64) * 100.0;
            rate
        }
    }
}

/// TTL cache of verification outcomes keyed by identity.
#[derive(Clone)]
pub struct VerificationCache {
    store: Arc<dyn ResultStore>,
    ttl: Duration,
    stats: Arc<Mutex<CacheStats>>,
}

impl VerificationCache {
    /// Create a cache with default capacity and the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(ttl, Arc::new(LruResultStore::default()))
    }

    /// Create a cache over a custom store.
    #[must_use]
    pub fn with_store(ttl: Duration, store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            ttl,
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Fresh outcome for `identity`, if any.
    pub fn get(&self, identity: &str) -> Option<VerificationResult> {
        self.get_at(identity, Instant::now())
    }

    /// Fresh outcome for `identity` as of `now`.
    ///
    /// Stale entries are reported as absent but left in place.
    pub fn get_at(&self, identity: &str, now: Instant) -> Option<VerificationResult> {
        self.entry_at(identity, now).map(|entry| entry.result)
    }

    /// Fresh entry for `identity` as of `now`.
    pub fn entry_at(&self, identity: &str, now: Instant) -> Option<CacheEntry> {
        let entry = self.store.load(identity);
        let mut stats = self.stats.lock();
        match entry {
            Some(entry) if now.saturating_duration_since(entry.cached_at) <= self.ttl => {
                stats.hits += 1;
                Some(entry)
            }
            Some(_) => {
                stats.stale += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Fresh entry for `identity` as of `now`, leaving the statistics alone.
    #[must_use]
    pub fn peek_at(&self, identity: &str, now: Instant) -> Option<CacheEntry> {
        self.store
            .load(identity)
            .filter(|entry| now.saturating_duration_since(entry.cached_at) <= self.ttl)
    }

    /// Store an outcome for `identity`.
    pub fn put(&self, identity: &str, result: VerificationResult) {
        self.put_at(identity, result, Instant::now());
    }

    /// Store an outcome for `identity` as of `now`.
    pub fn put_at(&self, identity: &str, result: VerificationResult, now: Instant) {
        self.store.store(CacheEntry {
            identity: identity.to_string(),
            result,
            cached_at: now,
        });
        self.stats.lock().additions += 1;
    }

    /// Forget the outcome for `identity`.
    pub fn invalidate(&self, identity: &str) -> bool {
        self.store.remove(identity)
    }

    /// Forget every outcome.
    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    /// Freshness window.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Entries currently stored, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
