//! Per-thread deduplication of repeated SQL.
//!
//! Identical SQL issued again on the same thread within a short TTL (a tight
//! loop, a batch) skips re-validation. Each thread owns its own bounded LRU,
//! so the hot path takes no locks.
//!
//! Pooled threads must drop their state at request boundaries, either with
//! [`DedupFilter::clear_thread_cache`] or by holding a [`RequestScope`].

use std::{
    cell::RefCell,
    hash::{DefaultHasher, Hash, Hasher},
    marker::PhantomData,
    time::{Duration, Instant}
};

use indexmap::IndexMap;
use tracing::trace;

use crate::config::DedupConfig;

thread_local! {
    static DEDUP_CACHE: RefCell<StampLru> = RefCell::new(StampLru::default());
}

/// Least-recently-used map of SQL hash to last check time
#[derive(Debug, Default)]
struct StampLru {
    stamps: IndexMap<u64, Instant>
}

impl StampLru {
    fn get(&self, key: u64) -> Option<Instant> {
        self.stamps.get(&key).copied()
    }

    fn touch(&mut self, key: u64, now: Instant, capacity: usize) {
        // Re-insert at the back so the front is always the coldest entry
        self.stamps.shift_remove(&key);
        while self.stamps.len() >= capacity.max(1) {
            self.stamps.shift_remove_index(0);
        }
        self.stamps.insert(key, now);
    }
}

/// Decides whether a SQL text needs checking on this thread
#[derive(Debug, Clone)]
pub struct DedupFilter {
    enabled:    bool,
    cache_size: usize,
    ttl:        Duration
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}

impl DedupFilter {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            enabled:    config.enabled,
            cache_size: config.cache_size,
            ttl:        Duration::from_millis(config.ttl_ms)
        }
    }

    /// `false` if the same SQL was checked on this thread within the TTL.
    ///
    /// A `true` answer refreshes the entry's timestamp.
    pub fn should_check(&self, sql: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let key = Self::hash_key(sql);
        let now = Instant::now();
        DEDUP_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if let Some(last) = cache.get(key)
                && now.duration_since(last) < self.ttl
            {
                trace!("duplicate SQL within ttl, skipping validation");
                return false;
            }
            cache.touch(key, now, self.cache_size);
            true
        })
    }

    /// Drop every entry held by the current thread
    pub fn clear_thread_cache() {
        DEDUP_CACHE.with(|cache| cache.borrow_mut().stamps.clear());
    }

    /// Entries held by the current thread
    pub fn thread_cache_len() -> usize {
        DEDUP_CACHE.with(|cache| cache.borrow().stamps.len())
    }

    // Case and surrounding whitespace do not make SQL different
    fn hash_key(sql: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        sql.trim().to_lowercase().hash(&mut hasher);
        hasher.finish()
    }
}

/// Clears the current thread's dedup cache when dropped.
///
/// Hold one for the duration of a request on pooled threads.
pub struct RequestScope {
    _not_send: PhantomData<*const ()>
}

impl RequestScope {
    pub fn enter() -> Self {
        Self {
            _not_send: PhantomData
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        DedupFilter::clear_thread_cache();
    }
}
