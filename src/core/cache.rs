//! Single-slot TTL cache.

use crate::infrastructure::entities::Product;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// The full product list, as served by the product routes.
pub type ProductCache = TtlCache<Vec<Product>>;

struct Entry<T> {
    value: Arc<T>,
    expires_at: Instant,
}

struct Slot<T> {
    entry: Option<Entry<T>>,
    generation: u64,
}

/// Marks when a miss was observed. A fill started before the latest [`TtlCache::clear`]
/// carries an older generation and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug)]
pub enum Lookup<T> {
    Hit(Arc<T>),
    Miss(Generation),
}

/// Holds at most one value, which disappears after `ttl` or on [`TtlCache::clear`].
///
/// Shared between request handlers on different threads, hence the lock.
pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Slot<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub keys: u64,
    pub hits: u64,
    pub misses: u64,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> TtlCache<T> {
        TtlCache {
            ttl,
            slot: RwLock::new(Slot {
                entry: None,
                generation: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Lookup<T> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        let value = slot
            .entry
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| Arc::clone(&entry.value));

        match value {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Lookup::Hit(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Lookup::Miss(Generation(slot.generation))
            }
        }
    }

    /// Stores `value` unless the cache was cleared after the miss that produced
    /// `generation`. The value is handed back either way.
    pub fn set_if_current(&self, generation: Generation, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.generation == generation.0 {
            slot.entry = Some(Entry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + self.ttl,
            });
        }
        value
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.entry = None;
        slot.generation += 1;
    }

    /// Whether a live value is cached. Does not count as a hit or miss.
    pub fn has(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entry
            .as_ref()
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            keys: u64::from(self.has()),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
