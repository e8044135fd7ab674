//! Cache doubles.

use popupmoah_reservation_core::cache::{CacheError, CacheKey, CachedValue, ReservationCache};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// HashMap-backed cache that counts reads hitting it.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReservationCache {
    entries: Arc<RwLock<HashMap<CacheKey, CachedValue>>>,
    hits: Arc<AtomicUsize>,
    evictions: Arc<AtomicUsize>,
}

impl InMemoryReservationCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is currently cached
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .is_ok_and(|entries| entries.contains_key(key))
    }

    /// Cached value for a key
    #[must_use]
    pub fn peek(&self, key: &CacheKey) -> Option<CachedValue> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Plant a value, e.g. to prove a read was served from cache
    pub fn seed(&self, key: CacheKey, value: CachedValue) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, value);
        }
    }

    /// Number of cached keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads answered from the cache
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Evict calls received, whether or not the key was present
    #[must_use]
    pub fn evictions(&self) -> usize {
        self.evictions.load(Ordering::SeqCst)
    }
}

fn poisoned() -> CacheError {
    CacheError::Connection("RwLock poisoned".to_string())
}

impl ReservationCache for InMemoryReservationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        let value = self.entries.read().map_err(|_| poisoned())?.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    async fn put(&self, key: &CacheKey, value: &CachedValue) -> Result<(), CacheError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(*key, value.clone());
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.evictions.fetch_add(1, Ordering::SeqCst);
        self.entries.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

/// Cache whose every call fails, as if the backend were down.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingCache;

impl ReservationCache for FailingCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        Err(CacheError::Connection("cache offline".to_string()))
    }

    async fn put(&self, _key: &CacheKey, _value: &CachedValue) -> Result<(), CacheError> {
        Err(CacheError::Connection("cache offline".to_string()))
    }

    async fn evict(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Err(CacheError::Connection("cache offline".to_string()))
    }
}
