use core::num::NonZeroUsize;

use alloy_primitives::B256;
use lru::LruCache;
use parking_lot::Mutex;

/// A bounded set of hashes evicting the least recently added or refreshed entry when full.
///
/// All mutation happens under one lock, so [`KnownCache::contains_or_add`] is atomic.
#[derive(Debug)]
pub struct KnownCache {
    hashes: Mutex<LruCache<B256, ()>>,
}

impl KnownCache {
    /// Creates a cache holding at most `capacity` hashes. A zero capacity holds one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { hashes: Mutex::new(LruCache::new(capacity)) }
    }

    /// Returns whether `hash` is in the cache, without refreshing it.
    pub fn contains(&self, hash: &B256) -> bool {
        self.hashes.lock().contains(hash)
    }

    /// Adds `hash`, refreshing it if already present.
    pub fn insert(&self, hash: B256) {
        self.hashes.lock().put(hash, ());
    }

    /// Returns `true` if `hash` was already present; otherwise adds it and returns `false`.
    pub fn contains_or_add(&self, hash: B256) -> bool {
        let mut hashes = self.hashes.lock();
        if hashes.contains(&hash) {
            return true;
        }
        hashes.put(hash, ());
        false
    }

    /// Returns the number of cached hashes.
    pub fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.hashes.lock().is_empty()
    }

    /// Returns the maximum number of cached hashes.
    pub fn capacity(&self) -> usize {
        self.hashes.lock().cap().get()
    }
}
