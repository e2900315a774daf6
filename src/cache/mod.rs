//! Kernel cache implementation
//!
//! Provides an LRU cache of kernel matrix rows so the SMO solver does not
//! recompute K(i, ·) for working-set indices it has already visited.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default cache budget in bytes (100 MB)
pub const DEFAULT_CACHE_BYTES: usize = 100 * 1024 * 1024;

/// LRU cache of kernel rows, keyed by sample index
pub struct KernelCache {
    cache: LruCache<usize, Arc<[f64]>>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache for rows of `row_len` values within `memory_bytes`
    ///
    /// At least two rows are kept so both members of a working pair stay resident.
    pub fn with_memory_limit(memory_bytes: usize, row_len: usize) -> Self {
        let row_bytes = row_len.max(1) * std::mem::size_of::<f64>();
        Self::new((memory_bytes / row_bytes).max(2))
    }

    /// Get a kernel row from cache
    pub fn get(&mut self, i: usize) -> Option<Arc<[f64]>> {
        if let Some(row) = self.cache.get(&i) {
            self.hits += 1;
            Some(Arc::clone(row))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Put a kernel row into cache
    pub fn put(&mut self, i: usize, row: Arc<[f64]>) {
        self.cache.put(i, row);
    }

    /// Return the cached row `i`, computing and inserting it on a miss
    pub fn get_or_insert_with<F>(&mut self, i: usize, compute: F) -> Arc<[f64]>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.get(i) {
            return row;
        }
        let row: Arc<[f64]> = compute().into();
        self.put(i, Arc::clone(&row));
        row
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}
