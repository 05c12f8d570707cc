//! In-process LRU cache of query embeddings keyed by `(embedder_id, query)`.
//!
//! The cache is consulted before calling the embedder and written through on
//! misses. Entries live only as long as the process.
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    embedder_id: String,
    text: String,
}

impl CacheKey {
    fn new(embedder_id: &str, text: &str) -> Self {
        Self { embedder_id: embedder_id.to_string(), text: text.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct EmbeddingCache {
    entries: Mutex<LruCache<CacheKey, Arc<[f32]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// A zero capacity is raised to one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<[f32]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached vector for `text`, marking it most recently used.
    pub fn get(&self, embedder_id: &str, text: &str) -> Option<Arc<[f32]>> {
        self.lock().get(&CacheKey::new(embedder_id, text)).cloned()
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, embedder_id: &str, text: &str) -> bool {
        self.lock().contains(&CacheKey::new(embedder_id, text))
    }

    pub fn insert(&self, embedder_id: &str, text: &str, vector: Arc<[f32]>) {
        if let Some((evicted, _)) = self.lock().push(CacheKey::new(embedder_id, text), vector) {
            if evicted.text != text || evicted.embedder_id != embedder_id {
                tracing::debug!(evicted = %evicted.text, "embedding cache eviction");
            }
        }
    }

    /// Returns the vector and whether it came from the cache.
    ///
    /// `compute` runs without the lock held, so two concurrent misses on the
    /// same key may both compute; the later insert wins. Errors are returned
    /// as-is and nothing is stored.
    pub fn get_or_compute<F, E>(&self, embedder_id: &str, text: &str, compute: F) -> Result<(Arc<[f32]>, bool), E>
    where
        F: FnOnce(&str) -> Result<Vec<f32>, E>,
    {
        if let Some(hit) = self.get(embedder_id, text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector: Arc<[f32]> = compute(text)?.into();
        self.insert(embedder_id, text, Arc::clone(&vector));
        Ok((vector, false))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            len: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
