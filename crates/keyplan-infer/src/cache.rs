//! LRU embedding cache.
//!
//! One cache lives for one pipeline run. The first vector stored for a text
//! wins, so repeated text always resolves to bit-identical values even when
//! the backend itself is not deterministic.

use std::collections::HashMap;

use ndarray::Array1;
use parking_lot::Mutex;

/// Thread-safe LRU cache of embeddings keyed by exact text.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, Array1<f32>>,
    order: Vec<String>,
    max_size: usize,
}

impl EmbeddingCache {
    /// Create a new cache with the given capacity.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: Vec::with_capacity(max_size),
                max_size: max_size.max(1),
            }),
        }
    }

    /// Create a cache sized for a single run (1024 entries).
    pub fn for_run() -> Self {
        Self::new(1024)
    }

    /// Get a cached embedding. Returns None on miss.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let embedding = inner.entries.get(text).cloned()?;
        if let Some(pos) = inner.order.iter().position(|k| k == text) {
            let key = inner.order.remove(pos);
            inner.order.push(key);
        }
        Some(embedding)
    }

    /// Insert an embedding unless one is already cached for the text.
    ///
    /// Returns the stored value, which is the earlier one on a race.
    pub fn insert_if_absent(&self, text: &str, embedding: Array1<f32>) -> Array1<f32> {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get(text) {
            return existing.clone();
        }

        // Evict oldest if at capacity
        while inner.entries.len() >= inner.max_size && !inner.order.is_empty() {
            let oldest = inner.order.remove(0);
            inner.entries.remove(&oldest);
        }

        inner.order.push(text.to_string());
        inner.entries.insert(text.to_string(), embedding.clone());
        embedding
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
