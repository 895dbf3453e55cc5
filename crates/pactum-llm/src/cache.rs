//! Content-addressed embedding cache.
//!
//! Embeddings are deterministic for identical input within one model
//! version, so they are cached under `sha256(text) + model_version`. A model
//! upgrade changes the key and silently invalidates every stale vector.

use crate::embeddings::Embedding;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hit/miss statistics for one cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a vector
    pub hits: usize,
    /// Lookups that found nothing
    pub misses: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of embeddings keyed by content hash and model version.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Embedding>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl EmbeddingCache {
    /// Creates a cache holding up to `capacity` embeddings.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Looks up the embedding for `text` under `model_version`.
    pub fn get(&self, text: &str, model_version: &str) -> Option<Embedding> {
        let key = Self::key(text, model_version);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(embedding) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(embedding.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores the embedding for `text` under `model_version`.
    pub fn put(&self, text: &str, model_version: &str, embedding: Embedding) {
        let key = Self::key(text, model_version);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(key, embedding);
    }

    /// Current number of cached vectors.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn key(text: &str, model_version: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        format!("{model_version}:{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_put_hits() {
        let cache = EmbeddingCache::new(8);
        let embedding = Embedding::new(vec![1.0, 0.0]);

        assert!(cache.get("clause text", "model-v1").is_none());
        cache.put("clause text", "model-v1", embedding.clone());
        assert_eq!(cache.get("clause text", "model-v1"), Some(embedding));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_model_version_never_hits() {
        let cache = EmbeddingCache::new(8);
        cache.put("clause text", "model-v1", Embedding::new(vec![1.0]));
        assert!(cache.get("clause text", "model-v2").is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2);
        cache.put("a", "m", Embedding::new(vec![1.0]));
        cache.put("b", "m", Embedding::new(vec![2.0]));
        cache.put("c", "m", Embedding::new(vec![3.0]));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "m").is_none());
    }
}
