use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::Result;
use lru::LruCache;
use parking_lot::Mutex;

use crate::EmbeddingEngine;

/// Turns query text into a vector in one embedding space.
///
/// Implementations must be deterministic for a given text and model version.
pub trait QueryEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

impl QueryEncoder for EmbeddingEngine {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Self::encode(self, text)
    }
}

/// Bounded least-recently-used cache in front of a [`QueryEncoder`].
///
/// Entries are filled lazily on first use. The lock is held only for lookup
/// and insert, never while encoding, so two threads racing on the same new
/// query both encode it and the later insert overwrites an identical value.
/// A capacity of zero disables caching.
pub struct CachedQueryEncoder<E> {
    inner: E,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl<E: QueryEncoder> CachedQueryEncoder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub const fn inner(&self) -> &E {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.as_ref().map_or(0, |c| c.lock().len()),
        }
    }
}

impl<E: QueryEncoder> QueryEncoder for CachedQueryEncoder<E> {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let Some(cache) = self.cache.as_ref() else {
            return self.inner.encode(text);
        };
        if let Some(hit) = cache.lock().get(text).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.encode(text)?;
        cache.lock().put(text.to_string(), vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::{Result, anyhow};

    use super::{CachedQueryEncoder, QueryEncoder};

    struct CountingEncoder {
        calls: AtomicUsize,
    }

    impl QueryEncoder for CountingEncoder {
        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "boom" {
                return Err(anyhow!("encoder failure"));
            }
            Ok(vec![text.len() as f32])
        }
    }

    fn counting() -> CountingEncoder {
        CountingEncoder {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn repeated_query_hits_cache() {
        let encoder = CachedQueryEncoder::new(counting(), 4);
        assert_eq!(encoder.encode("fever").expect("vector"), vec![5.0]);
        assert_eq!(encoder.encode("fever").expect("vector"), vec![5.0]);
        assert_eq!(encoder.inner().calls.load(Ordering::SeqCst), 1);
        let stats = encoder.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let encoder = CachedQueryEncoder::new(counting(), 2);
        for q in ["a", "bb", "ccc", "a"] {
            encoder.encode(q).expect("vector");
        }
        assert_eq!(encoder.inner().calls.load(Ordering::SeqCst), 4);
        assert_eq!(encoder.stats().entries, 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let encoder = CachedQueryEncoder::new(counting(), 4);
        assert!(encoder.encode("boom").is_err());
        assert!(encoder.encode("boom").is_err());
        assert_eq!(encoder.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(encoder.stats().entries, 0);
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let encoder = CachedQueryEncoder::new(counting(), 0);
        encoder.encode("x").expect("vector");
        encoder.encode("x").expect("vector");
        assert_eq!(encoder.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_lookups_of_same_key_agree() {
        let encoder = Arc::new(CachedQueryEncoder::new(counting(), 8));
        let results = std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    let encoder = Arc::clone(&encoder);
                    scope.spawn(move || encoder.encode("headache").expect("vector"))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .collect::<Vec<_>>()
        });
        assert!(results.iter().all(|v| v == &vec![8.0]));
        assert_eq!(encoder.stats().entries, 1);
    }
}
