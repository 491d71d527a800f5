//! In-memory result cache in front of a [`Retriever`], using moka.
//!
//! Per-entry TTL and a bounded entry count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use hybrid_core::{CacheConfig, FusedResult, Result, RetrievalResponse, SearchMode};

use crate::retriever::{preview, Retriever};

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: u64,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Retriever with a TTL-bounded response cache.
///
/// Keyed by `(query, mode, top_k)`. Only complete responses are stored:
/// empty results and responses where a strategy degraded are always
/// recomputed.
///
/// A hit reports its own `latency_ms`; the per-strategy reports keep the
/// timings of the call that filled the entry.
pub struct CachedRetriever {
    inner: Retriever,
    ttl: Duration,
    cache: Cache<blake3::Hash, RetrievalResponse>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedRetriever {
    pub fn new(inner: Retriever, ttl: Duration, max_entries: usize) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries.max(1) as u64)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            ttl,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(inner: Retriever, config: &CacheConfig) -> Self {
        Self::new(inner, config.ttl(), config.max_entries)
    }

    pub fn inner(&self) -> &Retriever {
        &self.inner
    }

    /// Cached equivalent of [`Retriever::retrieve`].
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> Result<Vec<FusedResult>> {
        Ok(self.search(query, top_k, mode).await?.results)
    }

    /// Cached equivalent of [`Retriever::retrieve_str`].
    pub async fn retrieve_str(
        &self,
        query: &str,
        top_k: usize,
        mode: &str,
    ) -> Result<Vec<FusedResult>> {
        self.retrieve(query, top_k, SearchMode::parse_or_default(mode))
            .await
    }

    /// Cached equivalent of [`Retriever::search`].
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> Result<RetrievalResponse> {
        let start = Instant::now();
        let key = cache_key(query, mode, top_k);

        if let Some(mut response) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            response.latency_ms = start.elapsed().as_millis() as u64;
            info!("Cache hit for query: {:?}", preview(query));
            return Ok(response);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for query: {:?}", preview(query));
        let response = self.inner.search(query, top_k, mode).await?;

        if !response.results.is_empty() && !response.degraded() {
            self.cache.insert(key, response.clone());
        }

        Ok(response)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        info!("Result cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        // entry_count is only exact once pending evictions are applied.
        self.cache.run_pending_tasks();
        CacheStats {
            size: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

fn cache_key(query: &str, mode: SearchMode, top_k: usize) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(query.as_bytes());
    hasher.update(&[0]);
    hasher.update(mode.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(&(top_k as u64).to_le_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::retriever::RetrieverConfig;
    use crate::testing::{hits, MockBackend, MockEmbedder};
    use hybrid_core::{EmbeddingProvider, Strategy};

    fn cached_with(
        backend: Arc<MockBackend>,
        embedder: Option<MockEmbedder>,
        ttl: Duration,
        max_entries: usize,
    ) -> CachedRetriever {
        let retriever = Retriever::new(
            backend,
            embedder.map(|e| Arc::new(e) as Arc<dyn EmbeddingProvider>),
            None,
            RetrieverConfig::default(),
        );
        CachedRetriever::new(retriever, ttl, max_entries)
    }

    fn cached(backend: Arc<MockBackend>, embedder: Option<MockEmbedder>) -> CachedRetriever {
        cached_with(backend, embedder, Duration::from_secs(300), 16)
    }

    #[test]
    fn test_cache_key_distinguishes_inputs() {
        let base = cache_key("docker", SearchMode::DenseLexical, 5);
        assert_eq!(base, cache_key("docker", SearchMode::DenseLexical, 5));
        assert_ne!(base, cache_key("docker", SearchMode::LexicalOnly, 5));
        assert_ne!(base, cache_key("docker", SearchMode::DenseLexical, 6));
        assert_ne!(base, cache_key("docker ", SearchMode::DenseLexical, 5));
    }

    #[tokio::test]
    async fn test_hit_skips_backend() {
        let backend = Arc::new(MockBackend::new().with_lexical(hits("l", 5)));
        let cache = cached(backend.clone(), None);

        let first = cache.retrieve("query", 3, SearchMode::LexicalOnly).await.unwrap();
        let second = cache.retrieve("query", 3, SearchMode::LexicalOnly).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls(), vec![(Strategy::Lexical, 3)]);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.ttl_secs, 300);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let backend = Arc::new(MockBackend::new().with_lexical(hits("l", 5)));
        let cache = cached_with(backend.clone(), None, Duration::from_millis(50), 16);

        cache.retrieve("query", 3, SearchMode::LexicalOnly).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        cache.retrieve("query", 3, SearchMode::LexicalOnly).await.unwrap();

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_degraded_and_empty_not_cached() {
        let backend = Arc::new(MockBackend::new().with_lexical(hits("l", 5)));
        // Dense degrades: no embedder.
        let cache = cached(backend.clone(), None);

        cache.retrieve("query", 3, SearchMode::DenseLexical).await.unwrap();
        cache.retrieve("query", 3, SearchMode::DenseLexical).await.unwrap();
        assert_eq!(backend.calls().len(), 2);

        let empty = cache.retrieve("query", 3, SearchMode::SparseOnly).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let backend = Arc::new(MockBackend::new().with_lexical(hits("l", 5)));
        let cache = cached_with(backend.clone(), None, Duration::from_secs(300), 2);

        for query in ["one", "two", "three", "four", "five"] {
            cache.retrieve(query, 1, SearchMode::LexicalOnly).await.unwrap();
        }

        assert!(cache.stats().size <= 2);
        assert_eq!(backend.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = Arc::new(MockBackend::new().with_lexical(hits("l", 5)));
        let cache = cached(backend.clone(), Some(MockEmbedder::working()));

        cache.retrieve_str("query", 2, "lexical_only").await.unwrap();
        cache.clear();
        assert_eq!(cache.stats().size, 0);

        cache.retrieve_str("query", 2, "lexical_only").await.unwrap();
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_reports_its_own_latency() {
        let backend = Arc::new(
            MockBackend::new()
                .with_lexical(hits("l", 5))
                .delay_lexical(Duration::from_secs(5)),
        );
        let cache = cached(backend.clone(), None);

        let miss = cache.search("query", 3, SearchMode::LexicalOnly).await.unwrap();
        let hit = cache.search("query", 3, SearchMode::LexicalOnly).await.unwrap();

        assert!(miss.latency_ms >= 5000);
        assert_eq!(hit.latency_ms, 0);
        assert_eq!(hit.results, miss.results);
        assert_eq!(hit.strategies, miss.strategies);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let backend = Arc::new(MockBackend::new().failing());
        let cache = cached(backend, None);

        let err = cache
            .retrieve("query", 3, SearchMode::LexicalOnly)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(cache.stats().size, 0);
    }
}
