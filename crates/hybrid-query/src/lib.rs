//! hybrid-query - Hybrid retrieval and rank fusion
//!
//! This crate runs lexical, dense and sparse search strategies against a
//! search backend and combines their ranked lists using Reciprocal Rank
//! Fusion (RRF).
//!
//! # Features
//!
//! - Five search modes, from single-strategy to full hybrid
//! - Strategies run concurrently under an optional deadline
//! - Graceful degradation when a model or strategy fails
//! - Optional TTL result cache
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_query::{Retriever, RetrieverConfig};
//! use std::sync::Arc;
//!
//! let retriever = Retriever::new(Arc::new(backend), Some(Arc::new(embedder)), None, RetrieverConfig::default());
//! let results = retriever.retrieve("What is a Dockerfile?", 5, SearchMode::DenseLexical).await?;
//! ```

mod cache;
mod executor;
mod fusion;
mod retriever;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, CachedRetriever};
pub use executor::{normalize_hit, normalize_hits, Executors, StrategyFailure};
pub use fusion::{reciprocal_rank_fusion, rrf_contribution, DEFAULT_RRF_K};
pub use retriever::{Retriever, RetrieverConfig};

// Re-export for convenience
pub use hybrid_core::{FusedResult, RetrievalResponse, SearchMode};
