//! hybrid-elastic - Elasticsearch search backend
//!
//! This crate implements the `SearchBackend` trait against an
//! Elasticsearch-compatible cluster and provides sparse query expansion via
//! a cluster-side inference pipeline.
//!
//! # Features
//!
//! - Lexical `match` search over configurable text fields
//! - kNN search restricted to documents with a dense vector
//! - `sparse_vector` search with precomputed expansions
//! - Query expansion through ingest pipeline simulation
//! - Cluster health checks
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_elastic::ElasticBackend;
//!
//! let backend = ElasticBackend::new(&config.backend)?;
//! let hits = backend.search_lexical("what is a dockerfile", 10).await?;
//! ```

mod client;
mod expander;
mod query;

pub use client::{ClusterHealth, ElasticBackend};
pub use expander::{parse_expansion, PipelineExpander};
pub use query::{parse_hits, QueryBuilder};

// Re-export for convenience
pub use hybrid_core::SearchBackend;
