//! Core traits defining the interfaces to external collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SearchHit, SparseExpansion};

/// Dense embedding model for query text.
///
/// Implementations are long-lived: construct once at startup and share
/// behind an `Arc`. Dropping the last handle releases the model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single query text.
    ///
    /// Fails with `RetrievalError::ProviderUnavailable` when the model cannot
    /// produce a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Learned sparse expansion model for query text.
#[async_trait]
pub trait SparseExpansionProvider: Send + Sync {
    /// Expand a query into weighted terms.
    async fn expand(&self, text: &str) -> Result<SparseExpansion>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

/// Query primitives of the remote document index.
///
/// Implementations do not cache or retry. Any failure is returned as
/// `RetrievalError::Backend`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Keyword search over the indexed text fields.
    async fn search_lexical(&self, text: &str, n: usize) -> Result<Vec<SearchHit>>;

    /// Nearest-neighbor search. Only documents carrying a dense vector are
    /// candidates.
    async fn search_dense(&self, vector: &[f32], n: usize) -> Result<Vec<SearchHit>>;

    /// Match against the learned sparse expansion field.
    async fn search_sparse(&self, expansion: &SparseExpansion, n: usize) -> Result<Vec<SearchHit>>;
}
