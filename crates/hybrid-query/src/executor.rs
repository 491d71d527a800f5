//! Strategy executors: one backend query per strategy, hits normalized into
//! result records.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use hybrid_core::{
    EmbeddingProvider, RankedList, ResultRecord, SearchBackend, SearchHit,
    SparseExpansionProvider, Strategy, StrategyOutcome, UNKNOWN,
};

/// Why a strategy contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyFailure {
    /// Embedding or expansion model missing or failing; backend not called.
    ProviderUnavailable(String),
    /// Backend call failed.
    Backend(String),
}

impl From<StrategyFailure> for StrategyOutcome {
    fn from(failure: StrategyFailure) -> Self {
        match failure {
            StrategyFailure::ProviderUnavailable(message) => Self::ProviderUnavailable(message),
            StrategyFailure::Backend(message) => Self::BackendError(message),
        }
    }
}

/// Shared handles to the backend and the optional model providers.
///
/// Cloning is cheap; each concurrent strategy task gets its own clone.
#[derive(Clone)]
pub struct Executors {
    backend: Arc<dyn SearchBackend>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    expander: Option<Arc<dyn SparseExpansionProvider>>,
}

impl Executors {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        expander: Option<Arc<dyn SparseExpansionProvider>>,
    ) -> Self {
        Self {
            backend,
            embedder,
            expander,
        }
    }

    /// Run one strategy for `n` results.
    pub async fn run(
        &self,
        strategy: Strategy,
        query: &str,
        n: usize,
    ) -> Result<RankedList, StrategyFailure> {
        let list = match strategy {
            Strategy::Lexical => self.lexical(query, n).await?,
            Strategy::Dense => self.dense(query, n).await?,
            Strategy::Sparse => self.sparse(query, n).await?,
        };
        debug!("{} search returned {} results", strategy, list.len());
        Ok(list)
    }

    /// Keyword search. No model dependency.
    pub async fn lexical(&self, query: &str, n: usize) -> Result<RankedList, StrategyFailure> {
        let hits = self
            .backend
            .search_lexical(query, n)
            .await
            .map_err(|e| backend_failure(Strategy::Lexical, e))?;
        Ok(normalize_hits(hits, Strategy::Lexical))
    }

    /// Embed the query, then kNN search.
    pub async fn dense(&self, query: &str, n: usize) -> Result<RankedList, StrategyFailure> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            provider_failure(Strategy::Dense, "no embedding model available".to_string())
        })?;

        let vector = embedder.embed(query).await.map_err(|e| {
            provider_failure(Strategy::Dense, format!("{}: {}", embedder.name(), e))
        })?;
        if vector.is_empty() {
            return Err(provider_failure(
                Strategy::Dense,
                format!("{} returned an empty vector", embedder.name()),
            ));
        }

        let hits = self
            .backend
            .search_dense(&vector, n)
            .await
            .map_err(|e| backend_failure(Strategy::Dense, e))?;
        Ok(normalize_hits(hits, Strategy::Dense))
    }

    /// Expand the query, then sparse search.
    pub async fn sparse(&self, query: &str, n: usize) -> Result<RankedList, StrategyFailure> {
        let expander = self.expander.as_ref().ok_or_else(|| {
            provider_failure(Strategy::Sparse, "no sparse expansion model available".to_string())
        })?;

        let expansion = expander.expand(query).await.map_err(|e| {
            provider_failure(Strategy::Sparse, format!("{}: {}", expander.name(), e))
        })?;
        if expansion.is_empty() {
            return Err(provider_failure(
                Strategy::Sparse,
                format!("{} returned an empty expansion", expander.name()),
            ));
        }

        let hits = self
            .backend
            .search_sparse(&expansion, n)
            .await
            .map_err(|e| backend_failure(Strategy::Sparse, e))?;
        Ok(normalize_hits(hits, Strategy::Sparse))
    }
}

fn provider_failure(strategy: Strategy, message: String) -> StrategyFailure {
    warn!("{} search degraded: {}", strategy, message);
    StrategyFailure::ProviderUnavailable(message)
}

fn backend_failure(strategy: Strategy, err: hybrid_core::RetrievalError) -> StrategyFailure {
    error!("{} search failed: {}", strategy, err);
    StrategyFailure::Backend(err.to_string())
}

/// Normalize backend hits, keeping backend order.
pub fn normalize_hits(hits: Vec<SearchHit>, strategy: Strategy) -> RankedList {
    hits.into_iter()
        .map(|hit| normalize_hit(hit, strategy))
        .collect()
}

/// Convert a raw hit into a result record.
///
/// Missing provenance fields become [`UNKNOWN`] so every record carries all
/// fields. A hit without `chunk_id` is identified by its backend `_id`, so
/// distinct chunks never share a fusion key.
pub fn normalize_hit(hit: SearchHit, strategy: Strategy) -> ResultRecord {
    let source = &hit.source;
    let content = text_field(source, "text")
        .or_else(|| text_field(source, "content"))
        .unwrap_or_default();
    let chunk_id = text_field(source, "chunk_id")
        .filter(|value| !value.is_empty())
        .or_else(|| hit.id.clone().filter(|id| !id.is_empty()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    ResultRecord {
        content,
        document_id: provenance(source, "filename"),
        chunk_id,
        source_url: provenance(source, "file_url"),
        last_modified: provenance(source, "modified_time"),
        raw_score: hit.score.unwrap_or(0.0),
        strategy,
    }
}

fn provenance(source: &Map<String, Value>, field: &str) -> String {
    text_field(source, field)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Scalar field as text; numbers and booleans are rendered.
fn text_field(source: &Map<String, Value>, field: &str) -> Option<String> {
    match source.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
