//! In-memory collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use hybrid_core::{
    EmbeddingProvider, Result, RetrievalError, SearchBackend, SearchHit, SparseExpansion,
    SparseExpansionProvider, Strategy,
};

/// Hit with the fields the index stores for a chunk.
pub fn hit(doc: &str, chunk: u32, score: f64) -> SearchHit {
    SearchHit {
        id: Some(format!("{}#{}", doc, chunk)),
        score: Some(score),
        source: serde_json::from_value(json!({
            "text": format!("{} chunk {}", doc, chunk),
            "filename": doc,
            "chunk_id": chunk,
            "file_url": format!("https://docs.example/{}", doc),
            "modified_time": "2024-01-01T00:00:00Z"
        }))
        .unwrap_or_default(),
    }
}

/// `count` hits for documents `{prefix}0..`, scores descending.
pub fn hits(prefix: &str, count: usize) -> Vec<SearchHit> {
    (0..count)
        .map(|i| hit(&format!("{}{}", prefix, i), 0, 100.0 - i as f64))
        .collect()
}

#[derive(Clone)]
enum Reply {
    Hits(Vec<SearchHit>),
    Fail,
}

#[derive(Clone)]
struct Behavior {
    reply: Reply,
    delay: Option<Duration>,
}

impl Behavior {
    fn hits(hits: Vec<SearchHit>) -> Self {
        Self {
            reply: Reply::Hits(hits),
            delay: None,
        }
    }
}

/// Scripted search backend recording each call as `(strategy, n)`.
pub struct MockBackend {
    lexical: Behavior,
    dense: Behavior,
    sparse: Behavior,
    calls: Mutex<Vec<(Strategy, usize)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            lexical: Behavior::hits(Vec::new()),
            dense: Behavior::hits(Vec::new()),
            sparse: Behavior::hits(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_lexical(mut self, hits: Vec<SearchHit>) -> Self {
        self.lexical.reply = Reply::Hits(hits);
        self
    }

    pub fn with_dense(mut self, hits: Vec<SearchHit>) -> Self {
        self.dense.reply = Reply::Hits(hits);
        self
    }

    pub fn with_sparse(mut self, hits: Vec<SearchHit>) -> Self {
        self.sparse.reply = Reply::Hits(hits);
        self
    }

    /// Every primitive fails.
    pub fn failing(mut self) -> Self {
        self.lexical.reply = Reply::Fail;
        self.dense.reply = Reply::Fail;
        self.sparse.reply = Reply::Fail;
        self
    }

    pub fn failing_lexical(mut self) -> Self {
        self.lexical.reply = Reply::Fail;
        self
    }

    pub fn delay_lexical(mut self, delay: Duration) -> Self {
        self.lexical.delay = Some(delay);
        self
    }

    pub fn delay_dense(mut self, delay: Duration) -> Self {
        self.dense.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(Strategy, usize)> {
        let mut calls = self.calls.lock().map(|c| c.clone()).unwrap_or_default();
        calls.sort_by_key(|(strategy, _)| strategy.as_str());
        calls
    }

    async fn respond(&self, strategy: Strategy, behavior: &Behavior, n: usize) -> Result<Vec<SearchHit>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((strategy, n));
        }
        if let Some(delay) = behavior.delay {
            tokio::time::sleep(delay).await;
        }
        match &behavior.reply {
            Reply::Hits(hits) => Ok(hits.iter().take(n).cloned().collect()),
            Reply::Fail => Err(RetrievalError::backend("connection refused")),
        }
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    async fn search_lexical(&self, _text: &str, n: usize) -> Result<Vec<SearchHit>> {
        self.respond(Strategy::Lexical, &self.lexical, n).await
    }

    async fn search_dense(&self, _vector: &[f32], n: usize) -> Result<Vec<SearchHit>> {
        self.respond(Strategy::Dense, &self.dense, n).await
    }

    async fn search_sparse(&self, _expansion: &SparseExpansion, n: usize) -> Result<Vec<SearchHit>> {
        self.respond(Strategy::Sparse, &self.sparse, n).await
    }
}

/// Embedding provider returning a fixed vector or failing.
pub struct MockEmbedder {
    vector: Option<Vec<f32>>,
    pub calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn working() -> Self {
        Self::returning(vec![0.6, 0.8])
    }

    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            vector: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector
            .clone()
            .ok_or_else(|| RetrievalError::provider("mock", "model not loaded"))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.vector.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Sparse expansion provider returning a fixed expansion or failing.
pub struct MockExpander {
    expansion: Option<SparseExpansion>,
}

impl MockExpander {
    pub fn working() -> Self {
        let mut expansion = SparseExpansion::new();
        expansion.insert("docker".to_string(), 1.2);
        Self {
            expansion: Some(expansion),
        }
    }

    pub fn failing() -> Self {
        Self { expansion: None }
    }
}

#[async_trait]
impl SparseExpansionProvider for MockExpander {
    async fn expand(&self, _text: &str) -> Result<SparseExpansion> {
        self.expansion
            .clone()
            .ok_or_else(|| RetrievalError::provider("mock-sparse", "inference timed out"))
    }

    fn name(&self) -> &str {
        "mock-sparse"
    }
}
