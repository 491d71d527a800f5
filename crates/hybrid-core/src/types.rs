//! Core domain types for hybrid retrieval.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::RetrievalError;

/// Placeholder for provenance fields a hit did not carry.
pub const UNKNOWN: &str = "unknown";

/// Learned sparse expansion of a query: term -> weight.
pub type SparseExpansion = BTreeMap<String, f32>;

/// One retrieval method contributing a ranked list per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keyword / BM25 matching over text fields.
    Lexical,
    /// kNN search over dense embeddings.
    Dense,
    /// Learned sparse term expansion.
    Sparse,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which component produced a result: a single strategy or the fusion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTag {
    Lexical,
    Dense,
    Sparse,
    /// Result of Reciprocal Rank Fusion over several strategies.
    HybridRrf,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Dense => "dense",
            Self::Sparse => "sparse",
            Self::HybridRrf => "hybrid_rrf",
        }
    }
}

impl From<Strategy> for StrategyTag {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Lexical => Self::Lexical,
            Strategy::Dense => Self::Dense,
            Strategy::Sparse => Self::Sparse,
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search mode, selecting which strategies run and whether fusion applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    LexicalOnly,
    DenseOnly,
    SparseOnly,
    #[default]
    DenseLexical,
    FullHybrid,
}

impl SearchMode {
    /// All modes, in declaration order.
    pub const ALL: [SearchMode; 5] = [
        Self::LexicalOnly,
        Self::DenseOnly,
        Self::SparseOnly,
        Self::DenseLexical,
        Self::FullHybrid,
    ];

    /// Strategies this mode runs. Order is the order lists are handed to
    /// fusion, which decides tie-breaking.
    pub fn strategies(&self) -> &'static [Strategy] {
        match self {
            Self::LexicalOnly => &[Strategy::Lexical],
            Self::DenseOnly => &[Strategy::Dense],
            Self::SparseOnly => &[Strategy::Sparse],
            Self::DenseLexical => &[Strategy::Lexical, Strategy::Dense],
            Self::FullHybrid => &[Strategy::Lexical, Strategy::Dense, Strategy::Sparse],
        }
    }

    /// Whether more than one strategy participates.
    pub fn is_hybrid(&self) -> bool {
        self.strategies().len() > 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LexicalOnly => "lexical_only",
            Self::DenseOnly => "dense_only",
            Self::SparseOnly => "sparse_only",
            Self::DenseLexical => "dense_lexical",
            Self::FullHybrid => "full_hybrid",
        }
    }

    /// Parse a mode string, falling back to the default mode when it is not
    /// recognized.
    pub fn parse_or_default(mode: &str) -> Self {
        mode.parse().unwrap_or_else(|_| {
            let fallback = Self::default();
            warn!("Unknown search mode: {:?}, falling back to {}", mode, fallback);
            fallback
        })
    }
}

impl FromStr for SearchMode {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "lexical_only" | "bm25_only" => Ok(Self::LexicalOnly),
            "dense_only" => Ok(Self::DenseOnly),
            "sparse_only" | "elser_only" => Ok(Self::SparseOnly),
            "dense_lexical" | "dense_bm25" => Ok(Self::DenseLexical),
            "full_hybrid" => Ok(Self::FullHybrid),
            _ => Err(RetrievalError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw hit as returned by the search backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Backend document id.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    /// Backend-native relevance score.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    /// Stored fields of the hit.
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

/// Identity of a chunk for deduplication across strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocKey {
    pub document_id: String,
    pub chunk_id: String,
}

/// One retrieved chunk, normalized from a backend hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Chunk text.
    pub content: String,

    /// Source document identifier (filename).
    pub document_id: String,

    /// Chunk identifier within the document.
    pub chunk_id: String,

    /// Link to the source document.
    pub source_url: String,

    /// Last modification time of the source document.
    pub last_modified: String,

    /// Strategy-native score. Not comparable across strategies.
    pub raw_score: f64,

    /// Strategy that produced this record.
    pub strategy: Strategy,
}

impl ResultRecord {
    /// Deduplication key.
    pub fn key(&self) -> DocKey {
        DocKey {
            document_id: self.document_id.clone(),
            chunk_id: self.chunk_id.clone(),
        }
    }
}

/// Ordered results of a single strategy; rank 1 is position 0.
pub type RankedList = Vec<ResultRecord>;

/// Where a final result was seen: one entry per input list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub strategy: Strategy,

    /// 1-based rank within that strategy's list.
    pub rank: u32,

    pub raw_score: f64,
}

/// A final, ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Record as first seen across the input lists.
    pub record: ResultRecord,

    /// Fused RRF score, or the raw strategy score for pass-through results.
    pub score: f64,

    /// 1-based position in the final output.
    pub rank: u32,

    /// `HybridRrf` when fusion ran, otherwise the producing strategy.
    pub strategy: StrategyTag,

    /// Strategies that surfaced this chunk.
    pub sources: Vec<Contribution>,
}

impl FusedResult {
    /// Wrap a single-strategy record without fusion.
    pub fn pass_through(record: ResultRecord, rank: u32) -> Self {
        let sources = vec![Contribution {
            strategy: record.strategy,
            rank,
            raw_score: record.raw_score,
        }];
        Self {
            score: record.raw_score,
            strategy: record.strategy.into(),
            rank,
            sources,
            record,
        }
    }
}

/// How a strategy fared during one retrieval call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StrategyOutcome {
    /// Returned a list (possibly empty).
    Completed,
    /// Its embedding or expansion provider failed; no backend call was made.
    ProviderUnavailable(String),
    /// The backend call failed.
    BackendError(String),
    /// Did not finish before the call deadline.
    TimedOut,
    /// The task died unexpectedly.
    Aborted(String),
}

impl StrategyOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Per-strategy diagnostics for one retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy: Strategy,
    pub outcome: StrategyOutcome,

    /// Hits the strategy contributed.
    pub hits: usize,

    pub latency_ms: u64,
}

/// Retrieval results container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    /// Query as given by the caller.
    pub query: String,

    /// Mode actually used.
    pub mode: SearchMode,

    /// Requested result count after clamping.
    pub top_k: usize,

    /// Whether RRF fusion ran.
    pub fused: bool,

    /// Total latency in milliseconds.
    pub latency_ms: u64,

    /// One report per participating strategy, in mode order.
    pub strategies: Vec<StrategyReport>,

    /// Final results.
    pub results: Vec<FusedResult>,
}

impl RetrievalResponse {
    /// Whether any participating strategy degraded.
    pub fn degraded(&self) -> bool {
        self.strategies.iter().any(|s| s.outcome.is_degraded())
    }
}
