//! Search request bodies for the three retrieval primitives.

use serde::Deserialize;
use serde_json::{json, Value};

use hybrid_core::{BackendConfig, RetrievalError, Result, SearchHit, SparseExpansion};

/// Upper bound Elasticsearch accepts for `num_candidates`.
const MAX_NUM_CANDIDATES: usize = 1000;

/// Candidates examined per requested neighbor.
const CANDIDATES_PER_RESULT: usize = 10;

/// Builds `_search` bodies from the configured field names.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    text_fields: Vec<String>,
    boost: f32,
    dense_field: String,
    sparse_field: String,
    source_fields: Vec<String>,
}

impl QueryBuilder {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            text_fields: config.text_fields.clone(),
            boost: config.lexical_boost,
            dense_field: config.dense_field.clone(),
            sparse_field: config.sparse_field.clone(),
            source_fields: config.source_fields.clone(),
        }
    }

    /// Boolean `should` of one `match` per text field, same boost on each.
    pub fn lexical(&self, text: &str, n: usize) -> Value {
        let should: Vec<Value> = self
            .text_fields
            .iter()
            .map(|field| {
                json!({
                    "match": {
                        field.as_str(): { "query": text, "boost": self.boost }
                    }
                })
            })
            .collect();

        json!({
            "query": { "bool": { "should": should } },
            "size": n,
            "_source": self.source_fields,
        })
    }

    /// Top-level kNN restricted to documents that have the dense field.
    ///
    /// The filter lives inside `knn` so it narrows candidates instead of
    /// adding filter-only matches to the hit list.
    pub fn dense(&self, vector: &[f32], n: usize) -> Value {
        json!({
            "knn": {
                "field": self.dense_field,
                "query_vector": vector,
                "k": n,
                "num_candidates": num_candidates(n),
                "filter": { "exists": { "field": self.dense_field } }
            },
            "size": n,
            "_source": self.source_fields,
        })
    }

    /// `sparse_vector` query with a precomputed expansion.
    pub fn sparse(&self, expansion: &SparseExpansion, n: usize) -> Value {
        json!({
            "query": {
                "sparse_vector": {
                    "field": self.sparse_field,
                    "query_vector": expansion,
                }
            },
            "size": n,
            "_source": self.source_fields,
        })
    }
}

fn num_candidates(n: usize) -> usize {
    n.saturating_mul(CANDIDATES_PER_RESULT)
        .clamp(n.max(1), MAX_NUM_CANDIDATES.max(n))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Extract the hit list from a `_search` response body.
pub fn parse_hits(body: Value) -> Result<Vec<SearchHit>> {
    let response: SearchResponse = serde_json::from_value(body)
        .map_err(|e| RetrievalError::backend(format!("Malformed search response: {}", e)))?;
    Ok(response.hits.hits)
}
