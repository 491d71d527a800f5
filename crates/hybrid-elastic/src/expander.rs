//! Sparse query expansion through a cluster-side inference pipeline.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use hybrid_core::{Result, RetrievalError, SparseConfig, SparseExpansion, SparseExpansionProvider};

use crate::client::{read_json, ElasticBackend};

const PROVIDER_NAME: &str = "elser-pipeline";

/// Expands queries by simulating the ingest pipeline that expands documents
/// at index time, so queries and documents share one vocabulary.
///
/// Every call is a live inference round trip to the cluster.
#[derive(Debug, Clone)]
pub struct PipelineExpander {
    backend: ElasticBackend,
    pipeline_id: String,
    input_field: String,
    output_field: String,
}

impl PipelineExpander {
    pub fn new(backend: ElasticBackend, config: &SparseConfig) -> Self {
        Self {
            backend,
            pipeline_id: config.pipeline_id.clone(),
            input_field: config.input_field.clone(),
            output_field: config.output_field.clone(),
        }
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "docs": [
                { "_source": { self.input_field.as_str(): text } }
            ]
        })
    }

    fn unavailable(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::provider(PROVIDER_NAME, message)
    }
}

/// Read the expansion written by the pipeline from a `_simulate` response.
///
/// Accepts both the `docs[0].doc._source` shape of the simulate API and a
/// flattened `docs[0]._source`.
pub fn parse_expansion(body: &Value, output_field: &str) -> Option<SparseExpansion> {
    let first = body.get("docs")?.get(0)?;
    if let Some(error) = first.get("error") {
        debug!("Pipeline simulation reported an error: {}", error);
        return None;
    }

    let source = first
        .get("doc")
        .and_then(|doc| doc.get("_source"))
        .or_else(|| first.get("_source"))?;

    let terms = source.get(output_field)?.as_object()?;
    let expansion: SparseExpansion = terms
        .iter()
        .filter_map(|(term, weight)| weight.as_f64().map(|w| (term.clone(), w as f32)))
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    Some(expansion)
}

#[async_trait]
impl SparseExpansionProvider for PipelineExpander {
    async fn expand(&self, text: &str) -> Result<SparseExpansion> {
        let url = self
            .backend
            .url(&format!("_ingest/pipeline/{}/_simulate", self.pipeline_id));

        let response = self
            .backend
            .client()
            .post(&url)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| self.unavailable(format!("Simulate request failed: {}", e)))?;

        let body = read_json(response)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let expansion = parse_expansion(&body, &self.output_field).ok_or_else(|| {
            self.unavailable(format!("No '{}' in pipeline output", self.output_field))
        })?;

        if expansion.is_empty() {
            return Err(self.unavailable("Pipeline produced an empty expansion"));
        }

        debug!("Expanded query into {} terms", expansion.len());
        Ok(expansion)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
