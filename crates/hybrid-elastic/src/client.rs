//! HTTP client for an Elasticsearch-compatible search cluster.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use hybrid_core::{
    BackendConfig, Result, RetrievalError, SearchBackend, SearchHit, SparseExpansion,
};

use crate::query::{parse_hits, QueryBuilder};

/// Cluster health summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// `green`, `yellow` or `red`.
    pub status: String,

    #[serde(default)]
    pub cluster_name: Option<String>,

    #[serde(default)]
    pub number_of_nodes: Option<u32>,
}

impl ClusterHealth {
    /// Whether the cluster can serve searches.
    pub fn is_serving(&self) -> bool {
        matches!(self.status.as_str(), "green" | "yellow")
    }
}

/// Search backend talking to one index over HTTP.
///
/// The underlying `reqwest::Client` pools connections, so create one backend
/// at startup and share it.
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    client: Client,
    base_url: String,
    index: String,
    queries: QueryBuilder,
}

impl ElasticBackend {
    /// Create a backend from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RetrievalError::config(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Search backend: url={}, index={}",
            config.url, config.index
        );

        Ok(Self::with_client(client, config))
    }

    /// Create a backend reusing an existing HTTP client.
    pub fn with_client(client: Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            queries: QueryBuilder::new(config),
        }
    }

    /// Index this backend searches.
    pub fn index(&self) -> &str {
        &self.index
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch cluster health.
    pub async fn health(&self) -> Result<ClusterHealth> {
        let response = self
            .client
            .get(self.url("_cluster/health"))
            .send()
            .await
            .map_err(|e| RetrievalError::backend(format!("Health check failed: {}", e)))?;

        let body = read_json(response).await?;
        let health: ClusterHealth = serde_json::from_value(body)
            .map_err(|e| RetrievalError::backend(format!("Malformed health response: {}", e)))?;

        info!("Cluster health: {}", health.status);
        Ok(health)
    }

    /// Whether the cluster answers at all.
    pub async fn ping(&self) -> bool {
        match self.client.head(self.url("")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ping failed: {}", e);
                false
            }
        }
    }

    async fn search(&self, body: Value) -> Result<Vec<SearchHit>> {
        let url = self.url(&format!("{}/_search", self.index));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::backend(format!("Search request failed: {}", e)))?;

        let hits = parse_hits(read_json(response).await?)?;
        debug!("{} returned {} hits", url, hits.len());
        Ok(hits)
    }
}

/// Read a JSON body, turning non-success statuses into backend errors.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(status_error(status, &detail));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| RetrievalError::backend(format!("Invalid JSON response: {}", e)))
}

fn status_error(status: StatusCode, detail: &str) -> RetrievalError {
    let reason = extract_reason(detail).unwrap_or_else(|| truncate(detail, 200));
    RetrievalError::backend(format!("HTTP {}: {}", status.as_u16(), reason))
}

/// Pull `error.reason` out of an Elasticsearch error body.
fn extract_reason(detail: &str) -> Option<String> {
    let body: Value = serde_json::from_str(detail).ok()?;
    match &body["error"] {
        Value::String(reason) => Some(reason.clone()),
        error => error["reason"].as_str().map(String::from),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn search_lexical(&self, text: &str, n: usize) -> Result<Vec<SearchHit>> {
        self.search(self.queries.lexical(text, n)).await
    }

    async fn search_dense(&self, vector: &[f32], n: usize) -> Result<Vec<SearchHit>> {
        self.search(self.queries.dense(vector, n)).await
    }

    async fn search_sparse(&self, expansion: &SparseExpansion, n: usize) -> Result<Vec<SearchHit>> {
        self.search(self.queries.sparse(expansion, n)).await
    }
}

/// Base URL of a local port that was just released, so nothing listens on it.
#[cfg(test)]
pub(crate) fn closed_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> ElasticBackend {
        let config = BackendConfig {
            url: url.to_string(),
            timeout_ms: 200,
            ..BackendConfig::default()
        };
        ElasticBackend::new(&config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let backend = backend("http://localhost:9200/");
        assert_eq!(
            backend.url("rag_documents/_search"),
            "http://localhost:9200/rag_documents/_search"
        );
        assert_eq!(backend.url("/_cluster/health"), "http://localhost:9200/_cluster/health");
        assert_eq!(backend.index(), "rag_documents");
    }

    #[test]
    fn test_status_error_uses_reason() {
        let detail = r#"{"error":{"type":"index_not_found_exception","reason":"no such index [x]"},"status":404}"#;
        let err = status_error(StatusCode::NOT_FOUND, detail);
        assert_eq!(err.to_string(), "Backend error: HTTP 404: no such index [x]");

        let err = status_error(StatusCode::UNAUTHORIZED, "denied");
        assert_eq!(err.to_string(), "Backend error: HTTP 401: denied");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_cluster_health_serving() {
        let health: ClusterHealth =
            serde_json::from_str(r#"{"status":"yellow","cluster_name":"docs","number_of_nodes":1}"#)
                .unwrap();
        assert!(health.is_serving());
        assert_eq!(health.number_of_nodes, Some(1));

        let red = ClusterHealth {
            status: "red".to_string(),
            cluster_name: None,
            number_of_nodes: None,
        };
        assert!(!red.is_serving());
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_backend_error() {
        let backend = backend(&closed_local_url());
        let err = backend.search_lexical("anything", 3).await.unwrap_err();
        assert_eq!(err.error_code(), "BACKEND_ERROR");
        assert!(!backend.ping().await);
    }
}
