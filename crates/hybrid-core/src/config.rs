//! Configuration types for hybrid retrieval.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};
use crate::types::SearchMode;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Search backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Dense embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Sparse expansion configuration.
    #[serde(default)]
    pub sparse: SparseConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Elasticsearch backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the cluster.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Index holding the chunks.
    #[serde(default = "default_index")]
    pub index: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,

    /// Text fields matched by lexical search.
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<String>,

    /// Boost applied to every lexical field.
    #[serde(default = "default_boost")]
    pub lexical_boost: f32,

    /// Dense vector field.
    #[serde(default = "default_dense_field")]
    pub dense_field: String,

    /// Learned sparse expansion field.
    #[serde(default = "default_sparse_field")]
    pub sparse_field: String,

    /// Stored fields fetched with each hit.
    #[serde(default = "default_source_fields")]
    pub source_fields: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            index: default_index(),
            timeout_ms: default_backend_timeout(),
            text_fields: default_text_fields(),
            lexical_boost: default_boost(),
            dense_field: default_dense_field(),
            sparse_field: default_sparse_field(),
            source_fields: default_source_fields(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Dense embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Load the embedding model at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the ONNX model file.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to the tokenizer.json file.
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Maximum tokens per query.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Expected embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            num_threads: default_num_threads(),
            max_tokens: default_max_tokens(),
            dimension: default_dimension(),
        }
    }
}

/// Sparse expansion configuration (inference pipeline on the cluster).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseConfig {
    /// Enable sparse expansion.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ingest pipeline running the expansion model.
    #[serde(default = "default_pipeline_id")]
    pub pipeline_id: String,

    /// Field the pipeline reads the text from.
    #[serde(default = "default_input_field")]
    pub input_field: String,

    /// Field the pipeline writes the expansion to.
    #[serde(default = "default_sparse_field")]
    pub output_field: String,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pipeline_id: default_pipeline_id(),
            input_field: default_input_field(),
            output_field: default_sparse_field(),
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Maximum number of results.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Mode used when the caller does not pick one.
    #[serde(default)]
    pub default_mode: SearchMode,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Candidate multiplier per strategy when several strategies run.
    #[serde(default = "default_oversample")]
    pub oversample: usize,

    /// Deadline for a whole retrieval call, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            default_mode: SearchMode::default(),
            rrf_k: default_rrf_k(),
            oversample: default_oversample(),
            timeout_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the result cache.
    #[serde(default)]
    pub enabled: bool,

    /// Entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of cached queries.
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_backend_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "rag_documents".to_string()
}

fn default_backend_timeout() -> u64 {
    10_000
}

fn default_text_fields() -> Vec<String> {
    vec!["text".to_string(), "content".to_string()]
}

fn default_boost() -> f32 {
    1.0
}

fn default_dense_field() -> String {
    "dense_embedding".to_string()
}

fn default_sparse_field() -> String {
    "text_expansion".to_string()
}

fn default_source_fields() -> Vec<String> {
    [
        "text",
        "content",
        "filename",
        "chunk_id",
        "file_url",
        "modified_time",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_num_threads() -> usize {
    4
}

fn default_max_tokens() -> usize {
    256
}

fn default_dimension() -> usize {
    384
}

fn default_pipeline_id() -> String {
    "elser_pipeline".to_string()
}

fn default_input_field() -> String {
    "text".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

fn default_rrf_k() -> u32 {
    60
}

fn default_oversample() -> usize {
    2
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_entries() -> usize {
    1024
}

fn model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hybrid-rag")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

fn default_model_path() -> PathBuf {
    model_dir().join("model.onnx")
}

fn default_tokenizer_path() -> PathBuf {
    model_dir().join("tokenizer.json")
}

impl HybridConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RetrievalError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hybrid-rag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("hybrid-rag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RetrievalError::config(format!("Failed to render config: {}", e)))
    }

    /// Reject values the retriever cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.search.max_top_k == 0 {
            return Err(RetrievalError::config("search.max_top_k must be positive"));
        }
        if self.search.oversample == 0 {
            return Err(RetrievalError::config("search.oversample must be positive"));
        }
        if self.backend.text_fields.is_empty() {
            return Err(RetrievalError::config("backend.text_fields must not be empty"));
        }
        Ok(())
    }
}
