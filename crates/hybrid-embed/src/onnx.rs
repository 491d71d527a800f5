//! ONNX-based query embedding provider.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::{ArrayViewD, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use hybrid_core::{EmbeddingConfig, EmbeddingProvider, Result, RetrievalError};

const PROVIDER_NAME: &str = "onnx";

/// Sentence-embedding model (all-MiniLM-L6-v2 or another BERT-style export
/// taking `input_ids`, `attention_mask` and `token_type_ids`).
///
/// Load once at startup with [`OnnxEmbedder::load`] and share behind an
/// `Arc`. Inference runs on the blocking thread pool. The session and
/// tokenizer are released when the last handle is dropped.
pub struct OnnxEmbedder {
    inner: Arc<Inner>,
}

struct Inner {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Tokenizer,

    /// Embedding dimension.
    dimension: usize,

    /// Maximum token count.
    max_tokens: usize,
}

fn unavailable(message: impl Into<String>) -> RetrievalError {
    RetrievalError::provider(PROVIDER_NAME, message)
}

impl OnnxEmbedder {
    /// Load the model and tokenizer.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer.json file
    /// * `dimension` - Expected output dimension
    /// * `max_tokens` - Truncation length for queries
    /// * `num_threads` - Intra-op threads for CPU inference
    pub fn load(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        dimension: usize,
        max_tokens: usize,
        num_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| unavailable(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| unavailable(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads.max(1))
            .map_err(|e| unavailable(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| unavailable(format!("Failed to load model: {}", e)))?;

        info!("Loading tokenizer from {:?}", tokenizer_path);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| unavailable(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            "Embedder initialized: dim={}, max_tokens={}",
            dimension, max_tokens
        );

        Ok(Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                tokenizer,
                dimension,
                max_tokens,
            }),
        })
    }

    /// Load using the `[embedding]` configuration section.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::load(
            &config.model_path,
            &config.tokenizer_path,
            config.dimension,
            config.max_tokens,
            config.num_threads,
        )
    }
}

impl Inner {
    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| unavailable(format!("Tokenization failed: {}", e)))?;

        let len = encoding.get_ids().len().min(self.max_tokens);
        if len == 0 {
            return Err(unavailable("Query produced no tokens"));
        }

        let input_ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding.get_attention_mask()[..len]
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids()[..len]
            .iter()
            .map(|&t| t as i64)
            .collect();

        debug!("Embedding query: tokens={}", len);

        let input_ids_tensor = Tensor::from_array((vec![1, len], input_ids))
            .map_err(|e| unavailable(format!("Failed to create input tensor: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((vec![1, len], attention_mask.clone()))
            .map_err(|e| unavailable(format!("Failed to create mask tensor: {}", e)))?;
        let token_type_tensor = Tensor::from_array((vec![1, len], token_type_ids))
            .map_err(|e| unavailable(format!("Failed to create type tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| unavailable(format!("Failed to lock session: {}", e)))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_tensor
            ])
            .map_err(|e| unavailable(format!("Inference failed: {}", e)))?;

        // First output is either token embeddings or an already pooled vector.
        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| unavailable("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| unavailable(format!("Failed to extract tensor: {}", e)))?;

        let embedding = pool_output(&view, &attention_mask)?;
        if embedding.len() != self.dimension {
            return Err(unavailable(format!(
                "Expected {} dimensions, model produced {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

/// Reduce model output for a single sequence to one normalized vector.
///
/// Accepts `[1, seq, hidden]` token embeddings (mean pooled over the
/// attention mask) or `[1, hidden]` pooled output.
pub fn pool_output(view: &ArrayViewD<'_, f32>, attention_mask: &[i64]) -> Result<Vec<f32>> {
    match view.ndim() {
        3 => {
            let tokens = view.index_axis(Axis(0), 0);
            let (seq_len, hidden_dim) = (tokens.shape()[0], tokens.shape()[1]);

            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;
            for (j, &mask) in attention_mask.iter().take(seq_len).enumerate() {
                if mask != 1 {
                    continue;
                }
                valid += 1;
                for (k, acc) in sum.iter_mut().enumerate() {
                    *acc += tokens[[j, k]];
                }
            }

            if valid == 0 {
                return Err(unavailable("Attention mask selects no tokens"));
            }

            let mean: Vec<f32> = sum.iter().map(|s| s / valid as f32).collect();
            Ok(l2_normalize(mean))
        }
        2 => {
            let pooled: Vec<f32> = view.index_axis(Axis(0), 0).iter().copied().collect();
            Ok(l2_normalize(pooled))
        }
        _ => Err(unavailable(format!(
            "Unexpected output shape: {:?}",
            view.shape()
        ))),
    }
}

/// L2 normalize a vector.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.embed_blocking(&text))
            .await
            .map_err(|e| unavailable(format!("Embedding task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn dimension(&self) -> usize {
        self.inner.dimension
    }
}
