//! hybrid-embed - ONNX query embedding provider
//!
//! This crate provides dense query embeddings from sentence-transformer
//! models exported to ONNX (all-MiniLM-L6-v2 by default).
//!
//! # Features
//!
//! - ONNX Runtime integration for fast inference
//! - Mean pooling with attention mask
//! - L2 normalization
//! - Inference on the blocking thread pool

mod onnx;

pub use onnx::{pool_output, OnnxEmbedder};

// Re-export the provider trait for convenience
pub use hybrid_core::EmbeddingProvider;
