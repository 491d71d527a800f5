//! Error types for hybrid retrieval.

use thiserror::Error;

/// Result type alias using RetrievalError.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur during retrieval.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// An embedding or sparse expansion model could not produce output.
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// A single search backend call failed (transport, status, or response).
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// No strategy could reach the search backend.
    #[error("Search backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// Unrecognized search mode string.
    #[error("Invalid search mode: {mode}")]
    InvalidMode { mode: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RetrievalError {
    /// Create a provider unavailable error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a backend unavailable error.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller should answer with "service unavailable" rather
    /// than "no results".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Get the error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::BackendUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::InvalidMode { .. } => "INVALID_MODE",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
