//! Embedding backend trait definitions
//!
//! Defines the capability contract every embedding backend must implement,
//! and the error taxonomy for backend selection and inference.

use crate::types::Embedding;
use std::fmt::Debug;

/// Errors that can occur during backend selection or embedding
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Model files were not found or the model could not be loaded
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The operator explicitly pinned a model and it failed to load.
    /// No fallback is attempted for pinned models.
    #[error("Pinned model '{model_id}' is required but could not be loaded: {reason}")]
    PinnedModelUnavailable { model_id: String, reason: String },

    /// Neither the primary nor the fallback backend could be loaded
    #[error("No embedding backend available: primary failed ({primary}); fallback failed ({fallback})")]
    NoBackendAvailable { primary: String, fallback: String },

    /// Embedding generation failed
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Which of the two backend families is serving requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Static-embedding model (potion family), 256 dimensions, raw encode
    Primary,
    /// Multilingual sentence-transformer, 384 dimensions, L2-normalized
    Fallback,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Core trait for embedding backends
///
/// Object-safe so the manager can hold `Arc<dyn EmbeddingBackend>` for
/// whichever backend the selection cascade committed to.
pub trait EmbeddingBackend: Send + Sync + Debug {
    /// Generate embeddings for a batch of texts, one vector per input,
    /// in input order.
    fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>>;

    /// Fixed output dimension of every vector this backend produces
    fn dimensions(&self) -> usize;

    /// Which backend family this is
    fn kind(&self) -> BackendKind;

    /// Model id actually loaded
    fn model_id(&self) -> &str;
}
