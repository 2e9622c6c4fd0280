//! Backend loading seam
//!
//! The manager's selection cascade only cares about "try to load this model
//! and tell me if it worked". Putting that behind a trait keeps the cascade
//! testable without model files on disk.

use super::onnx::{OnnxConfig, OnnxEmbedder};
use super::traits::{BackendKind, EmbeddingBackend, EmbeddingResult};
use crate::config::{Config, FALLBACK_DIMENSIONS, PRIMARY_DIMENSIONS};
use std::sync::Arc;

/// Loads concrete embedding backends for the selection cascade
pub trait BackendLoader: Send + Sync {
    /// Attempt to load the primary (static-model) backend for `model_id`
    fn load_primary(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>>;

    /// Attempt to load the fallback sentence-transformer backend for
    /// `model_id` (always the hardcoded fallback id)
    fn load_fallback(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>>;
}

/// Default loader: ONNX Runtime sessions from the configured data directory
pub struct OnnxLoader {
    config: Config,
}

impl OnnxLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl BackendLoader for OnnxLoader {
    fn load_primary(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
        let backend = OnnxEmbedder::load(OnnxConfig {
            model_id: model_id.to_string(),
            model_dir: self.config.model_dir(model_id),
            dimensions: PRIMARY_DIMENSIONS,
            // Raw encode: the potion family is not output-normalized
            normalize: false,
            max_sequence_length: self.config.embedding.max_sequence_length,
            num_threads: self.config.embedding.num_threads,
            kind: BackendKind::Primary,
        })?;
        Ok(Arc::new(backend))
    }

    fn load_fallback(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
        let backend = OnnxEmbedder::load(OnnxConfig {
            model_id: model_id.to_string(),
            model_dir: self.config.model_dir(model_id),
            dimensions: FALLBACK_DIMENSIONS,
            // Sentence-transformer path encodes with unit-length output
            normalize: true,
            max_sequence_length: self.config.embedding.max_sequence_length,
            num_threads: self.config.embedding.num_threads,
            kind: BackendKind::Fallback,
        })?;
        Ok(Arc::new(backend))
    }
}
