//! Embedding backend configuration

use serde::{Deserialize, Serialize};

/// Model id of the preferred (primary) static-embedding model.
/// Any model id containing this family prefix is treated as an explicit
/// operator pin: if it fails to load, no fallback is attempted.
pub const PRIMARY_MODEL_FAMILY: &str = "minishlab/potion";

/// Default primary model id
pub const DEFAULT_PRIMARY_MODEL: &str = "minishlab/potion-multilingual-128M";

/// Hardcoded fallback model id. Not configurable: the fallback models
/// "no preference, pick anything that works", not a second user choice.
pub const FALLBACK_MODEL_ID: &str =
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

/// Output dimension of the primary model family
pub const PRIMARY_DIMENSIONS: usize = 256;

/// Output dimension of the fallback model
pub const FALLBACK_DIMENSIONS: usize = 384;

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model id to try first (e.g. "minishlab/potion-multilingual-128M").
    /// Ids in the potion family are treated as pinned; anything else falls
    /// back to the multilingual sentence-transformer when loading fails.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Maximum token sequence length per input text
    #[serde(default = "default_max_seq_length")]
    pub max_sequence_length: usize,
    /// Number of threads for inference
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

fn default_model_id() -> String {
    DEFAULT_PRIMARY_MODEL.to_string()
}

fn default_max_seq_length() -> usize {
    512
}

fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
        .min(8)
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            max_sequence_length: default_max_seq_length(),
            num_threads: default_num_threads(),
        }
    }
}

impl EmbeddingConfig {
    /// Whether the configured model id explicitly pins the primary family
    pub fn is_pinned(&self) -> bool {
        self.model_id.contains(PRIMARY_MODEL_FAMILY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_pinned() {
        let config = EmbeddingConfig::default();
        assert!(config.is_pinned());
    }

    #[test]
    fn test_custom_model_is_not_pinned() {
        let config = EmbeddingConfig {
            model_id: "BAAI/bge-small-en-v1.5".to_string(),
            ..Default::default()
        };
        assert!(!config.is_pinned());
    }
}
