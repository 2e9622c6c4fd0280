//! Configuration for convdex

mod embedding;
mod logging;
mod preprocess;
mod store;

pub use embedding::{
    EmbeddingConfig, DEFAULT_PRIMARY_MODEL, FALLBACK_DIMENSIONS, FALLBACK_MODEL_ID,
    PRIMARY_DIMENSIONS, PRIMARY_MODEL_FAMILY,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use preprocess::PreprocessConfig;
pub use store::StoreConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the convdex engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for model files and the local store fallback
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Transcript normalization configuration
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "convdex")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".convdex"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            preprocess: PreprocessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.embedding.model_id.trim().is_empty() {
            errors.push("embedding model_id must not be empty".to_string());
        }
        if self.embedding.max_sequence_length == 0 {
            errors.push("max_sequence_length must be positive".to_string());
        }
        if self.embedding.max_sequence_length > 8192 {
            errors.push("max_sequence_length must be <= 8192".to_string());
        }
        if self.embedding.num_threads == 0 {
            errors.push("num_threads must be positive".to_string());
        }

        if self.store.collection.trim().is_empty() {
            errors.push("store collection name must not be empty".to_string());
        }
        if self.store.default_top_k == 0 {
            errors.push("default_top_k must be positive".to_string());
        }
        if self.store.timeout_secs == 0 {
            errors.push("store timeout_secs must be positive".to_string());
        }

        if self.preprocess.timeout_secs == 0 {
            errors.push("preprocess timeout_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Invalid configuration:\n  - {}",
                errors.join("\n  - ")
            ))
        }
    }

    /// Write this configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
        std::fs::write(path, content).map_err(|e| {
            anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e)
        })?;
        Ok(())
    }

    /// Directory holding downloaded model files for `model_id`
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        // Flatten "org/model" ids into a single directory component
        self.data_dir.join("models").join(model_id.replace('/', "--"))
    }

    /// Path of the local persistent store fallback
    pub fn local_store_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.store.default_top_k = 0;
        config.store.collection = String::new();
        config.embedding.num_threads = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_top_k"));
        assert!(err.contains("collection"));
        assert!(err.contains("num_threads"));
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.store.collection = "meetings".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.store.collection, "meetings");
        assert_eq!(loaded.store.port, config.store.port);
    }

    #[test]
    fn test_model_dir_flattens_slashes() {
        let config = Config::default();
        let dir = config.model_dir("minishlab/potion-multilingual-128M");
        assert!(dir
            .to_string_lossy()
            .ends_with("minishlab--potion-multilingual-128M"));
    }
}
