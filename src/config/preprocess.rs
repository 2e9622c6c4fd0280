//! Preprocessing (text normalization) configuration

use serde::{Deserialize, Serialize};

/// Configuration for the LLM-based transcript normalizer.
///
/// When `api_key` is absent (both in config and in the `OPENROUTER_API_KEY`
/// environment variable), the preprocessor uses its local heuristic instead
/// of calling out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// API key for the OpenAI-compatible chat endpoint.
    /// Falls back to the OPENROUTER_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat model used for normalization
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-5-nano".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
        }
    }
}

impl PreprocessConfig {
    /// Resolve the API key from config or environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
    }
}
