//! Vector store configuration

use serde::{Deserialize, Serialize};

/// Vector store connection and collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Remote vector database host
    #[serde(default = "default_host")]
    pub host: String,
    /// Remote vector database port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Collection name all ingests and queries go to
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Request timeout for remote store calls, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Default number of results for similarity queries
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_collection() -> String {
    "conversations".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_top_k() -> usize {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            collection: default_collection(),
            timeout_secs: default_timeout(),
            default_top_k: default_top_k(),
        }
    }
}
