//! Vector store client trait and the tiered connection cascade
//!
//! Three tiers, tried in order at construction, first success kept:
//!
//! 1. Remote Chroma-compatible HTTP server at the configured host/port
//! 2. Local persistent store under the data directory
//! 3. Ephemeral in-memory store (data lost on process exit)
//!
//! Availability cascade, not a correctness guarantee: callers must treat
//! the in-memory tier as ephemeral.

use super::error::{StoreError, StoreResult};
use super::http::HttpVectorStore;
use super::local::LocalVectorStore;
use crate::config::StoreConfig;
use crate::types::{Embedding, QueryResponse, VectorRecord};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Handle to a named collection.
///
/// The id distinguishes incarnations of a collection: after an out-of-band
/// delete and recreate, the name resolves again but the id differs, which
/// is how stale handles are detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub id: Uuid,
    pub name: String,
}

/// A batch of records to upsert, column-oriented like the wire format
#[derive(Debug, Clone)]
pub struct UpsertBatch {
    pub ids: Vec<String>,
    pub embeddings: Vec<Embedding>,
    pub documents: Vec<String>,
    pub metadatas: Option<Vec<crate::types::Metadata>>,
}

impl UpsertBatch {
    /// Turn the column layout into row records (lengths already validated)
    pub fn into_records(self) -> Vec<VectorRecord> {
        let len = self.ids.len();
        let metadatas = self
            .metadatas
            .unwrap_or_else(|| vec![crate::types::Metadata::new(); len]);

        self.ids
            .into_iter()
            .zip(self.embeddings)
            .zip(self.documents)
            .zip(metadatas)
            .map(|(((id, embedding), document), metadata)| VectorRecord {
                id,
                embedding,
                document,
                metadata,
            })
            .collect()
    }
}

/// Capability contract for a vector store tier
pub trait VectorStore: Send + Sync {
    /// Fetch an existing collection by name. `HandleStale` if absent.
    fn get_collection(&self, name: &str) -> StoreResult<CollectionHandle>;

    /// Create a collection. The dimension is committed by the first
    /// successful upsert, not at creation.
    fn create_collection(&self, name: &str) -> StoreResult<CollectionHandle>;

    /// Delete a collection and all its records. Missing collections are
    /// reported as `HandleStale`.
    fn delete_collection(&self, name: &str) -> StoreResult<()>;

    /// Write a batch of records into the collection, keyed by id.
    /// Re-using an id overwrites that record. All-or-nothing per call.
    fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> StoreResult<()>;

    /// Top-k nearest records per query vector, sorted by ascending
    /// distance. No recovery on failure.
    fn query(
        &self,
        collection: &CollectionHandle,
        embeddings: &[Embedding],
        top_k: usize,
    ) -> StoreResult<QueryResponse>;

    /// Tier name for logging ("http", "persistent", "memory")
    fn tier(&self) -> &'static str;
}

/// Connect to the best available storage tier.
///
/// Ordered-fallback factory: remote server, then local persistent store at
/// `local_path` (directory created if absent), then in-memory. Only when
/// all three fail is `Unreachable` returned, carrying every cause.
pub fn connect(config: &StoreConfig, local_path: &Path) -> StoreResult<Box<dyn VectorStore>> {
    let mut causes: Vec<String> = Vec::new();

    match HttpVectorStore::connect(&config.host, config.port, config.timeout_secs) {
        Ok(store) => {
            info!(
                "Connected to remote vector store at {}:{}",
                config.host, config.port
            );
            return Ok(Box::new(store));
        }
        Err(e) => {
            warn!(
                "Remote vector store at {}:{} unavailable ({}). Trying local store",
                config.host, config.port, e
            );
            causes.push(format!("http: {e}"));
        }
    }

    match LocalVectorStore::open(local_path) {
        Ok(store) => {
            info!("Using local persistent vector store at {}", local_path.display());
            return Ok(Box::new(store));
        }
        Err(e) => {
            warn!(
                "Local persistent store at {} unavailable ({}). Using in-memory store",
                local_path.display(),
                e
            );
            causes.push(format!("persistent: {e}"));
        }
    }

    match LocalVectorStore::ephemeral() {
        Ok(store) => {
            warn!("Using ephemeral in-memory vector store; data will not survive restarts");
            Ok(Box::new(store))
        }
        Err(e) => {
            causes.push(format!("memory: {e}"));
            Err(StoreError::Unreachable(causes.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Nothing listens on port 1, so the remote tier always fails fast
    fn unreachable_config() -> StoreConfig {
        StoreConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_falls_back_to_persistent_tier() {
        let dir = TempDir::new().unwrap();
        let store = connect(&unreachable_config(), &dir.path().join("store")).unwrap();
        assert_eq!(store.tier(), "persistent");

        // The selected tier is fully usable
        let handle = store.create_collection("conv").unwrap();
        assert_eq!(store.get_collection("conv").unwrap().id, handle.id);
    }

    #[test]
    fn test_connect_falls_back_to_memory_when_disk_unwritable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        // The local path sits under a regular file, so the persistent
        // tier cannot create its directory
        let store = connect(&unreachable_config(), &blocker.join("store")).unwrap();
        assert_eq!(store.tier(), "memory");
    }
}
