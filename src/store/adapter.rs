//! Vector store adapter
//!
//! Owns the connection to whichever storage tier the cascade picked and a
//! handle to one named collection. Writes go through a bounded recovery
//! protocol: attempt, classify the failure, take exactly one corrective
//! action, attempt once more, else propagate. Reads never recover.

use super::client::{connect, CollectionHandle, UpsertBatch, VectorStore};
use super::error::{StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::types::{Embedding, Metadata, QueryResponse};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Fault-tolerant facade over one collection in the vector store.
///
/// Not internally synchronized: `upsert` replaces the cached collection
/// handle during recovery, so concurrent writers must serialize access
/// (the pipeline does this with a mutex).
pub struct VectorStoreAdapter {
    store: Box<dyn VectorStore>,
    collection_name: String,
    collection: CollectionHandle,
}

impl VectorStoreAdapter {
    /// Connect to the best available tier and acquire the collection.
    pub fn new(config: &StoreConfig, local_path: &Path) -> StoreResult<Self> {
        let store = connect(config, local_path)?;
        Self::with_store(store, &config.collection)
    }

    /// Build an adapter over an already-connected store (used for the
    /// ephemeral tier in tests and embedded setups).
    pub fn with_store(store: Box<dyn VectorStore>, collection_name: &str) -> StoreResult<Self> {
        let collection = get_or_create(store.as_ref(), collection_name)?;
        info!(
            "Vector store ready: tier={}, collection='{}'",
            store.tier(),
            collection_name
        );
        Ok(Self {
            store,
            collection_name: collection_name.to_string(),
            collection,
        })
    }

    /// Which storage tier is serving this adapter
    pub fn tier(&self) -> &'static str {
        self.store.tier()
    }

    /// Name of the collection this adapter writes to
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Upsert records, recovering once from anticipated failures.
    ///
    /// - Stale collection handle: re-acquire via get-or-create, retry once.
    /// - Dimension conflict: delete the collection outright, recreate it,
    ///   retry once. Pre-existing records in the collection are lost; one
    ///   dimension per collection, latest writer wins.
    /// - Anything else (including non-dimension invalid arguments):
    ///   propagate immediately.
    ///
    /// A failure of the single retry propagates to the caller.
    pub fn upsert(
        &mut self,
        ids: Vec<String>,
        embeddings: Vec<Embedding>,
        documents: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> StoreResult<()> {
        if ids.len() != embeddings.len() || ids.len() != documents.len() {
            return Err(StoreError::InvalidArgument(format!(
                "ids ({}), embeddings ({}) and documents ({}) must have equal lengths",
                ids.len(),
                embeddings.len(),
                documents.len()
            )));
        }
        if let Some(metas) = &metadatas {
            if metas.len() != ids.len() {
                return Err(StoreError::InvalidArgument(format!(
                    "metadatas ({}) must match ids ({})",
                    metas.len(),
                    ids.len()
                )));
            }
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate id in upsert: {dup}"
            )));
        }

        let batch = UpsertBatch {
            ids,
            embeddings,
            documents,
            metadatas,
        };

        match self.store.upsert(&self.collection, batch.clone()) {
            Ok(()) => Ok(()),
            Err(StoreError::HandleStale(reason)) => {
                warn!(
                    "Collection '{}' handle stale ({}). Re-acquiring and retrying once",
                    self.collection_name, reason
                );
                self.collection = get_or_create(self.store.as_ref(), &self.collection_name)?;
                self.store.upsert(&self.collection, batch)
            }
            Err(err) if err.is_dimension_conflict() => {
                warn!(
                    "Dimension conflict on collection '{}' ({}). \
                     Recreating the collection; existing records are discarded",
                    self.collection_name, err
                );
                // Best-effort delete: the collection may already be gone
                if let Err(delete_err) = self.store.delete_collection(&self.collection_name) {
                    debug!(
                        "Delete during dimension recovery failed: {}",
                        delete_err
                    );
                }
                self.collection = get_or_create(self.store.as_ref(), &self.collection_name)?;
                self.store.upsert(&self.collection, batch)
            }
            Err(err) => Err(err),
        }
    }

    /// Top-k similarity query. No recovery on the read path: a stale
    /// handle or a dimension mismatch propagates as-is.
    pub fn query(&self, embeddings: &[Embedding], top_k: usize) -> StoreResult<QueryResponse> {
        self.store.query(&self.collection, embeddings, top_k)
    }
}

/// Fetch a collection by name, creating it when absent. Idempotent.
fn get_or_create(store: &dyn VectorStore, name: &str) -> StoreResult<CollectionHandle> {
    match store.get_collection(name) {
        Ok(handle) => Ok(handle),
        Err(StoreError::HandleStale(_)) => {
            debug!("Collection '{}' not found, creating it", name);
            store.create_collection(name)
        }
        Err(err) => Err(err),
    }
}
