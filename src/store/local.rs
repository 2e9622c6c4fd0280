//! Local vector store backed by sled
//!
//! Serves both fallback tiers: persistent (on-disk database under the data
//! directory) and ephemeral (sled temporary database, dropped on exit).
//! Collections are sled trees plus a metadata registry; queries are an
//! exact brute-force scan, which is fine at conversation-archive scale.

use super::client::{CollectionHandle, UpsertBatch, VectorStore};
use super::error::{StoreError, StoreResult};
use crate::types::{cosine_distance, Embedding, QueryMatch, QueryResponse, VectorRecord};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry tree holding one entry per collection, keyed by name
const COLLECTIONS_TREE: &str = "collections";

/// Per-collection metadata persisted in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMeta {
    /// Incarnation id; changes every time the collection is recreated
    id: Uuid,
    name: String,
    /// Committed vector dimension; `None` until the first successful upsert
    dimension: Option<usize>,
}

/// Local sled-backed vector store (persistent or ephemeral)
pub struct LocalVectorStore {
    db: sled::Db,
    collections: sled::Tree,
    tier: &'static str,
}

impl LocalVectorStore {
    /// Open (or create) a persistent store at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory {}", path.display()))?;

        let db = sled::open(path.join("vectors.sled"))
            .with_context(|| format!("Failed to open vector database at {}", path.display()))?;

        Self::with_db(db, "persistent")
    }

    /// Open an in-memory store; contents are lost on drop
    pub fn ephemeral() -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("Failed to open in-memory vector database")?;

        Self::with_db(db, "memory")
    }

    fn with_db(db: sled::Db, tier: &'static str) -> StoreResult<Self> {
        let collections = db
            .open_tree(COLLECTIONS_TREE)
            .context("Failed to open collection registry")?;

        Ok(Self {
            db,
            collections,
            tier,
        })
    }

    fn records_tree_name(id: &Uuid) -> String {
        format!("records:{id}")
    }

    fn load_meta(&self, name: &str) -> StoreResult<Option<CollectionMeta>> {
        let Some(raw) = self
            .collections
            .get(name.as_bytes())
            .context("Failed to read collection registry")?
        else {
            return Ok(None);
        };

        let meta = bincode::deserialize(&raw)
            .with_context(|| format!("Corrupt registry entry for collection '{name}'"))?;
        Ok(Some(meta))
    }

    fn save_meta(&self, meta: &CollectionMeta) -> StoreResult<()> {
        let raw = bincode::serialize(meta).context("Failed to serialize collection metadata")?;
        self.collections
            .insert(meta.name.as_bytes(), raw)
            .context("Failed to write collection registry")?;
        Ok(())
    }

    /// Resolve a handle against the registry, detecting stale handles:
    /// the collection must exist under its name AND still carry the
    /// incarnation id the handle was issued for.
    fn resolve(&self, collection: &CollectionHandle) -> StoreResult<CollectionMeta> {
        match self.load_meta(&collection.name)? {
            Some(meta) if meta.id == collection.id => Ok(meta),
            Some(_) => Err(StoreError::HandleStale(format!(
                "collection '{}' was recreated since this handle was acquired",
                collection.name
            ))),
            None => Err(StoreError::HandleStale(format!(
                "collection '{}' does not exist",
                collection.name
            ))),
        }
    }
}

impl VectorStore for LocalVectorStore {
    fn get_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        match self.load_meta(name)? {
            Some(meta) => Ok(CollectionHandle {
                id: meta.id,
                name: meta.name,
            }),
            None => Err(StoreError::HandleStale(format!(
                "collection '{name}' does not exist"
            ))),
        }
    }

    fn create_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        if let Some(meta) = self.load_meta(name)? {
            // Creation is idempotent: an existing collection is returned as-is
            return Ok(CollectionHandle {
                id: meta.id,
                name: meta.name,
            });
        }

        let meta = CollectionMeta {
            id: Uuid::new_v4(),
            name: name.to_string(),
            dimension: None,
        };
        self.save_meta(&meta)?;
        info!("Created collection '{}' ({})", name, meta.id);

        Ok(CollectionHandle {
            id: meta.id,
            name: meta.name,
        })
    }

    fn delete_collection(&self, name: &str) -> StoreResult<()> {
        let Some(meta) = self.load_meta(name)? else {
            return Err(StoreError::HandleStale(format!(
                "collection '{name}' does not exist"
            )));
        };

        self.db
            .drop_tree(Self::records_tree_name(&meta.id))
            .context("Failed to drop record tree")?;
        self.collections
            .remove(name.as_bytes())
            .context("Failed to remove collection from registry")?;
        self.db.flush().context("Failed to flush after delete")?;

        info!("Deleted collection '{}' ({})", name, meta.id);
        Ok(())
    }

    fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> StoreResult<()> {
        let mut meta = self.resolve(collection)?;

        let Some(batch_dim) = batch.embeddings.first().map(Vec::len) else {
            return Ok(()); // nothing to write
        };
        if let Some(odd) = batch.embeddings.iter().find(|e| e.len() != batch_dim) {
            return Err(StoreError::InvalidArgument(format!(
                "embeddings in one upsert must all have equal length, got {batch_dim} and {}",
                odd.len()
            )));
        }

        // First successful upsert commits the collection dimension;
        // afterwards every write must match it.
        match meta.dimension {
            None => {
                meta.dimension = Some(batch_dim);
                self.save_meta(&meta)?;
            }
            Some(committed) if committed != batch_dim => {
                return Err(StoreError::InvalidArgument(format!(
                    "Collection expecting embedding with dimension of {committed}, got {batch_dim}"
                )));
            }
            Some(_) => {}
        }

        let tree = self
            .db
            .open_tree(Self::records_tree_name(&meta.id))
            .context("Failed to open record tree")?;

        let records = batch.into_records();
        debug!(
            "Upserting {} records into '{}' ({} dims)",
            records.len(),
            meta.name,
            batch_dim
        );

        for record in records {
            let raw = bincode::serialize(&record)
                .with_context(|| format!("Failed to serialize record {}", record.id))?;
            tree.insert(record.id.as_bytes(), raw)
                .with_context(|| format!("Failed to store record {}", record.id))?;
        }
        self.db.flush().context("Failed to flush after upsert")?;

        Ok(())
    }

    fn query(
        &self,
        collection: &CollectionHandle,
        embeddings: &[Embedding],
        top_k: usize,
    ) -> StoreResult<QueryResponse> {
        let meta = self.resolve(collection)?;

        if let Some(committed) = meta.dimension {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != committed) {
                return Err(StoreError::InvalidArgument(format!(
                    "Collection expecting embedding with dimension of {committed}, got {}",
                    bad.len()
                )));
            }
        }

        let tree = self
            .db
            .open_tree(Self::records_tree_name(&meta.id))
            .context("Failed to open record tree")?;

        // Scan once, score every record against every query vector
        let records: Vec<VectorRecord> = tree
            .iter()
            .values()
            .filter_map(|r| r.ok())
            .filter_map(|raw| bincode::deserialize(&raw).ok())
            .collect();

        let mut results = Vec::with_capacity(embeddings.len());
        for query in embeddings {
            let mut matches: Vec<QueryMatch> = records
                .iter()
                .map(|record| QueryMatch {
                    id: record.id.clone(),
                    document: record.document.clone(),
                    metadata: record.metadata.clone(),
                    distance: cosine_distance(query, &record.embedding),
                })
                .collect();

            matches.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(Ordering::Equal)
            });
            matches.truncate(top_k);
            results.push(matches);
        }

        Ok(QueryResponse { results })
    }

    fn tier(&self) -> &'static str {
        self.tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn batch(ids: &[&str], dim: usize, seed: f32) -> UpsertBatch {
        UpsertBatch {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            embeddings: ids
                .iter()
                .enumerate()
                .map(|(i, _)| (0..dim).map(|j| seed + i as f32 + j as f32).collect())
                .collect(),
            documents: ids.iter().map(|s| format!("doc for {s}")).collect(),
            metadatas: None,
        }
    }

    #[test]
    fn test_create_collection_is_idempotent() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let a = store.create_collection("conv").unwrap();
        let b = store.create_collection("conv").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.get_collection("conv").unwrap().id, a.id);
    }

    #[test]
    fn test_get_missing_collection_is_stale() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let err = store.get_collection("nope").unwrap_err();
        assert!(matches!(err, StoreError::HandleStale(_)));
    }

    #[test]
    fn test_upsert_and_query_roundtrip() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();

        let b = batch(&["r1", "r2", "r3"], 4, 1.0);
        let query = b.embeddings[1].clone();
        store.upsert(&handle, b).unwrap();

        let response = store.query(&handle, &[query], 1).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].len(), 1);
        assert_eq!(response.results[0][0].id, "r2");
        assert!(response.results[0][0].distance < 1e-5);
    }

    #[test]
    fn test_query_results_sorted_and_capped() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();

        store.upsert(&handle, batch(&["a", "b", "c", "d", "e"], 3, 0.5)).unwrap();

        let response = store.query(&handle, &[vec![1.0, 2.0, 3.0]], 3).unwrap();
        let matches = &response.results[0];
        assert_eq!(matches.len(), 3);
        assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_first_upsert_commits_dimension() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();

        store.upsert(&handle, batch(&["a"], 256, 1.0)).unwrap();

        let err = store.upsert(&handle, batch(&["b"], 384, 1.0)).unwrap_err();
        assert!(err.is_dimension_conflict());
        // Non-dimension invalid arguments classify differently
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_query_dimension_mismatch_propagates() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();
        store.upsert(&handle, batch(&["a"], 4, 1.0)).unwrap();

        let err = store.query(&handle, &[vec![1.0, 2.0]], 1).unwrap_err();
        assert!(err.is_dimension_conflict());
    }

    #[test]
    fn test_stale_handle_detected_after_recreate() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let old = store.create_collection("conv").unwrap();

        store.delete_collection("conv").unwrap();
        let fresh = store.create_collection("conv").unwrap();
        assert_ne!(old.id, fresh.id);

        let err = store.upsert(&old, batch(&["a"], 4, 1.0)).unwrap_err();
        assert!(matches!(err, StoreError::HandleStale(_)));

        // The fresh handle works
        store.upsert(&fresh, batch(&["a"], 4, 1.0)).unwrap();
    }

    #[test]
    fn test_upsert_overwrites_same_id() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();

        store
            .upsert(
                &handle,
                UpsertBatch {
                    ids: vec!["x".to_string()],
                    embeddings: vec![vec![1.0, 0.0]],
                    documents: vec!["first".to_string()],
                    metadatas: None,
                },
            )
            .unwrap();
        store
            .upsert(
                &handle,
                UpsertBatch {
                    ids: vec!["x".to_string()],
                    embeddings: vec![vec![0.0, 1.0]],
                    documents: vec!["second".to_string()],
                    metadatas: None,
                },
            )
            .unwrap();

        let response = store.query(&handle, &[vec![0.0, 1.0]], 10).unwrap();
        assert_eq!(response.results[0].len(), 1);
        assert_eq!(response.results[0][0].document, "second");
    }

    #[test]
    fn test_persistent_store_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let handle = {
            let store = LocalVectorStore::open(dir.path()).unwrap();
            let handle = store.create_collection("conv").unwrap();
            store.upsert(&handle, batch(&["kept"], 3, 2.0)).unwrap();
            handle
        };

        let store = LocalVectorStore::open(dir.path()).unwrap();
        let reopened = store.get_collection("conv").unwrap();
        assert_eq!(reopened.id, handle.id);

        let response = store.query(&reopened, &[vec![2.0, 3.0, 4.0]], 1).unwrap();
        assert_eq!(response.results[0][0].id, "kept");
    }

    #[test]
    fn test_delete_collection_removes_records() {
        let store = LocalVectorStore::ephemeral().unwrap();
        let handle = store.create_collection("conv").unwrap();
        store.upsert(&handle, batch(&["a", "b"], 3, 1.0)).unwrap();

        store.delete_collection("conv").unwrap();
        let fresh = store.create_collection("conv").unwrap();
        let response = store.query(&fresh, &[vec![1.0, 2.0, 3.0]], 10).unwrap();
        assert!(response.results[0].is_empty());
    }
}
