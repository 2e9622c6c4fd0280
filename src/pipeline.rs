//! End-to-end pipeline orchestration
//!
//! Composes preprocessor, embedding manager, and vector store adapter into
//! the two user-facing operations: ingest a conversation, and search.

use crate::config::Config;
use crate::embedding::{EmbeddingManager, OnnxLoader};
use crate::preprocess::Preprocessor;
use crate::store::VectorStoreAdapter;
use crate::types::{IngestReceipt, Metadata, QueryResponse};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

/// Retrieval pipeline entry point
pub struct RagPipeline {
    config: Config,
    preprocessor: Preprocessor,
    embedder: EmbeddingManager,
    /// Serialized because upsert recovery replaces the collection handle
    store: Mutex<VectorStoreAdapter>,
}

impl RagPipeline {
    /// Build the pipeline from configuration: this connects the storage
    /// cascade immediately but defers embedding backend selection to the
    /// first ingest or query.
    pub fn new(config: Config) -> Result<Self> {
        let preprocessor = Preprocessor::new(config.preprocess.clone());
        let embedder = EmbeddingManager::new(
            config.embedding.clone(),
            Box::new(OnnxLoader::new(config.clone())),
        );
        let store = VectorStoreAdapter::new(&config.store, &config.local_store_path())
            .context("Failed to initialize vector store")?;

        Ok(Self {
            config,
            preprocessor,
            embedder,
            store: Mutex::new(store),
        })
    }

    /// Build a pipeline from pre-constructed parts. Lets callers supply
    /// their own backend loader or an already-connected store.
    pub fn from_parts(
        config: Config,
        preprocessor: Preprocessor,
        embedder: EmbeddingManager,
        store: VectorStoreAdapter,
    ) -> Self {
        Self {
            config,
            preprocessor,
            embedder,
            store: Mutex::new(store),
        }
    }

    /// Ingest one conversation: normalize, embed, persist.
    ///
    /// Every call stores a fresh record under a newly generated id.
    pub async fn ingest_conversation(
        &self,
        messages: &[String],
        metadata: Option<Metadata>,
    ) -> Result<IngestReceipt> {
        let text = self.preprocessor.preprocess(messages).await;
        let vectors = self.embedder.embed(std::slice::from_ref(&text))?;
        let vector_dim = vectors
            .first()
            .map(Vec::len)
            .context("Embedding backend returned no vector")?;

        let id = Uuid::new_v4().to_string();
        self.store.lock().upsert(
            vec![id.clone()],
            vectors,
            vec![text.clone()],
            Some(vec![metadata.unwrap_or_default()]),
        )?;

        info!("Ingested conversation {} ({} dims)", id, vector_dim);

        Ok(IngestReceipt {
            id,
            text,
            vector_dim,
        })
    }

    /// Embed a query text and return the top-k nearest records.
    pub async fn similarity_search(
        &self,
        query_text: &str,
        top_k: Option<usize>,
    ) -> Result<QueryResponse> {
        let top_k = top_k.unwrap_or(self.config.store.default_top_k);
        let vectors = self.embedder.embed(&[query_text.to_string()])?;
        let response = self.store.lock().query(&vectors, top_k)?;
        Ok(response)
    }

    /// Committed embedding dimension, once a backend has been selected
    pub fn dimension(&self) -> Option<usize> {
        self.embedder.dimension()
    }
}
