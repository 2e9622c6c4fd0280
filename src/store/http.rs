//! Remote vector store client (Chroma-compatible REST API)
//!
//! First tier of the connection cascade. Speaks the v2 single-tenant API
//! over blocking reqwest; the actual sends run on a scoped thread because
//! reqwest's blocking client panics when driven from inside a tokio
//! runtime.

use super::client::{CollectionHandle, UpsertBatch, VectorStore};
use super::error::{StoreError, StoreResult};
use crate::types::{Embedding, Metadata, QueryMatch, QueryResponse};
use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const TENANT: &str = "default_tenant";
const DATABASE: &str = "default_database";

/// HTTP client for a remote Chroma-compatible vector database
pub struct HttpVectorStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: Uuid,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertBody {
    ids: Vec<String>,
    embeddings: Vec<Embedding>,
    documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadatas: Option<Vec<Metadata>>,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query_embeddings: &'a [Embedding],
    n_results: usize,
    include: [&'static str; 3],
}

/// Column-oriented query result as the server returns it
#[derive(Debug, Deserialize)]
struct QueryColumns {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

/// Error body shape used by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpVectorStore {
    /// Connect to a remote server, verifying reachability via heartbeat.
    pub fn connect(host: &str, port: u16, timeout_secs: u64) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        let store = Self {
            client,
            base_url: format!("http://{host}:{port}/api/v2"),
        };

        // Cheap reachability probe; a dead server fails the cascade tier here
        store.send(Method::GET, format!("{}/heartbeat", store.base_url), None::<&()>)?;
        Ok(store)
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/tenants/{}/databases/{}/collections",
            self.base_url, TENANT, DATABASE
        )
    }

    /// Send a request on a scoped thread and classify the response.
    ///
    /// Returns the raw response body on success; maps 404 to `HandleStale`
    /// and 4xx argument rejections to `InvalidArgument` so the adapter's
    /// recovery protocol can classify them.
    fn send<B: Serialize>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
    ) -> StoreResult<Vec<u8>> {
        let body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| {
                StoreError::InvalidArgument(format!("failed to serialize request: {e}"))
            })?),
            None => None,
        };

        debug!("{} {}", method, url);

        let response = std::thread::scope(|s| {
            s.spawn(|| {
                let mut request = self.client.request(method.clone(), url.as_str());
                if let Some(bytes) = body_bytes {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(bytes);
                }
                request.send().and_then(|r| {
                    let status = r.status();
                    let bytes = r.bytes()?;
                    Ok((status, bytes.to_vec()))
                })
            })
            .join()
        })
        .map_err(|_| StoreError::Unreachable("HTTP request thread panicked".to_string()))?
        .map_err(|e| StoreError::Unreachable(format!("request to {url} failed: {e}")))?;

        let (status, bytes) = response;

        if status.is_success() {
            return Ok(bytes);
        }

        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

        match status {
            StatusCode::NOT_FOUND => Err(StoreError::HandleStale(message)),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(StoreError::InvalidArgument(message))
            }
            _ => Err(StoreError::Other(anyhow::anyhow!(
                "server error ({status}): {message}"
            ))),
        }
    }

    fn parse<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Other(anyhow::anyhow!("failed to parse response: {e}")))
    }
}

impl VectorStore for HttpVectorStore {
    fn get_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        let bytes = self.send(
            Method::GET,
            format!("{}/{name}", self.collections_url()),
            None::<&()>,
        )?;
        let info: CollectionInfo = Self::parse(&bytes)?;
        Ok(CollectionHandle {
            id: info.id,
            name: info.name,
        })
    }

    fn create_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        let bytes = self.send(
            Method::POST,
            self.collections_url(),
            Some(&CreateCollectionBody { name }),
        )?;
        let info: CollectionInfo = Self::parse(&bytes)?;
        Ok(CollectionHandle {
            id: info.id,
            name: info.name,
        })
    }

    fn delete_collection(&self, name: &str) -> StoreResult<()> {
        self.send(
            Method::DELETE,
            format!("{}/{name}", self.collections_url()),
            None::<&()>,
        )?;
        Ok(())
    }

    fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> StoreResult<()> {
        let body = UpsertBody {
            ids: batch.ids,
            embeddings: batch.embeddings,
            documents: batch.documents,
            metadatas: batch.metadatas,
        };
        self.send(
            Method::POST,
            format!("{}/{}/upsert", self.collections_url(), collection.id),
            Some(&body),
        )?;
        Ok(())
    }

    fn query(
        &self,
        collection: &CollectionHandle,
        embeddings: &[Embedding],
        top_k: usize,
    ) -> StoreResult<QueryResponse> {
        let body = QueryBody {
            query_embeddings: embeddings,
            n_results: top_k,
            include: ["documents", "metadatas", "distances"],
        };
        let bytes = self.send(
            Method::POST,
            format!("{}/{}/query", self.collections_url(), collection.id),
            Some(&body),
        )?;
        let columns: QueryColumns = Self::parse(&bytes)?;

        // Re-assemble the column layout into per-query ranked rows
        let mut results = Vec::with_capacity(columns.ids.len());
        for (q, ids) in columns.ids.into_iter().enumerate() {
            let mut matches = Vec::with_capacity(ids.len());
            for (i, id) in ids.into_iter().enumerate() {
                let document = columns
                    .documents
                    .as_ref()
                    .and_then(|d| d.get(q))
                    .and_then(|row| row.get(i))
                    .and_then(|v| v.clone())
                    .unwrap_or_default();
                let metadata = columns
                    .metadatas
                    .as_ref()
                    .and_then(|m| m.get(q))
                    .and_then(|row| row.get(i))
                    .and_then(|v| v.clone())
                    .unwrap_or_default();
                let distance = columns
                    .distances
                    .as_ref()
                    .and_then(|d| d.get(q))
                    .and_then(|row| row.get(i))
                    .copied()
                    .unwrap_or(f32::MAX);
                matches.push(QueryMatch {
                    id,
                    document,
                    metadata,
                    distance,
                });
            }
            results.push(matches);
        }

        Ok(QueryResponse { results })
    }

    fn tier(&self) -> &'static str {
        "http"
    }
}
