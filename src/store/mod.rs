//! Durable vector storage with tiered fallback and bounded write recovery
//!
//! - [`connect`]: remote server, then local persistent, then in-memory
//! - [`VectorStoreAdapter`]: one named collection, fault-tolerant upsert,
//!   recovery-free query

mod adapter;
mod client;
mod error;
mod http;
mod local;

pub use adapter::VectorStoreAdapter;
pub use client::{connect, CollectionHandle, UpsertBatch, VectorStore};
pub use error::{StoreError, StoreResult};
pub use http::HttpVectorStore;
pub use local::LocalVectorStore;
