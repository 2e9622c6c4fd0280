//! convdex: conversational retrieval engine
//!
//! Ingests multi-turn conversational text, normalizes it into a single
//! retrieval-optimized document, embeds it, and persists/queries the
//! vectors against a nearest-neighbor store. Built around two resilient
//! components:
//!
//! - An embedding backend cascade (static potion-family model, with a
//!   multilingual sentence-transformer fallback) that commits to one
//!   vector dimension per process
//! - A tiered vector store (remote server, local persistent, in-memory)
//!   whose writes recover once from stale collection handles and from
//!   collection dimension conflicts

pub mod config;
pub mod embedding;
pub mod pipeline;
pub mod preprocess;
pub mod store;
pub mod types;

pub use config::Config;
pub use pipeline::RagPipeline;
pub use types::*;
