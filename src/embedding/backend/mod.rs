//! Pluggable embedding backends
//!
//! Two concrete families share one capability contract:
//!
//! - **Primary**: static-embedding model (potion family), 256 dimensions,
//!   raw encode output
//! - **Fallback**: multilingual sentence-transformer, 384 dimensions,
//!   L2-normalized output
//!
//! Both run locally through ONNX Runtime. Which one serves requests is
//! decided once by [`crate::embedding::EmbeddingManager`].

mod loader;
mod onnx;
mod traits;

pub use loader::{BackendLoader, OnnxLoader};
pub use onnx::{OnnxConfig, OnnxEmbedder};
pub use traits::{BackendKind, EmbeddingBackend, EmbeddingError, EmbeddingResult};
