//! Embedding generation
//!
//! One [`EmbeddingManager`] per process holds the active backend. The
//! backend is chosen lazily on first use: primary static model if its files
//! are present, otherwise the hardcoded multilingual fallback (unless the
//! operator pinned the primary family, in which case failure is final).

pub mod backend;
mod manager;

pub use backend::{
    BackendKind, BackendLoader, EmbeddingBackend, EmbeddingError, EmbeddingResult, OnnxLoader,
};
pub use manager::EmbeddingManager;
