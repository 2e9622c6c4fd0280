//! Embedding backend manager
//!
//! Lazily selects exactly one embedding backend and presents one consistent
//! dimension to callers for the lifetime of the manager. The selection
//! cascade runs at most once, on the first `embed` call:
//!
//! 1. Try to load the primary model named in the config. Success commits
//!    256 dimensions.
//! 2. On failure, if the configured id explicitly names the potion family,
//!    fail permanently. An operator who pinned a model must not silently
//!    get a different one.
//! 3. Otherwise try the hardcoded multilingual fallback. Success commits
//!    384 dimensions.
//! 4. If the fallback also fails, fail permanently with both causes.

use super::backend::{BackendKind, BackendLoader, EmbeddingBackend, EmbeddingError, EmbeddingResult};
use crate::config::{EmbeddingConfig, FALLBACK_MODEL_ID};
use crate::types::Embedding;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Manages the lifecycle of the active embedding backend
pub struct EmbeddingManager {
    config: EmbeddingConfig,
    loader: Box<dyn BackendLoader>,
    /// Selected backend; `None` until the first `embed` call.
    /// Double-checked under the write lock so selection runs once even
    /// under concurrent first calls.
    backend: RwLock<Option<Arc<dyn EmbeddingBackend>>>,
}

impl EmbeddingManager {
    pub fn new(config: EmbeddingConfig, loader: Box<dyn BackendLoader>) -> Self {
        Self {
            config,
            loader,
            backend: RwLock::new(None),
        }
    }

    /// Committed embedding dimension, or `None` before the first `embed`
    /// call has selected a backend. Stable for the manager's lifetime once
    /// set.
    pub fn dimension(&self) -> Option<usize> {
        self.backend.read().as_ref().map(|b| b.dimensions())
    }

    /// Which backend family is active, or `None` before first use
    pub fn active_backend(&self) -> Option<BackendKind> {
        self.backend.read().as_ref().map(|b| b.kind())
    }

    /// Embed a sequence of texts, one vector per input, in input order.
    ///
    /// The first call triggers backend selection; later calls reuse the
    /// committed backend. Every returned vector has length `dimension()`.
    pub fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        let backend = self.backend()?;
        backend.embed_batch(texts)
    }

    /// Get the active backend, selecting one if none is committed yet
    fn backend(&self) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
        if let Some(backend) = self.backend.read().as_ref() {
            return Ok(backend.clone());
        }

        let mut guard = self.backend.write();
        // Another caller may have won the race while we waited for the lock
        if let Some(backend) = guard.as_ref() {
            return Ok(backend.clone());
        }

        let backend = self.select_backend()?;
        *guard = Some(backend.clone());
        Ok(backend)
    }

    /// Run the selection cascade. Called at most once per manager.
    fn select_backend(&self) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
        let model_id = &self.config.model_id;

        let primary_err = match self.loader.load_primary(model_id) {
            Ok(backend) => {
                info!(
                    "Selected primary embedding backend: {} ({} dimensions)",
                    backend.model_id(),
                    backend.dimensions()
                );
                return Ok(backend);
            }
            Err(e) => e,
        };

        if self.config.is_pinned() {
            return Err(EmbeddingError::PinnedModelUnavailable {
                model_id: model_id.clone(),
                reason: primary_err.to_string(),
            });
        }

        warn!(
            "Primary embedding model '{}' unavailable ({}). Falling back to {}",
            model_id, primary_err, FALLBACK_MODEL_ID
        );

        match self.loader.load_fallback(FALLBACK_MODEL_ID) {
            Ok(backend) => {
                info!(
                    "Selected fallback embedding backend: {} ({} dimensions)",
                    backend.model_id(),
                    backend.dimensions()
                );
                Ok(backend)
            }
            Err(fallback_err) => Err(EmbeddingError::NoBackendAvailable {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FALLBACK_DIMENSIONS, PRIMARY_DIMENSIONS};

    /// Deterministic in-memory backend for cascade tests
    #[derive(Debug)]
    struct StubBackend {
        dimensions: usize,
        kind: BackendKind,
        model_id: String,
    }

    impl EmbeddingBackend for StubBackend {
        fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let seed = t.len() as f32 + 1.0;
                    (0..self.dimensions).map(|i| seed + i as f32).collect()
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }
    }

    /// Loader with scriptable primary/fallback availability
    struct StubLoader {
        primary_available: bool,
        fallback_available: bool,
    }

    impl BackendLoader for StubLoader {
        fn load_primary(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
            if self.primary_available {
                Ok(Arc::new(StubBackend {
                    dimensions: PRIMARY_DIMENSIONS,
                    kind: BackendKind::Primary,
                    model_id: model_id.to_string(),
                }))
            } else {
                Err(EmbeddingError::ModelNotFound(model_id.to_string()))
            }
        }

        fn load_fallback(&self, model_id: &str) -> EmbeddingResult<Arc<dyn EmbeddingBackend>> {
            if self.fallback_available {
                Ok(Arc::new(StubBackend {
                    dimensions: FALLBACK_DIMENSIONS,
                    kind: BackendKind::Fallback,
                    model_id: model_id.to_string(),
                }))
            } else {
                Err(EmbeddingError::ModelNotFound(model_id.to_string()))
            }
        }
    }

    fn manager(config: EmbeddingConfig, primary: bool, fallback: bool) -> EmbeddingManager {
        EmbeddingManager::new(
            config,
            Box::new(StubLoader {
                primary_available: primary,
                fallback_available: fallback,
            }),
        )
    }

    #[test]
    fn test_dimension_unknown_before_first_use() {
        let m = manager(EmbeddingConfig::default(), true, true);
        assert_eq!(m.dimension(), None);
        assert!(m.active_backend().is_none());
    }

    #[test]
    fn test_primary_selected_and_dimension_committed() {
        let m = manager(EmbeddingConfig::default(), true, true);
        let vectors = m.embed(&["hello".to_string(), "world".to_string()]).unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == PRIMARY_DIMENSIONS));
        assert_eq!(m.dimension(), Some(PRIMARY_DIMENSIONS));
        assert_eq!(m.active_backend(), Some(BackendKind::Primary));
    }

    #[test]
    fn test_dimension_stable_across_calls() {
        let m = manager(EmbeddingConfig::default(), true, true);
        m.embed(&["a".to_string()]).unwrap();
        let first = m.dimension();
        m.embed(&["bb".to_string()]).unwrap();
        m.embed(&["ccc".to_string()]).unwrap();
        assert_eq!(m.dimension(), first);
    }

    #[test]
    fn test_pinned_model_does_not_fall_back() {
        // Default config names the potion family explicitly
        let m = manager(EmbeddingConfig::default(), false, true);
        let err = m.embed(&["hello".to_string()]).unwrap_err();

        assert!(matches!(err, EmbeddingError::PinnedModelUnavailable { .. }));
        assert_eq!(m.dimension(), None);
    }

    #[test]
    fn test_unpinned_model_falls_back_to_384() {
        let config = EmbeddingConfig {
            model_id: "some/other-static-model".to_string(),
            ..Default::default()
        };
        let m = manager(config, false, true);
        let vectors = m.embed(&["hello".to_string()]).unwrap();

        assert_eq!(vectors[0].len(), FALLBACK_DIMENSIONS);
        assert_eq!(m.dimension(), Some(FALLBACK_DIMENSIONS));
        assert_eq!(m.active_backend(), Some(BackendKind::Fallback));
    }

    #[test]
    fn test_both_backends_failing_reports_both_causes() {
        let config = EmbeddingConfig {
            model_id: "some/other-static-model".to_string(),
            ..Default::default()
        };
        let m = manager(config, false, false);
        let err = m.embed(&["hello".to_string()]).unwrap_err();

        match err {
            EmbeddingError::NoBackendAvailable { primary, fallback } => {
                assert!(primary.contains("other-static-model"));
                assert!(fallback.contains("paraphrase-multilingual"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_returns_empty_output() {
        let m = manager(EmbeddingConfig::default(), true, true);
        let vectors = m.embed(&[]).unwrap();
        assert!(vectors.is_empty());
        // Selection still happened on the call
        assert_eq!(m.dimension(), Some(PRIMARY_DIMENSIONS));
    }
}
