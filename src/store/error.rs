//! Vector store error taxonomy
//!
//! The adapter's recovery protocol keys off these variants:
//! `HandleStale` and dimension-flavored `InvalidArgument` each get exactly
//! one corrective retry; everything else propagates untouched.

/// Errors surfaced by vector store implementations and the adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No storage tier could be reached/initialized
    #[error("Vector store unreachable: {0}")]
    Unreachable(String),

    /// The collection handle no longer refers to a live collection
    /// (deleted or invalidated out-of-band)
    #[error("Collection handle stale: {0}")]
    HandleStale(String),

    /// The store rejected the request as malformed. Dimension-mismatch
    /// rejections are a recognizable sub-case, see
    /// [`StoreError::is_dimension_conflict`].
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other store-side failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Whether this is an invalid-argument rejection caused by a vector
    /// dimension disagreeing with the collection's committed dimension.
    /// Classified by message, matching how the server reports it.
    pub fn is_dimension_conflict(&self) -> bool {
        matches!(self, Self::InvalidArgument(msg) if msg.to_lowercase().contains("dimension"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_conflict_classification() {
        let err = StoreError::InvalidArgument(
            "Collection expecting embedding with dimension of 256, got 384".to_string(),
        );
        assert!(err.is_dimension_conflict());

        let err = StoreError::InvalidArgument("ids must be unique".to_string());
        assert!(!err.is_dimension_conflict());

        let err = StoreError::HandleStale("gone".to_string());
        assert!(!err.is_dimension_conflict());
    }
}
