//! Core types for the convdex engine

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored record
pub type RecordId = String;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Free-form record metadata (JSON object)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single record as persisted in a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: RecordId,
    pub embedding: Embedding,
    pub document: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One ranked match returned by a similarity query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: RecordId,
    pub document: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Cosine distance to the query vector (0.0 = identical direction)
    pub distance: f32,
}

/// Result of a similarity query: one ranked list per query vector,
/// each sorted by ascending distance and capped at `top_k` entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<Vec<QueryMatch>>,
}

/// Receipt returned to the caller after a successful ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Freshly generated id of the stored record
    pub id: RecordId,
    /// Normalized text that was embedded and stored
    pub text: String,
    /// Dimension of the vector that was written
    pub vector_dim: usize,
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "embeddings must have same dimension");

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Cosine distance: 1 - cosine similarity, clamped to non-negative
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).max(0.0)
}

/// Normalize an embedding vector to unit length
pub fn normalize_embedding(embedding: &Embedding) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        let c = vec![1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_identical_is_zero() {
        let a = vec![0.3, -0.2, 0.9];
        assert!(cosine_distance(&a, &a) < 1e-6);
    }

    #[test]
    fn test_normalize_embedding() {
        let embedding = vec![3.0, 4.0];
        let normalized = normalize_embedding(&embedding);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let embedding = vec![0.0, 0.0, 0.0];
        assert_eq!(normalize_embedding(&embedding), embedding);
    }
}
