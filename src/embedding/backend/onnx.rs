//! ONNX inference backend shared by both model families
//!
//! Runs embedding inference with ONNX Runtime from files on disk
//! (`model.onnx` + `tokenizer.json`). The primary (potion-family) and the
//! fallback (sentence-transformer) backends only differ in their committed
//! dimension and whether the output vectors are L2-normalized; everything
//! else is the same tokenization / inference / pooling path.

use super::traits::{BackendKind, EmbeddingBackend, EmbeddingError, EmbeddingResult};
use crate::types::{normalize_embedding, Embedding};
use ort::{execution_providers::CPUExecutionProvider, session::Session, value::Tensor};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Configuration for an ONNX embedding backend
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Model id this backend serves (for logging and reporting)
    pub model_id: String,
    /// Directory containing `model.onnx` and `tokenizer.json`
    pub model_dir: PathBuf,
    /// Committed output dimension; inference output is checked against this
    pub dimensions: usize,
    /// Whether output vectors are L2-normalized to unit length
    pub normalize: bool,
    /// Maximum token sequence length
    pub max_sequence_length: usize,
    /// Number of intra-op inference threads
    pub num_threads: usize,
    /// Which backend family this instance represents
    pub kind: BackendKind,
}

/// Embedding backend backed by an ONNX Runtime session
pub struct OnnxEmbedder {
    /// ONNX session (Mutex for interior mutability; ort sessions need &mut)
    session: Mutex<Session>,
    /// Tokenizer for text preprocessing
    tokenizer: Tokenizer,
    config: OnnxConfig,
}

impl fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("config", &self.config)
            .field("session", &"<Session>")
            .finish()
    }
}

impl OnnxEmbedder {
    /// Load a backend from its model directory.
    ///
    /// Fails with `ModelNotFound` when the model or tokenizer file is
    /// absent. Model files are environment-dependent; this failure is what
    /// drives the selection cascade in the manager.
    pub fn load(config: OnnxConfig) -> EmbeddingResult<Self> {
        let model_path = config.model_dir.join("model.onnx");
        let tokenizer_path = config.model_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::ModelNotFound(format!(
                    "{} (looked in {})",
                    config.model_id,
                    path.display()
                )));
            }
        }

        info!(
            "Loading {} embedding model: {} ({} dimensions)",
            config.kind.as_str(),
            config.model_id,
            config.dimensions
        );

        let session = Self::build_session(&config, &model_path)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            EmbeddingError::ModelNotFound(format!(
                "{}: failed to load tokenizer: {}",
                config.model_id, e
            ))
        })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
        })
    }

    /// Build an ONNX session on the CPU execution provider
    fn build_session(config: &OnnxConfig, model_path: &Path) -> EmbeddingResult<Session> {
        Session::builder()
            .and_then(|b| b.with_execution_providers([CPUExecutionProvider::default().build()]))
            .and_then(|b| b.with_intra_threads(config.num_threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| {
                EmbeddingError::ModelNotFound(format!(
                    "{}: failed to load ONNX model: {}",
                    config.model_id, e
                ))
            })
    }

    /// Run tokenization + inference + pooling for a batch of texts
    fn run_inference(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("Tokenization failed: {}", e)))?;

        // Pad to the longest sequence in the batch, capped at the model limit
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.config.max_sequence_length)
            .max(1);

        let batch_size = texts.len();
        let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut token_type_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let len = ids.len().min(max_len);

            for i in 0..max_len {
                if i < len {
                    input_ids.push(ids[i] as i64);
                    attention_mask.push(1);
                    token_type_ids.push(0);
                } else {
                    input_ids.push(0);
                    attention_mask.push(0);
                    token_type_ids.push(0);
                }
            }
        }

        let shape = [batch_size, max_len];

        let (output_shape, output_data): (Vec<usize>, Vec<f32>) = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => Tensor::from_array((shape, input_ids))
                        .map_err(to_embed_err)?,
                    "attention_mask" => Tensor::from_array((shape, attention_mask))
                        .map_err(to_embed_err)?,
                    "token_type_ids" => Tensor::from_array((shape, token_type_ids))
                        .map_err(to_embed_err)?,
                ])
                .map_err(to_embed_err)?;

            // Prefer the conventional output names, else take the first tensor
            if let Some(t) = outputs.get("last_hidden_state") {
                let arr = t.try_extract_array::<f32>().map_err(to_embed_err)?;
                (arr.shape().to_vec(), arr.iter().copied().collect())
            } else if let Some(t) = outputs.get("sentence_embedding") {
                let arr = t.try_extract_array::<f32>().map_err(to_embed_err)?;
                (arr.shape().to_vec(), arr.iter().copied().collect())
            } else {
                let (_, v) = outputs.iter().next().ok_or_else(|| {
                    EmbeddingError::EmbeddingFailed("No output tensor found".to_string())
                })?;
                let arr = v.try_extract_array::<f32>().map_err(to_embed_err)?;
                (arr.shape().to_vec(), arr.iter().copied().collect())
            }
        };

        let output_view = ndarray::ArrayViewD::from_shape(
            output_shape.as_slice(),
            output_data.as_slice(),
        )
        .map_err(|e| EmbeddingError::EmbeddingFailed(format!("Bad output shape: {}", e)))?;

        let embeddings = match output_view.ndim() {
            // [batch, seq_len, hidden] - needs mean pooling
            3 => mean_pool(&output_view, &encodings, max_len),
            // [batch, hidden] - already pooled
            2 => (0..batch_size)
                .map(|i| output_view.slice(ndarray::s![i, ..]).to_vec())
                .collect(),
            _ => {
                return Err(EmbeddingError::EmbeddingFailed(format!(
                    "Unexpected output shape: {:?}",
                    output_view.shape()
                )))
            }
        };

        Ok(embeddings)
    }
}

fn to_embed_err(e: ort::Error) -> EmbeddingError {
    EmbeddingError::EmbeddingFailed(e.to_string())
}

/// Mean pooling over valid (non-padding) token positions
fn mean_pool(
    output: &ndarray::ArrayViewD<f32>,
    encodings: &[tokenizers::Encoding],
    max_len: usize,
) -> Vec<Embedding> {
    let hidden_size = output.shape()[2];
    let mut embeddings = Vec::with_capacity(encodings.len());

    for (i, encoding) in encodings.iter().enumerate() {
        let seq_len = encoding.get_ids().len().min(max_len).max(1);
        let mut pooled = vec![0.0f32; hidden_size];

        for j in 0..seq_len {
            for k in 0..hidden_size {
                pooled[k] += output[[i, j, k]];
            }
        }

        let count = seq_len as f32;
        for val in &mut pooled {
            *val /= count;
        }

        embeddings.push(pooled);
    }

    embeddings
}

impl EmbeddingBackend for OnnxEmbedder {
    fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding batch of {} texts with {} backend",
            texts.len(),
            self.config.kind.as_str()
        );

        let raw = self.run_inference(texts)?;

        let mut embeddings = Vec::with_capacity(raw.len());
        for embedding in raw {
            // The committed dimension is a hard contract with the store
            if embedding.len() != self.config.dimensions {
                return Err(EmbeddingError::EmbeddingFailed(format!(
                    "Model produced {}-dim vector, expected {}",
                    embedding.len(),
                    self.config.dimensions
                )));
            }
            if self.config.normalize {
                embeddings.push(normalize_embedding(&embedding));
            } else {
                embeddings.push(embedding);
            }
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn kind(&self) -> BackendKind {
        self.config.kind
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fails_when_model_files_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = OnnxConfig {
            model_id: "minishlab/potion-multilingual-128M".to_string(),
            model_dir: dir.path().join("nope"),
            dimensions: 256,
            normalize: false,
            max_sequence_length: 512,
            num_threads: 1,
            kind: BackendKind::Primary,
        };

        let err = OnnxEmbedder::load(config).unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound(_)));
    }
}
