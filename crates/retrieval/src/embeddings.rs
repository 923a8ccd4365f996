//! Text embeddings
//!
//! Maps text to fixed-length dense vectors. The real model is an ONNX
//! sentence encoder behind the `onnx` feature; without it, a deterministic
//! token-hash embedder stands in so the pipeline stays fully testable.

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use quote_rag_config::constants::embedding;

use crate::RagError;

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Maximum tokenized sequence length
    pub max_seq_len: usize,
    /// Embedding dimension
    pub embedding_dim: usize,
    /// L2-normalize output vectors
    pub normalize: bool,
    /// Batch size for bulk embedding
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_seq_len: embedding::DEFAULT_MAX_SEQ_LEN,
            embedding_dim: embedding::DEFAULT_DIM,
            normalize: true,
            batch_size: embedding::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Sentence embedder
pub struct Embedder {
    #[cfg(feature = "onnx")]
    session: Session,
    #[cfg(feature = "onnx")]
    tokenizer: Tokenizer,
    #[cfg(not(feature = "onnx"))]
    fallback: HashingEmbedder,
    config: EmbeddingConfig,
}

impl Embedder {
    /// Create a new embedder from an ONNX model and its tokenizer
    #[cfg(feature = "onnx")]
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, RagError> {
        let session = Session::builder()
            .map_err(|e| RagError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RagError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| RagError::Model(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| RagError::Model(e.to_string()))?;

        Ok(Self {
            session,
            tokenizer,
            config,
        })
    }

    /// Create a new embedder (hashing fallback when ONNX is disabled)
    #[cfg(not(feature = "onnx"))]
    pub fn new(
        _model_path: impl AsRef<Path>,
        _tokenizer_path: impl AsRef<Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, RagError> {
        Ok(Self {
            fallback: HashingEmbedder::new(config.clone()),
            config,
        })
    }

    /// Embed a single text
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self
            .embed_batch(std::slice::from_ref(&text.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Embed multiple texts
    #[cfg(feature = "onnx")]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            all.extend(self.embed_chunk(chunk)?);
        }
        Ok(all)
    }

    /// Embed multiple texts (hashing fallback when ONNX is disabled)
    #[cfg(not(feature = "onnx"))]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|t| self.fallback.embed(t)).collect())
    }

    #[cfg(feature = "onnx")]
    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let batch_size = texts.len();
        let seq_len = self.config.max_seq_len;

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RagError::Model(e.to_string()))?;

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            let len = ids.len().min(seq_len);
            let offset = i * seq_len;

            for j in 0..len {
                input_ids[offset + j] = ids[j] as i64;
                attention_mask[offset + j] = mask[j] as i64;
                token_type_ids[offset + j] = types[j] as i64;
            }
        }

        let to_tensor = |data: Vec<i64>| {
            Array2::from_shape_vec((batch_size, seq_len), data)
                .map_err(|e| RagError::Model(e.to_string()))
                .and_then(|a| Tensor::from_array(a).map_err(|e| RagError::Model(e.to_string())))
        };

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => to_tensor(input_ids)?,
                "attention_mask" => to_tensor(attention_mask.clone())?,
                "token_type_ids" => to_tensor(token_type_ids)?,
            ])
            .map_err(|e| RagError::Model(e.to_string()))?;

        let (shape, hidden) = outputs
            .get("last_hidden_state")
            .ok_or_else(|| RagError::Model("Missing last_hidden_state output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Model(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let [_, out_seq, hidden_dim] = dims[..] else {
            return Err(RagError::Model(format!(
                "Unexpected hidden state shape: {:?}",
                dims
            )));
        };

        // Mean pooling over unmasked positions
        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.config.embedding_dim.min(hidden_dim)];
            let mut count = 0usize;

            for j in 0..out_seq.min(seq_len) {
                if attention_mask[i * seq_len + j] == 0 {
                    continue;
                }
                count += 1;
                let base = (i * out_seq + j) * hidden_dim;
                for (k, slot) in pooled.iter_mut().enumerate() {
                    *slot += hidden[base + k];
                }
            }

            if count > 0 {
                for v in &mut pooled {
                    *v /= count as f32;
                }
            }
            if self.config.normalize {
                l2_normalize(&mut pooled);
            }
            pooled.resize(self.config.embedding_dim, 0.0);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }

    /// Embedding dimension
    pub fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Deterministic token-hash embedder (no model required)
///
/// Each whitespace-delimited token bumps one dimension chosen by its hash,
/// so shared vocabulary between two texts translates directly into vector
/// similarity. Position-independent and reproducible across runs of the
/// same build.
pub struct HashingEmbedder {
    config: EmbeddingConfig,
}

impl HashingEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.config.embedding_dim];

        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.config.embedding_dim;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            l2_normalize(&mut embedding);
        }

        embedding
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector {
            *v /= norm;
        }
    }
}
