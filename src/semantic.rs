//! # Semantic Index Module
//!
//! ## Purpose
//! Dense-embedding storage and cosine similarity scoring. The embedding
//! model itself is external and pluggable; the index only requires that it
//! map text to a fixed-length unit vector deterministically.
//!
//! ## Input/Output Specification
//! - **Input**: document texts at build time, a query embedding at query time
//! - **Output**: raw cosine in [-1, 1] per candidate, and its [0, 1] mapping
//!   `(cosine + 1) / 2` used for fusion
//!
//! ## Key Features
//! - Batch embedding generation at index build
//! - Dimension validation against the configured index dimension
//! - Deterministic hashing embedder for tests and offline development

use crate::errors::{Result, RetrievalError};
use crate::text::tokenize;
use async_trait::async_trait;

/// External embedding model seam.
///
/// Implementations must be deterministic for a given model version and
/// return unit vectors of a fixed dimension.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embedding dimension this model produces.
    fn dimension(&self) -> usize;

    /// Encode one text into a unit vector.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode a batch of texts. The default fans the texts through
    /// [`EmbeddingModel::encode`] sequentially; real model clients override
    /// this with true batched inference.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }
}

/// Per-document embedding store with cosine scoring.
#[derive(Debug)]
pub struct SemanticIndex {
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

impl SemanticIndex {
    /// Encode every document text and store the vectors.
    ///
    /// Fails when the model reports or produces a dimension that does not
    /// match `expected_dimension`.
    pub async fn build(
        model: &dyn EmbeddingModel,
        texts: &[String],
        expected_dimension: usize,
        batch_size: usize,
    ) -> Result<Self> {
        if model.dimension() != expected_dimension {
            return Err(RetrievalError::EmbeddingDimension {
                expected: expected_dimension,
                actual: model.dimension(),
            });
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            let batch = model.encode_batch(chunk).await?;
            for vector in batch {
                if vector.len() != expected_dimension {
                    return Err(RetrievalError::EmbeddingDimension {
                        expected: expected_dimension,
                        actual: vector.len(),
                    });
                }
                embeddings.push(vector);
            }
        }

        Ok(Self {
            embeddings,
            dimension: expected_dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Cosine similarity between the query embedding and the document at
    /// `idx`. Inputs are unit vectors, so the dot product is the cosine.
    pub fn cosine(&self, query_embedding: &[f32], idx: usize) -> f32 {
        self.embeddings[idx]
            .iter()
            .zip(query_embedding.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Map a cosine in [-1, 1] to the [0, 1] semantic score used for fusion.
pub fn semantic_unit_score(cosine: f32) -> f32 {
    (cosine + 1.0) / 2.0
}

/// Deterministic bag-of-tokens hashing embedder.
///
/// Each token is hashed into one of `dimension` buckets and the bucket
/// counts are L2-normalized. Not a substitute for a trained model, but it is
/// deterministic, respects token overlap, and produces unit vectors, which
/// is all the engine contract requires for tests and offline development.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
