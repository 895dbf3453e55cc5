//! Embedding types and the embedding provider abstraction.

use async_trait::async_trait;
use pactum_core::{ReconError, Result};
use serde::{Deserialize, Serialize};

/// A vector embedding of a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The embedding vector
    pub vector: Vec<f32>,
}

impl Embedding {
    /// Creates a new embedding from a vector.
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    /// The dimensionality of this embedding.
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Computes cosine similarity with another embedding.
    ///
    /// Returns a value in `[-1, 1]`; zero vectors compare as 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32> {
        if self.dimensions() != other.dimensions() {
            return Err(ReconError::DimensionMismatch {
                left: self.dimensions(),
                right: other.dimensions(),
            });
        }

        let dot: f32 = self
            .vector
            .iter()
            .zip(&other.vector)
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.vector.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot / (norm_a * norm_b))
    }

    /// Returns a unit-length copy of this embedding.
    pub fn normalized(&self) -> Self {
        let norm: f32 = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return self.clone();
        }
        Self {
            vector: self.vector.iter().map(|x| x / norm).collect(),
        }
    }
}

/// A batch of embeddings in input order, tagged with the producing model.
///
/// The model version travels with every stored vector so that embeddings
/// computed under an older model can be invalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    /// One embedding per input text, in input order
    pub vectors: Vec<Embedding>,
    /// Model version that produced these vectors
    pub model_version: String,
}

/// Embedding provider abstraction.
///
/// Implementations are deterministic for identical input within one model
/// version, preserve input order, and fail the whole request on partial
/// failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a slice of texts, one vector per text, in order.
    ///
    /// Callers must respect [`max_batch_size`](Self::max_batch_size); use
    /// [`embed_chunked`] for arbitrarily large inputs.
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;

    /// Fixed dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Version tag of the underlying model.
    fn model_version(&self) -> &str;

    /// Maximum texts per request.
    fn max_batch_size(&self) -> usize {
        100
    }

    /// Returns the name of this provider.
    fn provider_name(&self) -> &str;
}

/// Embeds any number of texts by chunking at the provider's batch limit.
///
/// Order is preserved across chunks; a failure in any chunk fails the whole
/// call.
pub async fn embed_chunked<E>(provider: &E, texts: &[String]) -> Result<EmbeddingBatch>
where
    E: EmbeddingProvider + ?Sized,
{
    let chunk_size = provider.max_batch_size().max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(chunk_size) {
        let batch = provider.embed(chunk).await?;
        if batch.vectors.len() != chunk.len() {
            return Err(ReconError::adapter_permanent(
                provider.provider_name(),
                format!(
                    "embedding count mismatch: sent {}, received {}",
                    chunk.len(),
                    batch.vectors.len()
                ),
            ));
        }
        vectors.extend(batch.vectors);
    }

    Ok(EmbeddingBatch {
        vectors,
        model_version: provider.model_version().to_string(),
    })
}
