//! Deterministic embedder that needs no model or network access.

use super::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256; the digest selects a vector slot
/// and a sign. The result is L2-normalized, so texts that share vocabulary land close together
/// under cosine similarity. Identical text always yields the identical vector.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Construct an embedder producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut slot_bytes = [0_u8; 8];
            slot_bytes.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(slot_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[slot] += sign;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::GenerationFailed(
                "cannot embed empty text".to_string(),
            ));
        }

        tracing::debug!(count = texts.len(), dimension = self.dimension, "Hashing embeddings");
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}
