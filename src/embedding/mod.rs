//! Embedding provider abstraction and adapters.

mod hashing;
mod ollama;

pub use hashing::HashEmbedder;
pub use ollama::OllamaEmbedder;

use crate::config::{Config, EmbeddingBackend};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider could not be reached at all.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider returned a vector whose length differs from the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the collection.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Produce one embedding vector per supplied text, in input order.
    async fn generate_embeddings(&self, texts: Vec<String>)
    -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Short backend identifier used in logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Embed a single text and check the vector against the expected dimension.
pub async fn embed_text(
    provider: &dyn EmbeddingProvider,
    text: &str,
    expected_dimension: usize,
) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = provider.generate_embeddings(vec![text.to_string()]).await?;
    if vectors.len() != 1 {
        return Err(EmbeddingError::GenerationFailed(format!(
            "expected 1 vector, provider returned {}",
            vectors.len()
        )));
    }
    let vector = vectors.remove(0);
    if vector.len() != expected_dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: expected_dimension,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

/// Build the embedding provider selected by configuration.
pub fn build_embedding_provider(
    config: &Config,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_provider {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.embedding_dimension)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.request_timeout(),
        )?),
    };
    tracing::info!(
        provider = provider.name(),
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Embedding provider initialized"
    );
    Ok(provider)
}
