//! Storage seam for documents.
//!
//! [`DocumentRepository`] is the only way the services touch stored documents. Swapping the
//! vector store means providing another implementation; no caller changes.

mod memory;

pub use memory::InMemoryRepository;

use crate::documents::{Document, Metadata};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by repository implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the request.
    #[error("Vector store request failed: {0}")]
    Rejected(String),
    /// The store returned data that does not describe a valid document.
    #[error("Vector store returned malformed data: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Whether the failure came from the store being unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Similarity search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Identifier of the matching document.
    pub id: Uuid,
    /// Cosine similarity between the query vector and the document vector.
    pub score: f32,
    /// Stored text body.
    pub content: String,
    /// Stored metadata.
    pub metadata: Metadata,
}

/// Domain-level operations over the vector store.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist a document under its identifier.
    async fn save(&self, document: &Document) -> Result<(), StoreError>;

    /// Fetch a document; `None` when absent.
    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Remove a document; `false` when it was absent.
    ///
    /// Concurrent deletes of one id through the same repository report `true` at most once.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Return up to `top_k` documents nearest to `embedding`, best first.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError>;

    /// Return a page of documents in store-defined order.
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, StoreError>;

    /// Number of stored documents.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Verify the store is reachable and ready for reads and writes.
    async fn health(&self) -> Result<(), StoreError>;

    /// Short backend identifier used in logs and diagnostics.
    fn backend(&self) -> &'static str;
}

/// Cosine similarity; `0.0` when either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
