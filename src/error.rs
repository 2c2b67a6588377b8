//! Error taxonomy shared by the document and workflow services.

use crate::embedding::EmbeddingError;
use crate::repository::StoreError;
use thiserror::Error;

/// Errors surfaced by the service layer.
///
/// Transport concerns (status codes, response bodies) live in [`crate::api`]; this type only
/// says what went wrong.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input was malformed.
    #[error("{0}")]
    Validation(String),
    /// The referenced document does not exist.
    #[error("Document {0} not found")]
    NotFound(String),
    /// The embedding provider failed or produced unusable output.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The vector store failed or returned inconsistent data.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Stable machine-readable identifier for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Embedding(_) => "embedding_error",
            Self::Store(_) => "store_error",
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NotFound(_) => false,
            Self::Embedding(EmbeddingError::DimensionMismatch { .. }) => false,
            Self::Embedding(_) => true,
            Self::Store(error) => error.is_unavailable(),
        }
    }
}
