//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::{QdrantRepository, QdrantSettings};
pub use payload::compute_content_hash;
pub use types::QdrantError;
