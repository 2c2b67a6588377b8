//! Document ingestion and lifecycle: validation, embedding, and persistence.

mod service;
pub mod types;
mod validate;

pub use service::{DEFAULT_LIST_LIMIT, DocumentService, MAX_LIST_LIMIT};
pub use types::{Document, DocumentInput, Metadata};

pub(crate) use validate::require_text;
