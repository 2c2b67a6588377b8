//! Document data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Caller-supplied metadata: string keys mapped to scalar JSON values.
///
/// Backed by a sorted map, so key order never matters for equality.
pub type Metadata = Map<String, Value>;

/// A stored document together with its derived embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned at ingestion.
    pub id: Uuid,
    /// Text body exactly as supplied.
    pub content: String,
    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Embedding vector computed from `content`.
    pub embedding: Vec<f32>,
    /// Ingestion time as an RFC 3339 UTC timestamp.
    pub created_at: String,
}

impl Document {
    /// Assemble a freshly ingested document with a new identifier and the current time.
    pub fn new(content: String, metadata: Metadata, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            metadata,
            embedding,
            created_at: current_timestamp_rfc3339(),
        }
    }
}

/// Input accepted for a single ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    /// Text body to embed and store.
    pub content: String,
    /// Optional metadata; absent means empty.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Current timestamp formatted for storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
