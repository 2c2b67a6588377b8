//! Conversions between documents and Qdrant points.

use crate::documents::{Document, Metadata};
use crate::qdrant::types::{QdrantError, StoredPoint};
use crate::repository::SearchHit;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Build the point body (`id`, `vector`, `payload`) stored for a document.
pub(crate) fn document_to_point(document: &Document) -> Value {
    json!({
        "id": document.id.to_string(),
        "vector": document.embedding,
        "payload": build_payload(document),
    })
}

/// Build the payload object stored alongside each vector.
pub(crate) fn build_payload(document: &Document) -> Value {
    let mut payload = Map::new();
    payload.insert("content".into(), Value::String(document.content.clone()));
    payload.insert("metadata".into(), Value::Object(document.metadata.clone()));
    payload.insert(
        "created_at".into(),
        Value::String(document.created_at.clone()),
    );
    payload.insert(
        "content_hash".into(),
        Value::String(compute_content_hash(&document.content)),
    );
    Value::Object(payload)
}

/// Rebuild a document from a point that was fetched with payload and vector.
pub(crate) fn point_to_document(point: StoredPoint) -> Result<Document, QdrantError> {
    let raw_id = stringify_point_id(point.id);
    let fields = parse_payload(&raw_id, point.payload)?;
    let embedding = parse_vector(point.vector)
        .ok_or_else(|| malformed(&raw_id, "vector missing"))?;

    Ok(Document {
        id: fields.id,
        content: fields.content,
        metadata: fields.metadata,
        embedding,
        created_at: fields.created_at,
    })
}

/// Turn a scored point into a search hit; the vector is not required.
pub(crate) fn point_to_hit(point: StoredPoint) -> Result<SearchHit, QdrantError> {
    let raw_id = stringify_point_id(point.id);
    let score = point.score.unwrap_or_default();
    let fields = parse_payload(&raw_id, point.payload)?;
    Ok(SearchHit {
        id: fields.id,
        score,
        content: fields.content,
        metadata: fields.metadata,
    })
}

struct PayloadFields {
    id: Uuid,
    content: String,
    metadata: Metadata,
    created_at: String,
}

fn malformed(id: &str, reason: &str) -> QdrantError {
    QdrantError::MalformedPoint {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_payload(
    raw_id: &str,
    payload: Option<Map<String, Value>>,
) -> Result<PayloadFields, QdrantError> {
    let id = Uuid::parse_str(raw_id).map_err(|_| malformed(raw_id, "id is not a UUID"))?;
    let mut payload = payload.ok_or_else(|| malformed(raw_id, "payload missing"))?;
    let content = match payload.remove("content") {
        Some(Value::String(text)) => text,
        _ => return Err(malformed(raw_id, "content missing")),
    };
    let metadata: Metadata = match payload.remove("metadata") {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Metadata::new(),
        Some(_) => return Err(malformed(raw_id, "metadata is not an object")),
    };
    let created_at = match payload.remove("created_at") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    Ok(PayloadFields {
        id,
        content,
        metadata,
        created_at,
    })
}

fn parse_vector(vector: Option<Value>) -> Option<Vec<f32>> {
    match vector? {
        Value::Array(values) => values
            .iter()
            .map(|value| value.as_f64().map(|number| number as f32))
            .collect(),
        _ => None,
    }
}

/// Compute a deterministic SHA-256 hash for the document text.
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
