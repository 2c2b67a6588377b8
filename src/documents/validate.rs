//! Input checks applied before any embedding or storage work.

use super::types::Metadata;
use crate::error::ServiceError;
use serde_json::Value;
use uuid::Uuid;

/// Reject empty or whitespace-only text.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Ensure every metadata entry has a non-empty key and a scalar value.
pub(crate) fn check_metadata(metadata: &Metadata) -> Result<(), ServiceError> {
    for (key, value) in metadata {
        if key.trim().is_empty() {
            return Err(ServiceError::Validation(
                "metadata keys must not be empty".into(),
            ));
        }
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
            Value::Null | Value::Array(_) | Value::Object(_) => {
                return Err(ServiceError::Validation(format!(
                    "metadata value for '{key}' must be a string, number, or boolean"
                )));
            }
        }
    }
    Ok(())
}

/// Parse a document identifier; anything that is not a UUID cannot exist.
pub(crate) fn parse_document_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::NotFound(raw.to_string()))
}
