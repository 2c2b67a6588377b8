//! Wire types and errors for the Qdrant REST API.

use crate::repository::StoreError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A stored point could not be turned back into a document.
    #[error("Malformed point {id}: {reason}")]
    MalformedPoint {
        /// Identifier of the offending point.
        id: String,
        /// What was missing or invalid.
        reason: String,
    },
}

impl QdrantError {
    /// Whether Qdrant answered 404, which it does for every call against a missing collection.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl From<QdrantError> for StoreError {
    fn from(error: QdrantError) -> Self {
        match &error {
            QdrantError::Http(inner)
                if inner.is_connect() || inner.is_timeout() || inner.is_request() =>
            {
                StoreError::Unavailable(error.to_string())
            }
            QdrantError::Http(inner) if inner.is_decode() => {
                StoreError::Malformed(error.to_string())
            }
            QdrantError::UnexpectedStatus { status, .. }
                if *status == StatusCode::SERVICE_UNAVAILABLE
                    || *status == StatusCode::BAD_GATEWAY
                    || *status == StatusCode::GATEWAY_TIMEOUT =>
            {
                StoreError::Unavailable(error.to_string())
            }
            QdrantError::MalformedPoint { .. } => StoreError::Malformed(error.to_string()),
            _ => StoreError::Rejected(error.to_string()),
        }
    }
}

/// Envelope shared by every Qdrant response.
#[derive(Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) result: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<StoredPoint>),
    Object {
        #[serde(default)]
        points: Vec<StoredPoint>,
    },
}

impl QueryResponseResult {
    pub(crate) fn into_points(self) -> Vec<StoredPoint> {
        match self {
            Self::Points(points) | Self::Object { points } => points,
        }
    }
}

/// Point as returned by query, retrieve, and scroll endpoints.
#[derive(Deserialize)]
pub(crate) struct StoredPoint {
    pub(crate) id: Value,
    #[serde(default)]
    pub(crate) score: Option<f32>,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) vector: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<StoredPoint>,
    #[serde(default)]
    pub(crate) next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: u64,
}
