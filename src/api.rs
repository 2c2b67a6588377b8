//! HTTP surface for the document service.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /ingest` – Validate, embed, and store one document. Returns `201` with the document.
//! - `POST /batch_ingest` – Ingest a JSON array of documents; each item reports its own outcome.
//! - `POST /query` – Retrieve the most similar documents and optionally synthesize an answer.
//! - `GET /documents` – Page through stored documents (`offset`, `limit`).
//! - `GET /documents/{id}` / `DELETE /documents/{id}` – Fetch or remove one document.
//! - `GET /health` – Store and workflow status; always `200`, `degraded` when a dependency fails.
//! - `GET /debug/config` / `GET /debug/services` – Introspection for operators.
//!
//! Service errors become `{"error": kind, "message": text}` bodies with a status derived from
//! the error kind; no other layer knows about HTTP.

use crate::{
    app::AppState,
    config::Config,
    documents::{DEFAULT_LIST_LIMIT, Document, DocumentInput, MAX_LIST_LIMIT},
    embedding::EmbeddingError,
    error::ServiceError,
    metrics::MetricsSnapshot,
    repository::StoreError,
    workflow::{QueryRequest, QueryResult, WorkflowReadiness},
};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Build the HTTP router over the shared application state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest_document))
        .route("/batch_ingest", post(batch_ingest))
        .route("/query", post(query_documents))
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/health", get(health))
        .route("/debug/config", get(debug_config))
        .route("/debug/services", get(debug_services))
        .with_state(state)
}

async fn ingest_document(
    State(state): State<AppState>,
    payload: Result<Json<DocumentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let Json(input) = payload?;
    let document = state
        .documents
        .ingest(input.content, input.metadata.unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Outcome of one item in a batch ingestion.
#[derive(Serialize)]
struct BatchItemResult {
    index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

async fn batch_ingest(
    State(state): State<AppState>,
    payload: Result<Json<Vec<DocumentInput>>, JsonRejection>,
) -> Result<Json<Vec<BatchItemResult>>, AppError> {
    let Json(items) = payload?;
    let results = state.documents.batch_ingest(items).await;
    Ok(Json(
        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(document) => BatchItemResult {
                    index,
                    status: "success",
                    document: Some(document),
                    error: None,
                },
                Err(error) => BatchItemResult {
                    index,
                    status: "error",
                    document: None,
                    error: Some(ErrorBody::from(&error)),
                },
            })
            .collect(),
    ))
}

async fn query_documents(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.workflow.execute(request).await?))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ListResponse {
    offset: usize,
    limit: usize,
    documents: Vec<Document>,
}

async fn list_documents(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, AppError> {
    let Query(params) = params?;
    let offset = params.offset.unwrap_or(0);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let documents = state.documents.list(offset, limit).await?;
    Ok(Json(ListResponse {
        offset,
        limit,
        documents,
    }))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.documents.get(&id).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.documents.delete(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    workflow: &'static str,
    documents_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_error: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (store, readiness, count) = tokio::join!(
        state.repository.health(),
        state.workflow.readiness(),
        state.documents.count(),
    );
    let store_error = match (store, &count) {
        (Err(error), _) => Some(error.to_string()),
        (Ok(()), Err(error)) => Some(format!("document count failed: {error}")),
        (Ok(()), Ok(_)) => None,
    };
    let healthy = store_error.is_none() && readiness.ready;
    if !healthy {
        tracing::warn!(
            store_error = store_error.as_deref().unwrap_or(""),
            embedding_error = readiness.embedding_error.as_deref().unwrap_or(""),
            "Health check degraded"
        );
    }
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        store: if store_error.is_none() {
            "connected"
        } else {
            "disconnected"
        },
        workflow: if readiness.ready { "ready" } else { "not_ready" },
        documents_count: count.unwrap_or(0),
        store_error,
    })
}

/// Response body for `GET /debug/config`; the API key itself is never echoed.
#[derive(Serialize)]
struct DebugConfigResponse<'a> {
    #[serde(flatten)]
    config: &'a Config,
    qdrant_api_key_configured: bool,
}

async fn debug_config(State(state): State<AppState>) -> Response {
    let config = state.config.as_ref();
    Json(DebugConfigResponse {
        config,
        qdrant_api_key_configured: config.qdrant_api_key.is_some(),
    })
    .into_response()
}

/// Response body for `GET /debug/services`.
#[derive(Serialize)]
struct DebugServicesResponse {
    store: StoreStatus,
    workflow: WorkflowReadiness,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents_count: Option<u64>,
    metrics: MetricsSnapshot,
}

#[derive(Serialize)]
struct StoreStatus {
    backend: &'static str,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn debug_services(State(state): State<AppState>) -> Json<DebugServicesResponse> {
    let (store, workflow, count) = tokio::join!(
        state.repository.health(),
        state.workflow.readiness(),
        state.documents.count(),
    );
    Json(DebugServicesResponse {
        store: StoreStatus {
            backend: state.repository.backend(),
            healthy: store.is_ok(),
            error: store.err().map(|error| error.to_string()),
        },
        workflow,
        documents_count: count.ok(),
        metrics: state.metrics.snapshot(),
    })
}

/// JSON error body shared by every failing endpoint and by failed batch items.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(error: &ServiceError) -> Self {
        Self {
            error: error.kind(),
            message: error.to_string(),
        }
    }
}

struct AppError(ServiceError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Embedding(EmbeddingError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Embedding(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self(inner)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ServiceError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(ServiceError::Validation(rejection.body_text()))
    }
}
