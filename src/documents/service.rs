//! Document service coordinating validation, embedding, and repository writes.

use crate::{
    documents::{
        types::{Document, DocumentInput, Metadata},
        validate::{check_metadata, parse_document_id, require_text},
    },
    embedding::{EmbeddingProvider, embed_text},
    error::ServiceError,
    metrics::ServiceMetrics,
    repository::DocumentRepository,
};
use futures_util::{StreamExt, stream};
use std::sync::Arc;

/// Maximum number of batch items embedded and stored concurrently.
const BATCH_CONCURRENCY: usize = 8;
/// Page size used when a listing does not specify one.
pub const DEFAULT_LIST_LIMIT: usize = 10;
/// Upper bound on a single listing page.
pub const MAX_LIST_LIMIT: usize = 100;

/// Creates, fetches, lists, and deletes documents.
///
/// Collaborators arrive through [`DocumentService::new`]; the service holds no mutable state of
/// its own besides atomic counters, so one instance serves any number of concurrent requests.
pub struct DocumentService {
    embedder: Arc<dyn EmbeddingProvider>,
    repository: Arc<dyn DocumentRepository>,
    dimension: usize,
    metrics: Arc<ServiceMetrics>,
}

impl DocumentService {
    /// Wire the service to its embedding provider and repository.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        repository: Arc<dyn DocumentRepository>,
        dimension: usize,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            embedder,
            repository,
            dimension,
            metrics,
        }
    }

    /// Validate, embed, and store one document.
    ///
    /// The document is written with a single repository call, so an abandoned request either
    /// stored the whole document or nothing.
    pub async fn ingest(
        &self,
        content: String,
        metadata: Metadata,
    ) -> Result<Document, ServiceError> {
        let result = self.ingest_inner(content, metadata).await;
        match &result {
            Ok(document) => {
                self.metrics.record_ingest();
                tracing::info!(
                    id = %document.id,
                    chars = document.content.len(),
                    metadata_keys = document.metadata.len(),
                    "Document ingested"
                );
            }
            Err(error) => {
                self.metrics.record_ingest_failure();
                tracing::warn!(kind = error.kind(), error = %error, "Document ingestion failed");
            }
        }
        result
    }

    async fn ingest_inner(
        &self,
        content: String,
        metadata: Metadata,
    ) -> Result<Document, ServiceError> {
        require_text(&content, "content")?;
        check_metadata(&metadata)?;

        let embedding = embed_text(self.embedder.as_ref(), &content, self.dimension).await?;
        let document = Document::new(content, metadata, embedding);
        self.repository.save(&document).await?;
        Ok(document)
    }

    /// Ingest every item independently, preserving input order in the output.
    ///
    /// One item failing never affects the others; the caller inspects each result. The batch
    /// is not transactional: items that succeeded stay stored regardless of later failures.
    pub async fn batch_ingest(
        &self,
        items: Vec<DocumentInput>,
    ) -> Vec<Result<Document, ServiceError>> {
        let total = items.len();
        let results: Vec<Result<Document, ServiceError>> = stream::iter(items)
            .map(|item| self.ingest(item.content, item.metadata.unwrap_or_default()))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;
        let failed = results.iter().filter(|result| result.is_err()).count();
        tracing::info!(total, succeeded = total - failed, failed, "Batch ingestion completed");
        results
    }

    /// Fetch a stored document.
    pub async fn get(&self, id: &str) -> Result<Document, ServiceError> {
        let uuid = parse_document_id(id)?;
        self.repository
            .get(uuid)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Remove a stored document; fails with `NotFound` when it is absent.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let uuid = parse_document_id(id)?;
        if !self.repository.delete(uuid).await? {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        self.metrics.record_delete();
        tracing::info!(id = %uuid, "Document deleted");
        Ok(())
    }

    /// Return one page of stored documents.
    ///
    /// Order is whatever the backing store yields and is not guaranteed to be stable across
    /// backends. `limit` is clamped to `1..=MAX_LIST_LIMIT`.
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, ServiceError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        Ok(self.repository.list(offset, limit).await?)
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(self.repository.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, HashEmbedder};
    use crate::repository::InMemoryRepository;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;

    const DIM: usize = 32;

    fn service() -> (DocumentService, Arc<ServiceMetrics>) {
        service_with(Arc::new(HashEmbedder::new(DIM)))
    }

    fn service_with(embedder: Arc<dyn EmbeddingProvider>) -> (DocumentService, Arc<ServiceMetrics>) {
        let metrics = Arc::new(ServiceMetrics::new());
        let service = DocumentService::new(
            embedder,
            Arc::new(InMemoryRepository::new(DIM)),
            DIM,
            metrics.clone(),
        );
        (service, metrics)
    }

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().expect("object")
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
        }

        fn name(&self) -> &'static str {
            "short"
        }
    }

    #[tokio::test]
    async fn ingest_then_get_returns_identical_document() {
        let (service, metrics) = service();
        let meta = metadata(json!({ "source": "handbook", "page": 7, "public": true }));
        let stored = service
            .ingest("Rust has no garbage collector.".into(), meta.clone())
            .await
            .expect("ingest");

        let fetched = service.get(&stored.id.to_string()).await.expect("get");
        assert_eq!(fetched.content, "Rust has no garbage collector.");
        assert_eq!(fetched.metadata, meta);
        assert_eq!(fetched.embedding.len(), DIM);
        assert_eq!(fetched, stored);
        assert_eq!(metrics.snapshot().documents_ingested, 1);
    }

    #[tokio::test]
    async fn empty_content_is_a_validation_error() {
        let (service, metrics) = service();
        let error = service
            .ingest("   ".into(), Metadata::new())
            .await
            .expect_err("empty");
        assert!(matches!(error, ServiceError::Validation(_)));
        assert_eq!(service.count().await.expect("count"), 0);
        assert_eq!(metrics.snapshot().ingest_failures, 1);
    }

    #[tokio::test]
    async fn nested_metadata_is_a_validation_error() {
        let (service, _) = service();
        let error = service
            .ingest("body".into(), metadata(json!({ "tags": ["a"] })))
            .await
            .expect_err("nested");
        assert!(matches!(error, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_dimension_is_an_embedding_error() {
        let (service, _) = service_with(Arc::new(ShortEmbedder));
        let error = service
            .ingest("body".into(), Metadata::new())
            .await
            .expect_err("dimension");
        assert!(matches!(
            error,
            ServiceError::Embedding(EmbeddingError::DimensionMismatch { expected: DIM, actual: 4 })
        ));
        assert_eq!(service.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn delete_succeeds_exactly_once() {
        let (service, metrics) = service();
        let stored = service
            .ingest("to be removed".into(), Metadata::new())
            .await
            .expect("ingest");
        let id = stored.id.to_string();

        service.delete(&id).await.expect("first delete");
        let error = service.delete(&id).await.expect_err("second delete");
        assert!(matches!(error, ServiceError::NotFound(ref missing) if *missing == id));
        assert!(matches!(service.get(&id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(metrics.snapshot().documents_deleted, 1);
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.delete("definitely-not-a-uuid").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn batch_reports_each_item_independently() {
        let (service, _) = service();
        let items: Vec<DocumentInput> = ["first", "second", "", "fourth", "fifth"]
            .into_iter()
            .map(|content| DocumentInput {
                content: content.into(),
                metadata: None,
            })
            .collect();

        let results = service.batch_ingest(items).await;
        assert_eq!(results.len(), 5);
        assert!(matches!(results[2], Err(ServiceError::Validation(_))));
        for (index, result) in results.iter().enumerate() {
            if index != 2 {
                let document = result.as_ref().expect("success");
                assert_ne!(document.content, "");
            }
        }
        assert_eq!(results[3].as_ref().expect("fourth").content, "fourth");
        assert_eq!(service.count().await.expect("count"), 4);
    }

    #[tokio::test]
    async fn concurrent_ingests_get_distinct_ids() {
        let (service, _) = service();
        let service = Arc::new(service);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .ingest(format!("concurrent document {i}"), Metadata::new())
                        .await
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let document = handle.await.expect("join").expect("ingest");
            assert!(ids.insert(document.id), "duplicate id {}", document.id);
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(service.count().await.expect("count"), 16);

        let listed: HashSet<_> = service
            .list(0, MAX_LIST_LIMIT)
            .await
            .expect("list")
            .into_iter()
            .map(|document| document.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn list_clamps_limit() {
        let (service, _) = service();
        for i in 0..3 {
            service
                .ingest(format!("doc {i}"), Metadata::new())
                .await
                .expect("ingest");
        }
        assert_eq!(service.list(0, 0).await.expect("list").len(), 1);
        assert_eq!(service.list(1, 10).await.expect("list").len(), 2);
    }
}
