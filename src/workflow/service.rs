use crate::{
    documents::require_text,
    embedding::{EmbeddingProvider, embed_text},
    error::ServiceError,
    metrics::ServiceMetrics,
    repository::{DocumentRepository, SearchHit},
    workflow::{
        synthesis::Synthesizer,
        types::{QueryRequest, QueryResult, RetrievedDocument, SynthesisOutcome, WorkflowState},
    },
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

const READINESS_SAMPLE_TEXT: &str = "readiness check";

/// Answers questions by retrieving, ranking, and optionally synthesizing over stored documents.
///
/// Each execution runs `validate → embed → retrieve → rank → synthesize` over its own
/// [`WorkflowState`]; nothing is shared between executions besides the injected collaborators.
pub struct QueryWorkflow {
    embedder: Arc<dyn EmbeddingProvider>,
    repository: Arc<dyn DocumentRepository>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    dimension: usize,
    max_results: usize,
    metrics: Arc<ServiceMetrics>,
}

/// Readiness report for the workflow's collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReadiness {
    /// Whether a query could be embedded right now.
    pub ready: bool,
    /// Embedding backend identifier.
    pub embedding_provider: &'static str,
    /// Embedding failure, when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_error: Option<String>,
    /// Configured synthesizer, or `none`.
    pub synthesizer: &'static str,
}

impl QueryWorkflow {
    /// Wire the workflow to its collaborators.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        repository: Arc<dyn DocumentRepository>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        dimension: usize,
        max_results: usize,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            embedder,
            repository,
            synthesizer,
            dimension,
            max_results: max_results.max(1),
            metrics,
        }
    }

    /// Effective `top_k` for a request: the configured maximum when absent, clamped otherwise.
    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.max_results)
            .clamp(1, self.max_results)
    }

    /// Run one query end to end.
    ///
    /// Validation, embedding, and retrieval failures abort with a typed error. Synthesis
    /// failures do not: the result carries ranked documents and an `unavailable` outcome.
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryResult, ServiceError> {
        let started = Instant::now();
        let top_k = self.effective_top_k(request.top_k);
        let mut state = WorkflowState::new(request.query, top_k);

        require_text(&state.query, "query")?;
        state.step("validated_query");

        state.query_embedding =
            embed_text(self.embedder.as_ref(), &state.query, self.dimension).await?;
        state.step("embedded_query");

        let hits = self
            .repository
            .search(&state.query_embedding, state.top_k)
            .await?;
        state.step("retrieved_documents");

        state.candidates = rank(hits, state.top_k);
        state.step("ranked_documents");

        self.synthesize(&mut state).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_query(state.synthesis.fell_back());
        tracing::info!(
            top_k = state.top_k,
            returned = state.candidates.len(),
            synthesis = ?state.synthesis,
            elapsed_ms,
            "Query answered"
        );
        Ok(state.into_result(elapsed_ms))
    }

    async fn synthesize(&self, state: &mut WorkflowState) {
        let Some(synthesizer) = &self.synthesizer else {
            state.synthesis = SynthesisOutcome::Disabled;
            return;
        };
        if state.candidates.is_empty() {
            state.synthesis = SynthesisOutcome::NoDocuments;
            return;
        }

        match synthesizer.synthesize(&state.query, &state.candidates).await {
            Ok(answer) => {
                state.answer = Some(answer);
                state.synthesis = SynthesisOutcome::Generated {
                    synthesizer: synthesizer.name().to_string(),
                };
                state.step("generated_answer");
            }
            Err(error) => {
                tracing::warn!(
                    synthesizer = synthesizer.name(),
                    error = %error,
                    "Answer synthesis failed; returning ranked documents only"
                );
                state.synthesis = SynthesisOutcome::Unavailable {
                    synthesizer: synthesizer.name().to_string(),
                    reason: error.to_string(),
                };
            }
        }
    }

    /// Embed a sample text and report the configured synthesizer.
    pub async fn readiness(&self) -> WorkflowReadiness {
        let sample = embed_text(self.embedder.as_ref(), READINESS_SAMPLE_TEXT, self.dimension).await;
        WorkflowReadiness {
            ready: sample.is_ok(),
            embedding_provider: self.embedder.name(),
            embedding_error: sample.err().map(|error| error.to_string()),
            synthesizer: self
                .synthesizer
                .as_ref()
                .map(|synthesizer| synthesizer.name())
                .unwrap_or("none"),
        }
    }
}

/// Order by descending score, then ascending id, and keep the first `top_k`.
fn rank(hits: Vec<SearchHit>, top_k: usize) -> Vec<RetrievedDocument> {
    let mut hits = hits;
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(top_k);
    hits.into_iter()
        .map(|hit| RetrievedDocument {
            id: hit.id,
            content: hit.content,
            metadata: hit.metadata,
            score: hit.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Document, DocumentService, Metadata};
    use crate::embedding::{EmbeddingError, HashEmbedder};
    use crate::repository::{InMemoryRepository, StoreError};
    use crate::workflow::synthesis::{ExtractiveSynthesizer, SynthesisError};
    use async_trait::async_trait;
    use uuid::Uuid;

    const DIM: usize = 64;

    struct FailingSynthesizer;

    #[async_trait]
    impl Synthesizer for FailingSynthesizer {
        async fn synthesize(
            &self,
            _query: &str,
            _documents: &[RetrievedDocument],
        ) -> Result<String, SynthesisError> {
            Err(SynthesisError::ProviderUnavailable("connection refused".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct DownRepository;

    #[async_trait]
    impl DocumentRepository for DownRepository {
        async fn save(&self, _document: &Document) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn get(&self, _id: Uuid) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn delete(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn search(&self, _e: &[f32], _k: usize) -> Result<Vec<SearchHit>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn list(&self, _o: usize, _l: usize) -> Result<Vec<Document>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn health(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn backend(&self) -> &'static str {
            "down"
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("no runtime".into()))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct Fixture {
        documents: DocumentService,
        workflow: QueryWorkflow,
        metrics: Arc<ServiceMetrics>,
    }

    fn fixture(synthesizer: Option<Arc<dyn Synthesizer>>, max_results: usize) -> Fixture {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(DIM));
        let repository: Arc<dyn DocumentRepository> = Arc::new(InMemoryRepository::new(DIM));
        let metrics = Arc::new(ServiceMetrics::new());
        Fixture {
            documents: DocumentService::new(
                embedder.clone(),
                repository.clone(),
                DIM,
                metrics.clone(),
            ),
            workflow: QueryWorkflow::new(
                embedder,
                repository,
                synthesizer,
                DIM,
                max_results,
                metrics.clone(),
            ),
            metrics,
        }
    }

    fn request(query: &str, top_k: Option<usize>) -> QueryRequest {
        QueryRequest {
            query: query.into(),
            top_k,
        }
    }

    async fn seed(documents: &DocumentService) {
        for content in [
            "Rust guarantees memory safety without a garbage collector.",
            "Tokio is an asynchronous runtime for Rust.",
            "Qdrant is a vector database written in Rust.",
            "Sourdough bread needs a starter and patience.",
            "Cosine similarity compares the angle between vectors.",
        ] {
            documents
                .ingest(content.into(), Metadata::new())
                .await
                .expect("seed");
        }
    }

    #[tokio::test]
    async fn empty_store_returns_empty_result() {
        let f = fixture(Some(Arc::new(ExtractiveSynthesizer)), 5);
        let result = f
            .workflow
            .execute(request("anything at all", None))
            .await
            .expect("query");
        assert!(result.documents.is_empty());
        assert_eq!(result.answer, None);
        assert_eq!(result.synthesis, SynthesisOutcome::NoDocuments);
        assert_eq!(result.top_k, 5);
    }

    #[tokio::test]
    async fn results_respect_top_k_and_descend_by_score() {
        let f = fixture(Some(Arc::new(ExtractiveSynthesizer)), 5);
        seed(&f.documents).await;

        let result = f
            .workflow
            .execute(request("Rust runtime", Some(3)))
            .await
            .expect("query");

        assert_eq!(result.top_k, 3);
        assert!(result.documents.len() <= 3);
        assert!(!result.documents.is_empty());
        for pair in result.documents.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for document in &result.documents {
            assert!((-1.0..=1.0).contains(&document.score));
        }
        let answer = result.answer.expect("answer");
        assert!(answer.starts_with("Based on the most relevant document: "));
        assert!(answer.contains(&result.documents[0].content));
        assert_eq!(
            result.processing_steps,
            vec![
                "validated_query",
                "embedded_query",
                "retrieved_documents",
                "ranked_documents",
                "generated_answer"
            ]
        );
        assert_eq!(f.metrics.snapshot().queries_served, 1);
    }

    #[tokio::test]
    async fn top_k_is_clamped_to_configured_maximum() {
        let f = fixture(None, 2);
        seed(&f.documents).await;
        let result = f
            .workflow
            .execute(request("Rust", Some(50)))
            .await
            .expect("query");
        assert_eq!(result.top_k, 2);
        assert_eq!(result.documents.len(), 2);
        assert_eq!(f.workflow.effective_top_k(Some(0)), 1);
    }

    #[tokio::test]
    async fn blank_query_is_a_validation_error() {
        let f = fixture(None, 5);
        let error = f
            .workflow
            .execute(request("  \n", None))
            .await
            .expect_err("blank");
        assert!(matches!(error, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_documents() {
        let f = fixture(Some(Arc::new(FailingSynthesizer)), 5);
        seed(&f.documents).await;

        let result = f
            .workflow
            .execute(request("vector database", None))
            .await
            .expect("query succeeds despite synthesis failure");

        assert!(!result.documents.is_empty());
        assert_eq!(result.answer, None);
        assert!(matches!(
            result.synthesis,
            SynthesisOutcome::Unavailable { ref synthesizer, ref reason }
                if synthesizer == "failing" && reason.contains("connection refused")
        ));
        assert_eq!(f.metrics.snapshot().synthesis_fallbacks, 1);
    }

    #[tokio::test]
    async fn disabled_synthesis_returns_documents_only() {
        let f = fixture(None, 5);
        seed(&f.documents).await;
        let result = f
            .workflow
            .execute(request("bread", None))
            .await
            .expect("query");
        assert_eq!(result.synthesis, SynthesisOutcome::Disabled);
        assert_eq!(result.answer, None);
        assert_eq!(result.documents.len(), 5);
    }

    #[tokio::test]
    async fn store_failure_aborts_query() {
        let workflow = QueryWorkflow::new(
            Arc::new(HashEmbedder::new(DIM)),
            Arc::new(DownRepository),
            None,
            DIM,
            5,
            Arc::new(ServiceMetrics::new()),
        );
        let error = workflow
            .execute(request("anything", None))
            .await
            .expect_err("store down");
        assert!(matches!(error, ServiceError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn readiness_reports_embedding_failures() {
        let workflow = QueryWorkflow::new(
            Arc::new(BrokenEmbedder),
            Arc::new(InMemoryRepository::new(DIM)),
            Some(Arc::new(ExtractiveSynthesizer)),
            DIM,
            5,
            Arc::new(ServiceMetrics::new()),
        );
        let readiness = workflow.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.embedding_provider, "broken");
        assert_eq!(readiness.synthesizer, "extractive");
        assert!(readiness.embedding_error.is_some());
    }

    #[test]
    fn ties_are_broken_by_ascending_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let ranked = rank(vec![hit(high, 0.5), hit(low, 0.5), hit(Uuid::from_u128(3), 0.9)], 2);
        let ids: Vec<Uuid> = ranked.iter().map(|doc| doc.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(3), low]);
    }

    #[test]
    fn non_finite_scores_rank_deterministically() {
        let ids = |hits: Vec<SearchHit>| -> Vec<u128> {
            rank(hits, 4).iter().map(|doc| doc.id.as_u128()).collect()
        };
        let forward = ids(vec![
            hit(Uuid::from_u128(1), 0.2),
            hit(Uuid::from_u128(2), f32::NAN),
            hit(Uuid::from_u128(3), f32::NEG_INFINITY),
            hit(Uuid::from_u128(4), 0.8),
        ]);
        let reversed = ids(vec![
            hit(Uuid::from_u128(4), 0.8),
            hit(Uuid::from_u128(3), f32::NEG_INFINITY),
            hit(Uuid::from_u128(2), f32::NAN),
            hit(Uuid::from_u128(1), 0.2),
        ]);
        assert_eq!(forward, vec![2, 4, 1, 3]);
        assert_eq!(forward, reversed);
    }

    fn hit(id: Uuid, score: f32) -> SearchHit {
        SearchHit {
            id,
            score,
            content: id.to_string(),
            metadata: Metadata::new(),
        }
    }
}
