//! Composition root: builds every component once from the configuration.

use crate::{
    config::{Config, VectorStoreBackend},
    documents::DocumentService,
    embedding::{EmbeddingError, EmbeddingProvider, build_embedding_provider},
    metrics::ServiceMetrics,
    qdrant::{QdrantError, QdrantRepository, QdrantSettings},
    repository::{DocumentRepository, InMemoryRepository},
    workflow::{QueryWorkflow, SynthesisError, Synthesizer, build_synthesizer},
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Embedding provider could not be constructed.
    #[error("failed to initialize embedding provider: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Synthesizer could not be constructed.
    #[error("failed to initialize synthesizer: {0}")]
    Synthesis(#[from] SynthesisError),
    /// Vector store client could not be constructed.
    #[error("failed to initialize vector store: {0}")]
    Store(#[from] QdrantError),
}

/// Shared handles passed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    /// Immutable runtime configuration.
    pub config: Arc<Config>,
    /// Document lifecycle operations.
    pub documents: Arc<DocumentService>,
    /// Query execution.
    pub workflow: Arc<QueryWorkflow>,
    /// Storage backend, used directly for health checks.
    pub repository: Arc<dyn DocumentRepository>,
    /// Activity counters.
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Assemble the services around explicitly supplied collaborators.
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn EmbeddingProvider>,
        repository: Arc<dyn DocumentRepository>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
    ) -> Self {
        let metrics = Arc::new(ServiceMetrics::new());
        let documents = Arc::new(DocumentService::new(
            embedder.clone(),
            repository.clone(),
            config.embedding_dimension,
            metrics.clone(),
        ));
        let workflow = Arc::new(QueryWorkflow::new(
            embedder,
            repository.clone(),
            synthesizer,
            config.embedding_dimension,
            config.max_retrieval_results,
            metrics.clone(),
        ));
        Self {
            config,
            documents,
            workflow,
            repository,
            metrics,
        }
    }
}

/// Build the application state for `config`, selecting backends as configured.
///
/// An unreachable Qdrant does not stop startup: the collection is created on the first write
/// and `/health` reports the store as degraded in the meantime.
pub async fn build_state(config: Config) -> Result<AppState, StartupError> {
    let config = Arc::new(config);
    let embedder = build_embedding_provider(&config)?;
    let synthesizer = build_synthesizer(&config)?;

    let repository: Arc<dyn DocumentRepository> = match config.vector_store {
        VectorStoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; documents are lost on restart");
            Arc::new(InMemoryRepository::new(config.embedding_dimension))
        }
        VectorStoreBackend::Qdrant => {
            let repository = QdrantRepository::new(QdrantSettings {
                url: config.qdrant_url.clone(),
                api_key: config.qdrant_api_key.clone(),
                collection: config.collection_name.clone(),
                dimension: config.embedding_dimension,
                timeout: config.request_timeout(),
            })?;
            if let Err(error) = repository.ensure_collection().await {
                tracing::warn!(
                    url = %config.qdrant_url,
                    collection = %config.collection_name,
                    error = %error,
                    "Qdrant not ready at startup; will retry on first write"
                );
            }
            Arc::new(repository)
        }
    };
    tracing::info!(
        store = repository.backend(),
        collection = %config.collection_name,
        "Document repository initialized"
    );

    Ok(AppState::new(config, embedder, repository, synthesizer))
}
