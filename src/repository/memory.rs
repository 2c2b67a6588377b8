//! Process-local document store using cosine similarity.

use super::{DocumentRepository, SearchHit, StoreError, cosine_similarity};
use crate::documents::Document;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory repository backed by a map plus an insertion-order index.
///
/// All state sits behind one `tokio::sync::RwLock`, so a save or delete is atomic with respect
/// to concurrent readers. Listing follows insertion order.
#[derive(Debug)]
pub struct InMemoryRepository {
    dimension: usize,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    order: Vec<Uuid>,
}

impl InMemoryRepository {
    /// Create an empty store accepting vectors of `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(State::default()),
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        if document.embedding.len() != self.dimension {
            return Err(StoreError::Rejected(format!(
                "vector size {} does not match collection size {}",
                document.embedding.len(),
                self.dimension
            )));
        }
        let mut state = self.state.write().await;
        if state
            .documents
            .insert(document.id, document.clone())
            .is_none()
        {
            state.order.push(document.id);
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.documents.remove(&id).is_none() {
            return Ok(false);
        }
        state.order.retain(|existing| *existing != id);
        Ok(true)
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if embedding.len() != self.dimension {
            return Err(StoreError::Rejected(format!(
                "query vector size {} does not match collection size {}",
                embedding.len(),
                self.dimension
            )));
        }
        let state = self.state.read().await;
        let mut hits: Vec<SearchHit> = state
            .documents
            .values()
            .map(|document| SearchHit {
                id: document.id,
                score: cosine_similarity(&document.embedding, embedding),
                content: document.content.clone(),
                metadata: document.metadata.clone(),
            })
            .collect();
        drop(state);

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| state.documents.get(id).cloned())
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.state.read().await.documents.len() as u64)
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
