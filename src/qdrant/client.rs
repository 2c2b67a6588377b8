//! Qdrant-backed [`DocumentRepository`] speaking the REST API.

use crate::documents::Document;
use crate::qdrant::{
    payload::{document_to_point, point_to_document, point_to_hit},
    types::{ApiResponse, CountResult, QdrantError, QueryResponseResult, ScrollResult, StoredPoint},
};
use crate::repository::{DocumentRepository, SearchHit, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

/// Largest page requested from the scroll endpoint in one round trip.
const SCROLL_PAGE_LIMIT: usize = 256;
/// Upper bound on establishing a TCP connection, independent of the request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`QdrantRepository`].
#[derive(Debug, Clone)]
pub struct QdrantSettings {
    /// Base URL of the Qdrant HTTP API.
    pub url: String,
    /// Optional API key sent as the `api-key` header.
    pub api_key: Option<String>,
    /// Collection holding the documents.
    pub collection: String,
    /// Vector size of the collection.
    pub dimension: usize,
    /// Deadline for each request; slower responses surface as unavailable.
    pub timeout: Duration,
}

/// Document repository persisted in a single Qdrant collection.
///
/// Point ids are document UUIDs; the payload holds content, metadata, creation time, and a
/// content hash. The collection is created with cosine distance the first time it is needed.
pub struct QdrantRepository {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) dimension: usize,
    collection_ready: OnceCell<()>,
    /// One slot per id with a delete in flight; `true` once a holder removed the point.
    delete_slots: Mutex<HashMap<Uuid, Arc<Mutex<bool>>>>,
}

impl QdrantRepository {
    /// Build a client for the configured instance. Performs no network I/O.
    pub fn new(settings: QdrantSettings) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("docqa/0.1")
            .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout))
            .timeout(settings.timeout)
            .build()?;
        let base_url = normalize_base_url(&settings.url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %settings.collection,
            has_api_key = settings
                .api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            collection: settings.collection,
            dimension: settings.dimension,
            collection_ready: OnceCell::new(),
            delete_slots: Mutex::new(HashMap::new()),
        })
    }

    /// Create the collection when it is missing.
    ///
    /// Succeeds at most once per process; after a failure the next call tries again.
    pub async fn ensure_collection(&self) -> Result<(), QdrantError> {
        self.collection_ready
            .get_or_try_init(|| async {
                if self.collection_exists().await? {
                    tracing::debug!(collection = %self.collection, "Collection already present");
                    return Ok(());
                }
                tracing::info!(
                    collection = %self.collection,
                    vector_size = self.dimension,
                    "Creating collection"
                );
                self.create_collection().await
            })
            .await
            .map(|_| ())
    }

    async fn create_collection(&self) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            // Another writer created it between our check and this call.
            StatusCode::CONFLICT => Ok(()),
            _ => self.ensure_success(response).await,
        }
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn upsert_point(&self, document: &Document) -> Result<(), QdrantError> {
        self.ensure_collection().await?;
        let response = self
            .request(Method::PUT, &self.points_path(""))
            .query(&[("wait", true)])
            .json(&json!({ "points": [document_to_point(document)] }))
            .send()
            .await?;
        self.ensure_success(response).await
    }

    async fn retrieve_point(&self, id: Uuid) -> Result<Option<Document>, QdrantError> {
        let body = json!({
            "ids": [id.to_string()],
            "with_payload": true,
            "with_vector": true,
        });
        let points: Vec<StoredPoint> = self.post_json(&self.points_path(""), &body).await?;
        points.into_iter().next().map(point_to_document).transpose()
    }

    async fn delete_point(&self, id: Uuid) -> Result<(), QdrantError> {
        let response = self
            .request(Method::POST, &self.points_path("/delete"))
            .query(&[("wait", true)])
            .json(&json!({ "points": [id.to_string()] }))
            .send()
            .await?;
        self.ensure_success(response).await
    }

    async fn query_points(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let result: QueryResponseResult = self.post_json(&self.points_path("/query"), &body).await?;

        result.into_points().into_iter().map(point_to_hit).collect()
    }

    /// Walk the scroll endpoint until `offset + limit` points are seen, keeping the last `limit`.
    async fn scroll_page(&self, offset: usize, limit: usize) -> Result<Vec<Document>, QdrantError> {
        let wanted = offset.saturating_add(limit);
        let mut seen = 0_usize;
        let mut cursor: Option<Value> = None;
        let mut page = Vec::with_capacity(limit);

        while seen < wanted {
            let mut body = json!({
                "limit": (wanted - seen).min(SCROLL_PAGE_LIMIT),
                "with_payload": true,
                "with_vector": true,
            });
            if let (Some(next), Some(object)) = (cursor.take(), body.as_object_mut()) {
                object.insert("offset".into(), next);
            }

            let result: ScrollResult = self.post_json(&self.points_path("/scroll"), &body).await?;
            let batch_len = result.points.len();
            for point in result.points {
                if seen >= offset {
                    page.push(point_to_document(point)?);
                }
                seen += 1;
            }

            match result.next_page_offset {
                Some(next) if !next.is_null() && batch_len > 0 => cursor = Some(next),
                _ => break,
            }
        }

        Ok(page)
    }

    async fn count_points(&self) -> Result<u64, QdrantError> {
        let result: CountResult = self
            .post_json(&self.points_path("/count"), &json!({ "exact": true }))
            .await?;
        Ok(result.count)
    }

    /// Retrieve then delete while holding the id's slot, so only one caller removes the point.
    async fn delete_serialized(&self, id: Uuid, slot: &Mutex<bool>) -> Result<bool, QdrantError> {
        let mut deleted = slot.lock().await;
        if *deleted {
            return Ok(false);
        }
        // Qdrant deletes are silent about missing points, so check presence first.
        if missing_collection_as(self.retrieve_point(id).await, None)?.is_none() {
            return Ok(false);
        }
        self.delete_point(id).await?;
        *deleted = true;
        Ok(true)
    }

    fn points_path(&self, suffix: &str) -> String {
        format!("collections/{}/points{suffix}", self.collection)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, QdrantError> {
        let response = self.request(Method::POST, path).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, path, error = %error, "Qdrant request failed");
            return Err(error);
        }

        let envelope: ApiResponse<T> = response.json().await?;
        Ok(envelope.result)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), QdrantError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl DocumentRepository for QdrantRepository {
    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        self.upsert_point(document).await?;
        tracing::debug!(collection = %self.collection, id = %document.id, "Point upserted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(missing_collection_as(self.retrieve_point(id).await, None)?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let slot = {
            let mut slots = self.delete_slots.lock().await;
            Arc::clone(slots.entry(id).or_default())
        };
        let outcome = self.delete_serialized(id, &slot).await;

        let mut slots = self.delete_slots.lock().await;
        drop(slot);
        // The last caller to finish finds the map holding the only reference.
        if slots.get(&id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&id);
        }
        drop(slots);

        let deleted = outcome?;
        if deleted {
            tracing::debug!(collection = %self.collection, id = %id, "Point deleted");
        }
        Ok(deleted)
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError> {
        Ok(missing_collection_as(
            self.query_points(embedding, top_k).await,
            Vec::new(),
        )?)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, StoreError> {
        Ok(missing_collection_as(
            self.scroll_page(offset, limit).await,
            Vec::new(),
        )?)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(missing_collection_as(self.count_points().await, 0)?)
    }

    async fn health(&self) -> Result<(), StoreError> {
        if self.collection_exists().await? {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "collection '{}' does not exist",
                self.collection
            )))
        }
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}

/// A collection that was never created holds no documents; Qdrant answers 404 for it.
fn missing_collection_as<T>(result: Result<T, QdrantError>, empty: T) -> Result<T, QdrantError> {
    match result {
        Err(error) if error.is_not_found() => Ok(empty),
        other => other,
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
