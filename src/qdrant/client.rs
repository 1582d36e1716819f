//! Qdrant REST client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// A vector with its payload, ready to upsert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// A query hit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredPoint {
    pub id: serde_json::Value,
    pub score: f32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Storage of embedding vectors with payload metadata
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `collection` (cosine distance) if it does not exist yet
    async fn ensure_collection(&self, collection: &str, vector_size: usize) -> Result<(), StoreError>;

    /// Insert or replace points by id
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError>;

    /// Return up to `limit` points ranked by similarity to `vector`
    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;
}

#[derive(Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

/// Client for the Qdrant HTTP API
#[derive(Clone)]
pub struct QdrantClient {
    base_url: String,
    client: reqwest::Client,
}

impl QdrantClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - e.g. "http://localhost:6333"
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    /// Whether `collection` exists
    pub async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let response = self.client.get(self.collection_url(collection)).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => Err(StoreError::Status {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Delete and recreate `collection`
    pub async fn reset_collection(&self, collection: &str, vector_size: usize) -> Result<(), StoreError> {
        let response = self.client.delete(self.collection_url(collection)).send().await?;
        // A missing collection is fine here
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(status_error(response).await);
        }
        info!(collection, "Collection deleted");
        self.ensure_collection(collection, vector_size).await
    }
}

async fn status_error(response: reqwest::Response) -> StoreError {
    StoreError::Status {
        status: response.status().as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn ensure_collection(&self, collection: &str, vector_size: usize) -> Result<(), StoreError> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url(collection))
            .json(&serde_json::json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        info!(collection, vector_size, "Collection created");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError> {
        let count = points.len();
        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(collection)))
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        debug!(collection, count, "Points upserted");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url(collection)))
            .json(&serde_json::json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await?;
        let envelope: QdrantEnvelope<Vec<ScoredPoint>> = serde_json::from_str(&text)?;
        Ok(envelope.result)
    }
}
