//! Embedding generation via Ollama's `/api/embed` endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ChatError;

/// Turns text into fixed-length vectors.
///
/// Implemented by `EmbeddingClient`; the search tool and indexer accept any
/// implementation so they can be tested without a model server.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in the same order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Client for Ollama's embedding endpoint
#[derive(Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server
    /// * `model` - Embedding model (e.g., "nomic-embed-text", 768 dimensions)
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        let endpoint = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: EmbedResponse = serde_json::from_str(&text)?;
        if parsed.embeddings.len() != texts.len() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn test_embed_uses_first_vector() {
        let vector = LengthEmbedder.embed("four").await.unwrap();
        assert_eq!(vector, vec![4.0]);
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2]]}"#).unwrap();
        assert_eq!(parsed.embeddings, vec![vec![0.1, 0.2]]);
    }
}
