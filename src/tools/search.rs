//! Semantic code search backed by the vector store

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::error::ToolError;
use crate::ollama::Embedder;
use crate::qdrant::{ScoredPoint, VectorStore};

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;
const MAX_SNIPPET_CHARS: usize = 1000;

/// Search indexed code with a natural language query
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl Tool for SemanticSearch {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Search the indexed codebase for relevant code using a natural language query"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| ToolError::Search(e.to_string()))?;

        let hits = self
            .store
            .query(&self.collection, vector, limit)
            .await
            .map_err(|e| ToolError::Search(e.to_string()))?;

        if hits.is_empty() {
            return Ok("No results found.".to_string());
        }

        Ok(hits.iter().map(render_hit).collect::<Vec<_>>().join("\n\n"))
    }
}

fn render_hit(hit: &ScoredPoint) -> String {
    let field = |key: &str| hit.payload.get(key).and_then(Value::as_str).unwrap_or("");
    let path = hit.payload.get("path").and_then(Value::as_str).unwrap_or("unknown");
    let content = field("content");

    let snippet = match content.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}\n... (truncated)", &content[..cut]),
        None => content.to_string(),
    };

    format!(
        "## {} (score: {:.3})\n```{}\n{}\n```",
        path,
        hit.score,
        field("language"),
        snippet
    )
}
