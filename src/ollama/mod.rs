//! Ollama LLM integration module
//!
//! Clients for the two Ollama endpoints the harness consumes:
//! - `/api/chat` with tool calling (`tool_use`)
//! - `/api/embed` for semantic search (`embedding`)

pub mod embedding;
pub mod tool_use;

// Re-export public types so callers can `use crate::ollama::ChatMessage`
pub use embedding::{Embedder, EmbeddingClient};
pub use tool_use::{
    assign_call_ids, parse_tool_calls_from_text, ChatClient, ChatMessage, ChatResponse,
    CompletionBackend, FunctionCall, Role, ToolCall, ToolDefinition, ToolFunction,
};
