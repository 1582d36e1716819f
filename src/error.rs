//! Error types shared across the harness
//!
//! The taxonomy mirrors how failures are handled by the agent loop:
//! - `ToolError` is recovered locally and shown to the model as text
//! - `ChatError` is a transport failure and always propagates to the caller
//! - `ConversationError` guards the call/result pairing invariant

use thiserror::Error;

/// Failure inside a single tool execution.
///
/// Never aborts the agent loop: the registry renders it as `Error: <message>`
/// and the model sees it as the call's result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("command blocked: {0}")]
    Blocked(String),

    #[error("command exited with status {code}\n{output}")]
    CommandFailed { code: i32, output: String },

    #[error("command timed out after {0}s")]
    Timeout(u64),

    #[error("search failed: {0}")]
    Search(String),

    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("path escapes workspace root: {0}")]
    OutsideRoot(String),

    #[error("MCP tool failed: {0}")]
    Mcp(String),
}

/// Failure talking to an MCP server over stdio
#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("server closed the connection")]
    Closed,

    #[error("{method} timed out after {secs}s")]
    Timeout { method: String, secs: u64 },

    #[error("server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    ToolFailed(String),
}

/// Transport-level failure talking to Ollama (chat or embeddings)
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ollama returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("empty response from Ollama")]
    EmptyResponse,
}

/// Failure talking to the Qdrant REST API
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("qdrant returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Violation of the conversation's message ordering rules
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool result for `{0}` does not answer an open tool call")]
    UnmatchedToolResult(String),

    #[error("{0} tool call(s) still awaiting results")]
    PendingToolCalls(usize),

    #[error("conversation already has a system message")]
    DuplicateSystem,
}

/// Configuration file could not be read or written
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("home directory not found")]
    NoHome,
}

/// Failure while indexing a directory into the vector store
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] ChatError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("embedding count mismatch: {chunks} chunks, {embeddings} embeddings")]
    EmbeddingCount { chunks: usize, embeddings: usize },
}
