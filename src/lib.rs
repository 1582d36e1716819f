//! Harness - a local code agent driven by an Ollama chat model
//!
//! The model is given a small toolset (files, shell commands, semantic code
//! search over a Qdrant index) and the agent loop keeps calling it until it
//! answers without requesting tools or the step limit is hit.
//!
//! # Modules
//!
//! - `agent` - Conversation history and the bounded tool-calling loop
//! - `ollama` - Chat completion and embedding clients
//! - `qdrant` - Vector store client for code chunks
//! - `tools` - Tool trait, registry and the standard tools
//! - `mcp` - Tools served by external MCP servers over stdio
//! - `indexer` - Chunking and indexing of source trees
//! - `shell` - Interactive REPL and one-shot runner
//! - `config` - Settings from `~/.harness/config.json` and the environment
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - Logging and optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use harness::agent::{AgentConfig, AgentController, Conversation};
//!
//! let agent = AgentController::new(backend, tools, AgentConfig::default());
//! let mut conversation = Conversation::new(system_prompt);
//! let run = agent.run("list files in /tmp", &mut conversation).await?;
//! println!("{}", run.outcome);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod indexer;
pub mod mcp;
pub mod metrics;
pub mod ollama;
pub mod qdrant;
pub mod shell;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentController, AgentOutcome, Conversation};
pub use config::Config;
pub use tools::{Tool, ToolRegistry};
