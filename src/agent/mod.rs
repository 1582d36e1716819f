//! Agent module for LLM-driven coding tasks
//!
//! This module provides the agent loop that orchestrates:
//! - A chat completion endpoint with tool calling (Ollama `/api/chat`)
//! - The tool registry (files, shell commands, semantic search)
//! - The conversation history shared across turns
//!
//! # Architecture
//!
//! ```text
//! User Task → AgentController → CompletionBackend (with tool definitions)
//!                  ↓
//!           Tool Calls (in order)
//!                  ↓
//!           ToolRegistry.execute(name, args) → text
//!                  ↓
//!           Conversation ← tool results
//!                  ↓
//!           Next round → ... → Answer | Exhausted
//! ```

pub mod controller;
pub mod conversation;
pub mod prompt;

pub use controller::{AgentConfig, AgentController, AgentError, AgentOutcome, AgentRun};
pub use conversation::{ContextStats, Conversation};
pub use prompt::build_system_prompt;
