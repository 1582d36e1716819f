//! Tools the agent may invoke
//!
//! Every capability implements [`Tool`]; the [`ToolRegistry`] owns the fixed
//! set for a session, advertises it to the model and dispatches calls by
//! name.
//!
//! # Failure policy
//!
//! ```text
//! registry.execute(name, args)
//!     ├─ unknown name      → "Unknown tool: <name>"
//!     ├─ tool returns Err  → "Error: <message>"
//!     └─ tool returns Ok   → output text
//! ```
//!
//! Dispatch never fails: the model produced the call, so it gets to see the
//! problem and try again.

pub mod filesystem;
pub mod search;
pub mod shell;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::metrics::AGENT_TOOL_CALLS;
use crate::ollama::{Embedder, ToolDefinition, ToolFunction};
use crate::qdrant::VectorStore;

pub use filesystem::{ListDirectory, ReadFile, WriteFile};
pub use search::SemanticSearch;
pub use shell::RunCommand;

/// A capability the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool
    fn name(&self) -> &str;

    /// Free-text description for the model
    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments
    fn parameters(&self) -> Value;

    /// Run the tool
    async fn execute(&self, args: Value) -> Result<String, ToolError>;

    /// Definition in the shape `/api/chat` expects
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }

    /// One-line signature, e.g. `- read_file(path: string): Read a file`
    fn doc(&self) -> String {
        let parameters = self.parameters();
        let params = parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, info)| {
                        let ty = info.get("type").and_then(Value::as_str).unwrap_or("any");
                        format!("{}: {}", name, ty)
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        format!("- {}({}): {}", self.name(), params, self.description())
    }
}

/// Fixed mapping from tool name to capability
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard toolset: filesystem, command execution and semantic search
    pub fn standard(
        root: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let mut registry = Self::new();
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFile::new(root.clone())),
            Box::new(WriteFile::new(root.clone())),
            Box::new(ListDirectory::new(root.clone())),
            Box::new(RunCommand::new(root)),
            Box::new(SemanticSearch::new(embedder, store, collection)),
        ];
        for tool in tools {
            // Names above are distinct
            if let Err(e) = registry.register(tool) {
                warn!(error = %e, "Skipping tool");
            }
        }
        registry
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Definitions for every tool, in registration order
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Registered tool names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Signature lines for the system prompt and `/tools`
    pub fn docs(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.doc())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a call by name. Always returns text, see module docs.
    pub async fn execute(&self, name: &str, args: Value) -> String {
        let Some(tool) = self.index.get(name).map(|&i| &self.tools[i]) else {
            warn!(tool = name, "Model requested unknown tool");
            AGENT_TOOL_CALLS.with_label_values(&["unknown", "unknown"]).inc();
            return format!("Unknown tool: {}", name);
        };

        match tool.execute(args).await {
            Ok(output) => {
                debug!(tool = name, bytes = output.len(), "Tool succeeded");
                AGENT_TOOL_CALLS.with_label_values(&[name, "ok"]).inc();
                output
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                AGENT_TOOL_CALLS.with_label_values(&[name, "error"]).inc();
                format!("Error: {}", e)
            }
        }
    }
}

/// Fetch a required string argument
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string argument '{}'", key)))
}

/// Cut `text` to at most `max` chars, noting how much was dropped
pub(crate) fn truncate_output(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!(
            "{}\n... (truncated, {} more chars)",
            &text[..cut],
            text[cut..].chars().count()
        ),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            Ok(required_str(&args, "text")?.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "disk on fire",
            )))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo)).unwrap();
        registry.register(Box::new(Broken)).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text() {
        let result = registry().execute("nonexistent_tool", json!({})).await;
        assert_eq!(result, "Unknown tool: nonexistent_tool");
    }

    #[tokio::test]
    async fn test_tool_error_is_text() {
        let result = registry().execute("broken", json!({})).await;
        assert!(result.starts_with("Error: "));
        assert!(result.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_text() {
        let result = registry().execute("echo", json!({})).await;
        assert!(result.starts_with("Error: invalid arguments"));
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let result = registry().execute("echo", json!({"text": "hi"})).await;
        assert_eq!(result, "hi");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(Box::new(Echo)),
            Err(ToolError::Duplicate(name)) if name == "echo"
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let defs = registry().list_definitions();
        let names: Vec<_> = defs.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "broken"]);
        assert_eq!(defs[0].tool_type, "function");
    }

    #[test]
    fn test_doc_line() {
        assert_eq!(Echo.doc(), "- echo(text: string): Echo the text back");
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short", 10), "short");
        let cut = truncate_output("abcdefghij", 4);
        assert!(cut.starts_with("abcd\n"));
        assert!(cut.contains("6 more chars"));
    }
}
