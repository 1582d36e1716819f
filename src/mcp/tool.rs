//! MCP tools exposed through the `Tool` trait

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::client::{McpConnection, McpToolInfo};
use crate::config::McpServerConfig;
use crate::error::{McpError, ToolError};
use crate::tools::{Tool, ToolRegistry};

/// One tool of a connected MCP server
pub struct McpTool {
    connection: Arc<McpConnection>,
    name: String,
    description: String,
    parameters: Value,
}

impl McpTool {
    pub fn new(connection: Arc<McpConnection>, info: McpToolInfo) -> Self {
        Self {
            connection,
            name: info.name,
            description: info.description.unwrap_or_default(),
            parameters: info
                .input_schema
                .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        self.connection
            .call_tool(&self.name, args)
            .await
            .map_err(|e| ToolError::Mcp(e.to_string()))
    }
}

async fn connect_server(server: &McpServerConfig) -> Result<Vec<McpTool>, McpError> {
    let connection = Arc::new(McpConnection::connect(server).await?);
    let tools = connection.list_tools().await?;
    Ok(tools
        .into_iter()
        .map(|info| McpTool::new(connection.clone(), info))
        .collect())
}

/// Connect every configured server and register its tools.
///
/// A server that fails to start or handshake is skipped with a warning, as
/// is any tool whose name is already taken. Returns the number of tools added.
pub async fn register_servers(registry: &mut ToolRegistry, servers: &[McpServerConfig]) -> usize {
    let mut added = 0;
    for server in servers {
        let tools = match connect_server(server).await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(server = %server.name, error = %e, "Failed to connect to MCP server");
                continue;
            }
        };

        let offered = tools.len();
        for tool in tools {
            let name = tool.name.clone();
            match registry.register(Box::new(tool)) {
                Ok(()) => added += 1,
                Err(e) => warn!(server = %server.name, tool = %name, error = %e, "Skipping MCP tool"),
            }
        }
        info!(server = %server.name, tools = offered, "Connected to MCP server");
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::tests::{server, FAKE_SERVER};

    #[tokio::test]
    async fn test_registered_tools_dispatch_through_registry() {
        let mut registry = ToolRegistry::new();
        let added = register_servers(&mut registry, &[server("fake", FAKE_SERVER)]).await;

        assert_eq!(added, 2);
        assert_eq!(registry.names(), vec!["echo", "fail"]);
        assert!(registry.docs().contains("- echo(text: string): Echo text"));

        assert_eq!(registry.execute("echo", json!({"text": "hi"})).await, "echoed");
        assert_eq!(
            registry.execute("fail", json!({})).await,
            "Error: MCP tool failed: broken"
        );
    }

    #[tokio::test]
    async fn test_failed_server_is_skipped() {
        let mut registry = ToolRegistry::new();
        let servers = [
            server("quitter", "exit 0"),
            server("fake", FAKE_SERVER),
        ];

        let added = register_servers(&mut registry, &servers).await;

        assert_eq!(added, 2);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_tool_names_are_skipped() {
        let mut registry = ToolRegistry::new();
        let servers = [server("first", FAKE_SERVER), server("second", FAKE_SERVER)];

        let added = register_servers(&mut registry, &servers).await;

        assert_eq!(added, 2);
        assert_eq!(registry.names(), vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn test_missing_schema_gets_empty_object() {
        let mut registry = ToolRegistry::new();
        register_servers(&mut registry, &[server("fake", FAKE_SERVER)]).await;

        let definitions = registry.list_definitions();
        assert_eq!(
            definitions[1].function.parameters,
            json!({ "type": "object", "properties": {} })
        );
    }
}
