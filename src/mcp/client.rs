//! Stdio JSON-RPC connection to an MCP server
//!
//! The server is a child process exchanging newline-delimited JSON-RPC 2.0
//! messages on stdin/stdout. Requests are serialized through one channel;
//! responses are matched by id and server notifications are skipped.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::McpServerConfig;
use crate::error::McpError;

const PROTOCOL_VERSION: &str = "2024-11-05";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Deserialize)]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<McpToolInfo>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

struct Channel {
    // Killed on drop together with the connection
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl Channel {
    async fn send(&mut self, message: &Value) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read until the response to `id` arrives
    async fn wait_for(&mut self, id: u64) -> Result<Value, McpError> {
        loop {
            let line = self.stdout.next_line().await?.ok_or(McpError::Closed)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "Skipping non-JSON line from MCP server");
                    continue;
                }
            };

            let method = message.get("method").and_then(Value::as_str);
            let Some(message_id) = message.get("id") else {
                debug!(method = method.unwrap_or(""), "Received MCP notification");
                continue;
            };
            if let Some(method) = method {
                warn!(method, "Ignoring request from MCP server");
                continue;
            }
            if message_id.as_u64() != Some(id) {
                // Left over from a request that timed out or was abandoned
                warn!(id = %message_id, expected = id, "Received response for unknown request ID");
                continue;
            }

            if let Some(error) = message.get("error") {
                return Err(McpError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }
            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

/// A live, initialized MCP server process
pub struct McpConnection {
    name: String,
    channel: Mutex<Channel>,
    request_timeout: Duration,
}

impl McpConnection {
    /// Start the server and perform the `initialize` handshake
    pub async fn connect(server: &McpServerConfig) -> Result<Self, McpError> {
        Self::connect_with_timeout(server, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        server: &McpServerConfig,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut child = Command::new(&server.command)
            .args(&server.args)
            .envs(&server.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: server.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;

        let connection = Self {
            name: server.name.clone(),
            channel: Mutex::new(Channel {
                _child: child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 1,
            }),
            request_timeout,
        };
        connection.initialize().await?;
        Ok(connection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "harness",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;
        debug!(
            server = %self.name,
            info = %result.get("serverInfo").unwrap_or(&serde_json::Value::Null),
            "MCP server initialized"
        );
        self.notify("notifications/initialized").await
    }

    /// Every tool the server offers, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let page: ToolsPage = serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Call a tool and join the text parts of its result.
    ///
    /// A result flagged `isError` becomes `McpError::ToolFailed`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        let text = if text.is_empty() { result.to_string() } else { text };

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(McpError::ToolFailed(text));
        }
        Ok(text)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let mut channel = self.channel.lock().await;
        let id = channel.next_id;
        channel.next_id += 1;

        channel
            .send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        match tokio::time::timeout(self.request_timeout, channel.wait_for(id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                secs: self.request_timeout.as_secs(),
            }),
        }
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let mut channel = self.channel.lock().await;
        channel
            .send(&json!({ "jsonrpc": "2.0", "method": method }))
            .await
    }
}
