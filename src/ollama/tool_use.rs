//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool call, fed back to the model
    Tool,
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call this tool result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced this result (Ollama matches on it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Assistant message carrying tool calls
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Tool result answering `call`
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.function.name.clone()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Tool calls on this message, empty for anything but an assistant turn
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// A tool call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier; Ollama may omit it, see `assign_call_ids`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

impl ChatResponse {
    /// Wrap a bare assistant message (used by test doubles)
    pub fn from_message(message: ChatMessage) -> Self {
        Self {
            message,
            done: true,
            prompt_eval_count: 0,
            eval_count: 0,
            eval_duration: 0,
        }
    }
}

/// A chat completion endpoint.
///
/// The agent loop only talks to the model through this trait so tests can
/// substitute a scripted backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Request exactly one assistant message for `messages`, offering `tools`
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, ChatError>;
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    /// * `model` - The model name (e.g., "codestral:22b-v0.1-q8_0")
    /// * `timeout` - Upper bound for one completion request
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    /// Send a non-streaming chat request with optional tools
    ///
    /// # Returns
    /// ChatResponse containing the model's reply and any tool calls
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, ChatError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": 0.0
            }
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let mut chat_response: ChatResponse = serde_json::from_str(&text)?;
        normalize_arguments(&mut chat_response.message);
        Ok(chat_response)
    }
}

#[async_trait]
impl CompletionBackend for ChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, ChatError> {
        self.chat(messages, tools).await
    }
}

/// Some servers send arguments as a JSON-encoded string instead of an object
fn normalize_arguments(message: &mut ChatMessage) {
    if let Some(calls) = message.tool_calls.as_mut() {
        for call in calls {
            if let serde_json::Value::String(raw) = &call.function.arguments {
                if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) {
                    call.function.arguments = parsed;
                }
            }
            if call.function.arguments.is_null() {
                call.function.arguments = serde_json::json!({});
            }
        }
    }
}

/// Give every call an identifier so results can be paired with it.
///
/// Ids the model already supplied are kept; missing ones become
/// `call_<round>_<index>`.
pub fn assign_call_ids(calls: &mut [ToolCall], round: usize) {
    for (index, call) in calls.iter_mut().enumerate() {
        if call.id.is_empty() {
            call.id = format!("call_{}_{}", round, index);
        }
    }
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field, including JSON wrapped
/// in a fenced code block.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();
    let content = content.trim();

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content) {
        tool_calls.push(tool_call);
        return tool_calls;
    }

    // Scan for balanced top-level {...} objects, ignoring braces in strings
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Some(tool_call) = try_parse_tool_call(&content[s..=i]) {
                            tool_calls.push(tool_call);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    tool_calls
}

/// Try to parse a single tool call from a JSON string
fn try_parse_tool_call(json_str: &str) -> Option<ToolCall> {
    let value = serde_json::from_str::<serde_json::Value>(json_str).ok()?;
    parse_tool_call_from_value(&value)
}

/// Parse a tool call from a JSON Value
///
/// Accepted shapes:
/// - `{"tool": "...", "args": {...}}` (`args` may be omitted)
/// - `{"name": "...", "arguments": {...}}`
/// - `{"name": "...", "parameters": {...}}`
///
/// A bare `{"name": ...}` object is ordinary data (package manifests and
/// the like), not a call.
fn parse_tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    let (name, arguments) = if let Some(tool) = value.get("tool").and_then(|n| n.as_str()) {
        let args = value
            .get("args")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        (tool, args)
    } else {
        let name = value.get("name").and_then(|n| n.as_str())?;
        let args = value
            .get("arguments")
            .or_else(|| value.get("parameters"))
            .cloned()?;
        (name, args)
    };

    if !arguments.is_object() {
        return None;
    }

    Some(ToolCall::new(String::new(), name, arguments))
}
