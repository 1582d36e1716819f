//! System prompt for the coding agent

use std::path::Path;

use crate::tools::ToolRegistry;

/// Build the system prompt advertising `tools`.
///
/// Tools are also passed natively with every request; the JSON fallback
/// instructions cover models without native tool calling.
pub fn build_system_prompt(tools: &ToolRegistry, workspace: &Path) -> String {
    format!(
        r#"You are a coding assistant with access to tools.

Available tools:
{tools}

To use a tool, call it natively, or respond with a JSON block:
```json
{{"tool": "tool_name", "args": {{"param": "value"}}}}
```

Rules:
- For file operations, use paths under {root}
- Use semantic_search to find relevant code before making changes
- Wait for each tool result before deciding the next step
- When done or answering directly, respond normally WITHOUT json blocks
- Be concise"#,
        tools = tools.docs(),
        root = workspace.display(),
    )
}
