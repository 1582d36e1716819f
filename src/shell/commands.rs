//! Slash commands understood by the interactive shell

use crate::agent::{ContextStats, Conversation};
use crate::config::Config;
use crate::ollama::Role;

const DEFAULT_HISTORY_EXCHANGES: usize = 5;
const HISTORY_LINE_CHARS: usize = 100;

/// A parsed `/command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Clear,
    Context,
    History(usize),
    Tools,
    Index(String),
    Config,
    Stats,
    Metrics,
    Quit,
    Unknown(String),
}

impl ShellCommand {
    /// Parse a line of input; `None` when it is a task rather than a command
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.trim().strip_prefix('/')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let command = match name.as_str() {
            "help" | "?" => ShellCommand::Help,
            "clear" => ShellCommand::Clear,
            "context" => ShellCommand::Context,
            "history" => ShellCommand::History(
                arg.and_then(|a| a.parse().ok())
                    .unwrap_or(DEFAULT_HISTORY_EXCHANGES),
            ),
            "tools" => ShellCommand::Tools,
            "index" => ShellCommand::Index(arg.unwrap_or(".").to_string()),
            "config" => ShellCommand::Config,
            "stats" => ShellCommand::Stats,
            "metrics" => ShellCommand::Metrics,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            _ => ShellCommand::Unknown(name),
        };
        Some(command)
    }
}

/// Usage accumulated over a shell session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionUsage {
    pub tasks: usize,
    pub rounds: usize,
    pub tool_calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

pub fn render_help() -> String {
    r#"Commands:
  /clear        - Clear conversation context (start fresh)
  /context      - Show context stats (message count, tokens)
  /history [n]  - Show the last n exchanges (default 5)
  /tools        - List available tools
  /index [dir]  - Index a directory for semantic search
  /config       - Show current config
  /stats        - Show token usage for this session
  /metrics      - Dump Prometheus metrics
  /quit         - Exit the REPL

Just type your request to interact with the agent.
The agent remembers previous turns until you /clear."#
        .to_string()
}

pub fn render_context(stats: &ContextStats, budget: usize) -> String {
    let mut out = format!(
        "  Messages: {}\n  Your inputs: {}\n  Tool results: {}\n  Est. tokens: ~{} / {}",
        stats.messages, stats.user_inputs, stats.tool_results, stats.estimated_tokens, budget
    );
    if stats.estimated_tokens > budget {
        out.push_str("\n  Warning: context is over budget, consider /clear");
    }
    out
}

pub fn render_history(conversation: &Conversation, exchanges: usize) -> String {
    let lines: Vec<String> = conversation
        .recent_exchanges(exchanges)
        .into_iter()
        .map(|m| {
            let prefix = match m.role {
                Role::User => "You",
                _ => "Agent",
            };
            let flat = m.content.replace('\n', " ");
            let mut line: String = flat.chars().take(HISTORY_LINE_CHARS).collect();
            if flat.chars().count() > HISTORY_LINE_CHARS {
                line.push_str("...");
            }
            format!("[{}] {}", prefix, line)
        })
        .collect();

    if lines.is_empty() {
        return "--- No history ---".to_string();
    }
    format!("--- Recent History ---\n{}\n---", lines.join("\n"))
}

pub fn render_config(config: &Config) -> String {
    let servers = if config.mcp_servers.is_empty() {
        "none".to_string()
    } else {
        config
            .mcp_servers
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "  chat_model: {}\n  embed_model: {}\n  max_steps: {}\n  max_context_tokens: {}\n  stream: {} (reserved)\n  ollama_host: {}\n  qdrant_url: {}\n  collection: {}\n  filesystem_root: {}\n  mcp_servers: {}",
        config.chat_model,
        config.embed_model,
        config.max_steps,
        config.max_context_tokens,
        config.stream,
        config.ollama_host,
        config.qdrant_url,
        config.collection,
        config.filesystem_root.display(),
        servers,
    )
}

pub fn render_stats(usage: &SessionUsage) -> String {
    format!(
        "  Tasks: {}\n  Rounds: {}\n  Tool calls: {}\n  Prompt tokens: {}\n  Completion tokens: {}",
        usage.tasks, usage.rounds, usage.tool_calls, usage.prompt_tokens, usage.completion_tokens
    )
}
