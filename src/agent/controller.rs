//! Agent Controller - the bounded tool-calling loop
//!
//! Each round sends the whole conversation plus the tool definitions to the
//! completion endpoint and inspects the single assistant message it returns:
//!
//! ```text
//!            ┌──────────────────────┐
//!   task ──► │  AwaitingCompletion  │ ◄──────────────┐
//!            └──────────┬───────────┘                │
//!                       │ response                   │
//!             tool calls?                            │
//!            ┌──────────┴───────────┐                │
//!         no │                      │ yes            │
//!            ▼                      ▼                │
//!    Answer(content)       DispatchingTools ─────────┘
//!                          (one result per call, in order)
//!
//!   round == max_steps without an answer → Exhausted
//! ```
//!
//! Tool failures never leave this module as errors: the registry turns them
//! into text for the model. Only transport failures propagate.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conversation::Conversation;
use crate::config::Config;
use crate::error::{ChatError, ConversationError};
use crate::metrics::{AGENT_ROUNDS, AGENT_TASKS, LLM_CALL_TIME};
use crate::ollama::{
    assign_call_ids, parse_tool_calls_from_text, ChatMessage, CompletionBackend, Role, ToolCall,
};
use crate::tools::ToolRegistry;

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of completion rounds before giving up
    pub max_steps: usize,
    /// Echo each tool call to stderr as it is dispatched
    pub show_tool_calls: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            show_tool_calls: false,
        }
    }
}

impl From<&Config> for AgentConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_steps: config.max_steps,
            ..Self::default()
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model answered without requesting tools
    Answer(String),
    /// The step ceiling was reached first
    Exhausted { steps: usize },
}

impl AgentOutcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, AgentOutcome::Answer(_))
    }

    fn label(&self) -> &'static str {
        match self {
            AgentOutcome::Answer(_) => "answer",
            AgentOutcome::Exhausted { .. } => "exhausted",
        }
    }
}

impl fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentOutcome::Answer(text) => write!(f, "{}", text),
            AgentOutcome::Exhausted { steps } => {
                write!(f, "Max steps reached ({}) without completion", steps)
            }
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    /// Completion requests made
    pub rounds: usize,
    /// Tool calls dispatched
    pub tool_calls_made: usize,
    /// Prompt tokens reported by the model server, summed over rounds
    pub prompt_tokens: u64,
    /// Generated tokens reported by the model server, summed over rounds
    pub completion_tokens: u64,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// Error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// The completion endpoint could not be reached or answered garbage
    #[error("completion endpoint failed: {0}")]
    Transport(#[from] ChatError),
    /// The conversation was left with unanswered calls by an earlier run
    #[error("conversation out of order: {0}")]
    Conversation(#[from] ConversationError),
}

/// Agent Controller orchestrating the model and the tools
pub struct AgentController {
    backend: Arc<dyn CompletionBackend>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `backend` - Completion endpoint (Ollama `ChatClient` or a test double)
    /// * `tools` - Capabilities offered to the model
    /// * `config` - Agent configuration
    pub fn new(backend: Arc<dyn CompletionBackend>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run `task` to completion inside `conversation`
    ///
    /// The task is appended as a user message; every assistant message and
    /// tool result produced along the way is appended too.
    pub async fn run(&self, task: &str, conversation: &mut Conversation) -> Result<AgentRun, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.backend.model(),
            otel.name = "agent_task"
        );

        let result = self
            .run_rounds(task, conversation, &trace_id)
            .instrument(root_span)
            .await;

        match &result {
            Ok(run) => {
                AGENT_TASKS.with_label_values(&[run.outcome.label()]).inc();
                AGENT_ROUNDS.observe(run.rounds as f64);
            }
            Err(_) => AGENT_TASKS.with_label_values(&["transport_error"]).inc(),
        }
        result
    }

    async fn run_rounds(
        &self,
        task: &str,
        conversation: &mut Conversation,
        trace_id: &str,
    ) -> Result<AgentRun, AgentError> {
        info!(trace_id, task, "Starting agent task");
        conversation.append(ChatMessage::user(task))?;

        let definitions = self.tools.list_definitions();
        let model = self.backend.model().to_string();

        let mut run = AgentRun {
            outcome: AgentOutcome::Exhausted {
                steps: self.config.max_steps,
            },
            rounds: 0,
            tool_calls_made: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            trace_id: trace_id.to_string(),
        };

        for round in 1..=self.config.max_steps {
            run.rounds = round;

            let llm_span = info_span!(
                "llm_call",
                trace_id = %trace_id,
                round,
                model = %model,
                otel.name = "llm_call"
            );

            let call_start = Instant::now();
            let response = self
                .backend
                .complete(conversation.snapshot(), &definitions)
                .instrument(llm_span)
                .await?;
            let elapsed = call_start.elapsed().as_secs_f64();

            LLM_CALL_TIME.with_label_values(&[&model]).observe(elapsed);
            run.prompt_tokens += u64::from(response.prompt_eval_count);
            run.completion_tokens += u64::from(response.eval_count);
            debug!(trace_id, round, elapsed_secs = elapsed, "Completion received");

            let mut message = response.message;
            message.role = Role::Assistant;

            // Native tool calls first, then JSON embedded in the text
            let mut calls = message
                .tool_calls
                .take()
                .filter(|tc| !tc.is_empty())
                .unwrap_or_else(|| parse_tool_calls_from_text(&message.content));

            if calls.is_empty() {
                info!(trace_id, rounds = round, tool_calls = run.tool_calls_made, "Agent task completed");
                let answer = message.content.clone();
                conversation.append(message)?;
                run.outcome = AgentOutcome::Answer(answer);
                return Ok(run);
            }

            assign_call_ids(&mut calls, round);
            message.tool_calls = Some(calls.clone());
            conversation.append(message)?;

            // Sequential: later calls may depend on earlier side effects
            for call in &calls {
                self.dispatch(call, trace_id, &mut run, conversation).await?;
            }
        }

        warn!(trace_id, max_steps = self.config.max_steps, "Max steps reached");
        Ok(run)
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        trace_id: &str,
        run: &mut AgentRun,
        conversation: &mut Conversation,
    ) -> Result<(), AgentError> {
        let name = call.function.name.as_str();
        let args = &call.function.arguments;

        if self.config.show_tool_calls {
            eprintln!("  -> {}({})", name, preview_args(args));
        }

        let tool_span = info_span!(
            "tool_call",
            trace_id = %trace_id,
            tool = %name,
            call_id = %call.id,
            otel.name = "tool_call"
        );

        let result = self
            .tools
            .execute(name, args.clone())
            .instrument(tool_span)
            .await;

        run.tool_calls_made += 1;
        conversation.append(ChatMessage::tool_result(call, result))?;
        Ok(())
    }
}

/// `key='value', ...` with each value cut to 50 chars
fn preview_args(args: &serde_json::Value) -> String {
    let Some(map) = args.as_object() else {
        return String::new();
    };
    map.iter()
        .map(|(k, v)| {
            let rendered = v.to_string();
            let short: String = rendered.chars().take(50).collect();
            format!("{}={}", k, short)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(AgentOutcome::Answer("done".into()).to_string(), "done");
        assert_eq!(
            AgentOutcome::Exhausted { steps: 20 }.to_string(),
            "Max steps reached (20) without completion"
        );
        assert!(!AgentOutcome::Exhausted { steps: 1 }.is_answer());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Config {
            max_steps: 7,
            ..Config::default()
        };
        let config = AgentConfig::from(&settings);
        assert_eq!(config.max_steps, 7);
        assert!(!config.show_tool_calls);
    }

    #[test]
    fn test_preview_args_truncates() {
        let long = "x".repeat(80);
        let preview = preview_args(&serde_json::json!({ "path": "/tmp", "content": long }));
        assert!(preview.contains("path=\"/tmp\""));
        assert!(preview.len() < 80);
    }
}
