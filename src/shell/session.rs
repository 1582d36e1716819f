//! Shell session state: the conversation, the agent and usage totals

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::commands::{
    render_config, render_context, render_help, render_history, render_stats, SessionUsage,
    ShellCommand,
};
use crate::agent::{AgentController, AgentError, AgentRun, Conversation};
use crate::config::Config;
use crate::indexer::index_directory;
use crate::metrics;
use crate::ollama::Embedder;
use crate::qdrant::VectorStore;

const TOOL_DESCRIPTION_CHARS: usize = 60;

/// What the shell should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    /// Cancelled before the command finished
    Interrupted,
    Quit,
}

/// How a task submitted to the session ended
#[derive(Debug)]
pub enum TaskStatus {
    /// The run finished; its messages are now part of the conversation
    Finished(AgentRun),
    /// The task was cancelled; the conversation is unchanged
    Interrupted,
    /// Transport failure; the conversation is unchanged
    Failed(AgentError),
}

pub struct Session {
    agent: AgentController,
    conversation: Conversation,
    config: Config,
    usage: SessionUsage,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Session {
    pub fn new(
        agent: AgentController,
        system_prompt: impl Into<String>,
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        if config.stream {
            debug!("Streaming requested; responses are still read whole");
        }
        Self {
            agent,
            conversation: Conversation::new(system_prompt),
            config,
            usage: SessionUsage::default(),
            embedder,
            store,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn usage(&self) -> &SessionUsage {
        &self.usage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a task against a working copy of the conversation.
    ///
    /// The copy replaces the conversation only when the run finishes, so a
    /// cancelled or failed task leaves no half-answered tool calls behind.
    pub async fn run_task<F>(&mut self, task: &str, cancel: F) -> TaskStatus
    where
        F: Future,
    {
        let mut working = self.conversation.clone();

        let result = tokio::select! {
            result = self.agent.run(task, &mut working) => Some(result),
            _ = cancel => None,
        };

        match result {
            Some(Ok(run)) => {
                self.conversation = working;
                self.usage.tasks += 1;
                self.usage.rounds += run.rounds;
                self.usage.tool_calls += run.tool_calls_made;
                self.usage.prompt_tokens += run.prompt_tokens;
                self.usage.completion_tokens += run.completion_tokens;
                TaskStatus::Finished(run)
            }
            Some(Err(e)) => TaskStatus::Failed(e),
            None => {
                info!(task, "Task interrupted");
                TaskStatus::Interrupted
            }
        }
    }

    /// Run a slash command until it finishes or `cancel` resolves
    pub async fn handle_command<F>(&mut self, command: ShellCommand, cancel: F) -> Reply
    where
        F: Future,
    {
        tokio::select! {
            reply = self.dispatch(command) => reply,
            _ = cancel => {
                info!("Command interrupted");
                Reply::Interrupted
            }
        }
    }

    async fn dispatch(&mut self, command: ShellCommand) -> Reply {
        let text = match command {
            ShellCommand::Quit => return Reply::Quit,
            ShellCommand::Help => render_help(),
            ShellCommand::Clear => {
                self.conversation.clear();
                "Context cleared.".to_string()
            }
            ShellCommand::Context => {
                render_context(&self.conversation.stats(), self.config.max_context_tokens)
            }
            ShellCommand::History(n) => render_history(&self.conversation, n),
            ShellCommand::Tools => self.render_tools(),
            ShellCommand::Index(dir) => self.index(&dir).await,
            ShellCommand::Config => render_config(&self.config),
            ShellCommand::Stats => render_stats(&self.usage),
            ShellCommand::Metrics => metrics::render(),
            ShellCommand::Unknown(name) => {
                format!("Unknown command: /{}. Type /help for commands.", name)
            }
        };
        Reply::Continue(text)
    }

    fn render_tools(&self) -> String {
        let tools = self.agent.tools();
        let mut lines = vec![format!("--- Tools ({}) ---", tools.len())];
        for definition in tools.list_definitions() {
            let description = &definition.function.description;
            let mut short: String = description.chars().take(TOOL_DESCRIPTION_CHARS).collect();
            if description.chars().count() > TOOL_DESCRIPTION_CHARS {
                short.push_str("...");
            }
            lines.push(format!("  {}: {}", definition.function.name, short));
        }
        lines.push("---".to_string());
        lines.join("\n")
    }

    async fn index(&self, dir: &str) -> String {
        let root = Path::new(dir);
        if !root.is_dir() {
            return format!("Not a directory: {}", dir);
        }
        match index_directory(
            root,
            self.embedder.as_ref(),
            self.store.as_ref(),
            &self.config.collection,
        )
        .await
        {
            Ok(report) => format!(
                "Indexed {} chunks from {} files ({} failed).",
                report.chunks, report.files, report.failures
            ),
            Err(e) => format!("Indexing failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, AgentOutcome};
    use crate::error::{ChatError, StoreError};
    use crate::ollama::{ChatMessage, ChatResponse, CompletionBackend, ToolCall, ToolDefinition};
    use crate::qdrant::{Point, ScoredPoint};
    use crate::tools::{RunCommand, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::json;
    use std::future::{pending, ready};
    use std::time::{Duration, Instant};

    struct FixedAnswer;

    #[async_trait]
    impl CompletionBackend for FixedAnswer {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse, ChatError> {
            let mut response = ChatResponse::from_message(ChatMessage::assistant("done"));
            response.prompt_eval_count = 10;
            response.eval_count = 3;
            Ok(response)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl CompletionBackend for Unreachable {
        fn model(&self) -> &str {
            "unreachable"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse, ChatError> {
            Err(ChatError::EmptyResponse)
        }
    }

    struct Stalled;

    #[async_trait]
    impl CompletionBackend for Stalled {
        fn model(&self) -> &str {
            "stalled"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse, ChatError> {
            std::future::pending().await
        }
    }

    /// Asks for the same long-running command every round
    struct SleepyCommand;

    #[async_trait]
    impl CompletionBackend for SleepyCommand {
        fn model(&self) -> &str {
            "sleepy"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse, ChatError> {
            let call = ToolCall::new("", "run_command", json!({"command": "sleep 30"}));
            Ok(ChatResponse::from_message(ChatMessage::assistant_with_calls("", vec![call])))
        }
    }

    struct StalledEmbedder;

    #[async_trait]
    impl Embedder for StalledEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            pending().await
        }
    }

    struct NoEmbedder;

    #[async_trait]
    impl Embedder for NoEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            Err(ChatError::EmptyResponse)
        }
    }

    struct NoStore;

    #[async_trait]
    impl VectorStore for NoStore {
        async fn ensure_collection(&self, _c: &str, _size: usize) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, _c: &str, _points: Vec<Point>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn query(
            &self,
            _c: &str,
            _vector: Vec<f32>,
            _limit: usize,
        ) -> Result<Vec<ScoredPoint>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn session(backend: Arc<dyn CompletionBackend>) -> Session {
        session_with(backend, ToolRegistry::new(), Arc::new(NoEmbedder))
    }

    fn session_with(
        backend: Arc<dyn CompletionBackend>,
        registry: ToolRegistry,
        embedder: Arc<dyn Embedder>,
    ) -> Session {
        let agent = AgentController::new(backend, Arc::new(registry), AgentConfig::default());
        Session::new(agent, "sys", Config::default(), embedder, Arc::new(NoStore))
    }

    #[tokio::test]
    async fn test_finished_task_is_committed() {
        let mut session = session(Arc::new(FixedAnswer));

        let status = session.run_task("hello", pending::<()>()).await;
        match status {
            TaskStatus::Finished(run) => assert_eq!(run.outcome, AgentOutcome::Answer("done".into())),
            other => panic!("unexpected status: {:?}", other),
        }
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(session.usage().tasks, 1);
        assert_eq!(session.usage().prompt_tokens, 10);
        assert_eq!(session.usage().completion_tokens, 3);
    }

    #[tokio::test]
    async fn test_failed_task_leaves_conversation_untouched() {
        let mut session = session(Arc::new(Unreachable));

        let status = session.run_task("hello", pending::<()>()).await;
        assert!(matches!(status, TaskStatus::Failed(AgentError::Transport(_))));
        assert_eq!(session.conversation().len(), 1);
        assert_eq!(session.usage().tasks, 0);
    }

    #[tokio::test]
    async fn test_interrupted_task_is_discarded() {
        let mut session = session(Arc::new(Stalled));

        let status = session.run_task("hello", ready(())).await;
        assert!(matches!(status, TaskStatus::Interrupted));
        assert_eq!(session.conversation().len(), 1);
        assert_eq!(session.usage().tasks, 0);
    }

    #[tokio::test]
    async fn test_commands() {
        let mut session = session(Arc::new(FixedAnswer));
        session.run_task("hello", pending::<()>()).await;

        let Reply::Continue(context) = session.handle_command(ShellCommand::Context, pending::<()>()).await else {
            panic!("context should not quit");
        };
        assert!(context.contains("Messages: 3"));

        assert_eq!(
            session.handle_command(ShellCommand::Clear, pending::<()>()).await,
            Reply::Continue("Context cleared.".into())
        );
        assert_eq!(session.conversation().len(), 1);

        assert_eq!(
            session.handle_command(ShellCommand::Unknown("nope".into()), pending::<()>()).await,
            Reply::Continue("Unknown command: /nope. Type /help for commands.".into())
        );
        assert_eq!(session.handle_command(ShellCommand::Quit, pending::<()>()).await, Reply::Quit);
    }

    #[tokio::test]
    async fn test_index_rejects_missing_directory() {
        let mut session = session(Arc::new(FixedAnswer));
        let Reply::Continue(text) = session
            .handle_command(ShellCommand::Index("/definitely/not/here".into()), pending::<()>())
            .await
        else {
            panic!("index should not quit");
        };
        assert!(text.starts_with("Not a directory"));
    }

    #[tokio::test]
    async fn test_interrupt_during_tool_execution() {
        let workspace = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(RunCommand::new(workspace.path()))).unwrap();
        let mut session = session_with(Arc::new(SleepyCommand), registry, Arc::new(NoEmbedder));

        let started = Instant::now();
        let status = session
            .run_task("wait a while", tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(matches!(status, TaskStatus::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(session.conversation().len(), 1);
        assert!(!session.conversation().has_open_calls());
        assert_eq!(session.usage().tool_calls, 0);
        assert_eq!(session.conversation().stats().user_inputs, 0);
    }

    #[tokio::test]
    async fn test_index_can_be_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
        let mut session = session_with(Arc::new(FixedAnswer), ToolRegistry::new(), Arc::new(StalledEmbedder));

        let command = ShellCommand::Index(dir.path().to_string_lossy().to_string());
        let reply = session
            .handle_command(command, tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert_eq!(reply, Reply::Interrupted);
        assert_eq!(
            session.handle_command(ShellCommand::Clear, pending::<()>()).await,
            Reply::Continue("Context cleared.".into())
        );
    }
}
