//! Conversation state for one task or REPL session
//!
//! A conversation always starts with exactly one system message. Messages
//! are only ever appended, and `append` enforces the tool-call pairing rule:
//! once an assistant message issues calls, the next messages must be one
//! tool result per call, in the order the calls were issued.

use std::collections::VecDeque;

use crate::error::ConversationError;
use crate::ollama::{ChatMessage, Role};

/// Rough chars-per-token ratio for the budget display
const CHARS_PER_TOKEN: usize = 4;

/// Counts shown by `/context`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    /// All messages, system message included
    pub messages: usize,
    /// Messages typed by the user
    pub user_inputs: usize,
    /// Tool results fed back to the model
    pub tool_results: usize,
    /// `estimate_tokens()` at the time of the call
    pub estimated_tokens: usize,
}

/// Ordered, role-tagged dialogue history
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    /// Ids of calls still awaiting a result, oldest first
    open_calls: VecDeque<String>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            open_calls: VecDeque::new(),
        }
    }

    /// Append a message, enforcing the pairing rule
    pub fn append(&mut self, message: ChatMessage) -> Result<(), ConversationError> {
        match message.role {
            Role::System => return Err(ConversationError::DuplicateSystem),
            Role::Tool => {
                let id = message.tool_call_id.clone().unwrap_or_default();
                if self.open_calls.front() != Some(&id) {
                    return Err(ConversationError::UnmatchedToolResult(id));
                }
                self.open_calls.pop_front();
            }
            Role::User | Role::Assistant => {
                if !self.open_calls.is_empty() {
                    return Err(ConversationError::PendingToolCalls(self.open_calls.len()));
                }
                self.open_calls
                    .extend(message.calls().iter().map(|call| call.id.clone()));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// Drop everything but the system message
    pub fn clear(&mut self) {
        self.messages.truncate(1);
        self.open_calls.clear();
    }

    /// Replace the system prompt (e.g. after the toolset changes)
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.messages[0].content = prompt.into();
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Approximate token count: total content chars / 4
    pub fn estimate_tokens(&self) -> usize {
        let chars: usize = self.messages.iter().map(|m| m.content.chars().count()).sum();
        chars / CHARS_PER_TOKEN
    }

    /// Read-only view of every message, system message first
    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: the system message is always present
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ids of issued calls that have no result yet
    pub fn open_calls(&self) -> impl Iterator<Item = &str> {
        self.open_calls.iter().map(String::as_str)
    }

    pub fn has_open_calls(&self) -> bool {
        !self.open_calls.is_empty()
    }

    pub fn stats(&self) -> ContextStats {
        let count = |role: Role| self.messages.iter().filter(|m| m.role == role).count();
        ContextStats {
            messages: self.messages.len(),
            user_inputs: count(Role::User),
            tool_results: count(Role::Tool),
            estimated_tokens: self.estimate_tokens(),
        }
    }

    /// User and assistant text from the last `n` user turns onward.
    ///
    /// Tool results and content-less assistant messages (pure tool calls)
    /// are skipped.
    pub fn recent_exchanges(&self, n: usize) -> Vec<&ChatMessage> {
        if n == 0 {
            return Vec::new();
        }
        let start = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .rev()
            .nth(n - 1)
            .unwrap_or(1);

        self.messages[start.max(1)..]
            .iter()
            .filter(|m| match m.role {
                Role::User => true,
                Role::Assistant => !m.content.trim().is_empty(),
                _ => false,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::ToolCall;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "list_directory", json!({"path": "/tmp"}))
    }

    #[test]
    fn test_starts_with_system_message() {
        let conversation = Conversation::new("be helpful");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.snapshot()[0].role, Role::System);
        assert_eq!(conversation.system_prompt(), "be helpful");
    }

    #[test]
    fn test_second_system_message_rejected() {
        let mut conversation = Conversation::new("sys");
        assert_eq!(
            conversation.append(ChatMessage::system("again")),
            Err(ConversationError::DuplicateSystem)
        );
    }

    #[test]
    fn test_results_must_follow_call_order() {
        let mut conversation = Conversation::new("sys");
        conversation.append(ChatMessage::user("go")).unwrap();
        conversation
            .append(ChatMessage::assistant_with_calls("", vec![call("a"), call("b")]))
            .unwrap();

        assert_eq!(
            conversation.append(ChatMessage::tool_result(&call("b"), "x")),
            Err(ConversationError::UnmatchedToolResult("b".to_string()))
        );
        conversation.append(ChatMessage::tool_result(&call("a"), "x")).unwrap();
        conversation.append(ChatMessage::tool_result(&call("b"), "y")).unwrap();
        assert!(!conversation.has_open_calls());
    }

    #[test]
    fn test_user_message_blocked_while_calls_open() {
        let mut conversation = Conversation::new("sys");
        conversation.append(ChatMessage::user("go")).unwrap();
        conversation
            .append(ChatMessage::assistant_with_calls("", vec![call("a")]))
            .unwrap();

        assert_eq!(
            conversation.append(ChatMessage::user("next")),
            Err(ConversationError::PendingToolCalls(1))
        );
        assert_eq!(conversation.open_calls().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_stray_tool_result_rejected() {
        let mut conversation = Conversation::new("sys");
        assert!(matches!(
            conversation.append(ChatMessage::tool_result(&call("z"), "x")),
            Err(ConversationError::UnmatchedToolResult(_))
        ));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_clear_always_leaves_system_message() {
        let mut conversation = Conversation::new("sys");
        conversation.clear();
        assert_eq!(conversation.len(), 1);

        conversation.append(ChatMessage::user("go")).unwrap();
        conversation
            .append(ChatMessage::assistant_with_calls("", vec![call("a")]))
            .unwrap();
        conversation.clear();

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.system_prompt(), "sys");
        assert!(!conversation.has_open_calls());
        conversation.append(ChatMessage::user("fresh")).unwrap();
    }

    #[test]
    fn test_context_stats_for_three_pairs() {
        let mut conversation = Conversation::new("sys");
        for i in 0..3 {
            conversation.append(ChatMessage::user(format!("q{}", i))).unwrap();
            conversation.append(ChatMessage::assistant(format!("a{}", i))).unwrap();
        }

        let stats = conversation.stats();
        assert_eq!(stats.messages, 7);
        assert_eq!(stats.user_inputs, 3);
        assert_eq!(stats.tool_results, 0);
    }

    #[test]
    fn test_estimate_tokens() {
        let mut conversation = Conversation::new("1234");
        conversation.append(ChatMessage::user("12345678")).unwrap();
        assert_eq!(conversation.estimate_tokens(), 3);
    }

    #[test]
    fn test_recent_exchanges_skip_tool_traffic() {
        let mut conversation = Conversation::new("sys");
        conversation.append(ChatMessage::user("first")).unwrap();
        conversation.append(ChatMessage::assistant("one")).unwrap();
        conversation.append(ChatMessage::user("second")).unwrap();
        conversation
            .append(ChatMessage::assistant_with_calls("", vec![call("a")]))
            .unwrap();
        conversation.append(ChatMessage::tool_result(&call("a"), "files")).unwrap();
        conversation.append(ChatMessage::assistant("two")).unwrap();

        let recent: Vec<_> = conversation
            .recent_exchanges(1)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(recent, vec!["second", "two"]);

        assert_eq!(conversation.recent_exchanges(5).len(), 4);
        assert!(conversation.recent_exchanges(0).is_empty());
    }
}
