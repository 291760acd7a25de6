/// Conversation types shared by every step of a run
///
/// A run's state is an append-only `MessageLog`. Tool calls and their answers are
/// correlated by explicit call ids; the log refuses messages that would leave an
/// answer orphaned, duplicated, or out of emission order.

use crate::{error::LogError, tools::ToolInvocation};
use serde::Serialize;
use std::collections::HashSet;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A capability request emitted by the assistant, tagged with its correlation id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub call_id: String,
    #[serde(flatten)]
    pub invocation: ToolInvocation,
}

impl ToolCall {
    /// New call with a fresh id
    pub fn new(invocation: ToolInvocation) -> Self {
        Self {
            call_id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            invocation,
        }
    }

    pub fn with_id(call_id: impl Into<String>, invocation: ToolInvocation) -> Self {
        Self { call_id: call_id.into(), invocation }
    }

    pub fn name(&self) -> &'static str {
        self.invocation.name()
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    /// Text content, possibly empty
    pub content: String,
    /// Calls emitted by an assistant message, in emission order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages: the call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// For tool messages: the content describes a failed invocation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: None,
            is_error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls, ..Self::text(Role::Assistant, content) }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: Some(call_id.into()), ..Self::text(Role::Tool, content) }
    }

    pub fn tool_error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { is_error: true, ..Self::tool_result(call_id, content) }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Append-only conversation for a single run
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    /// Emitted but unanswered call ids, oldest first
    pending: Vec<String>,
    answered: HashSet<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log seeded with the user's question
    pub fn seeded(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(question)],
            ..Self::default()
        }
    }

    /// Append one message, enforcing call/answer correlation
    ///
    /// An assistant message that re-emits a call id which is still pending is the
    /// authoritative continuation of that call, not a new call.
    pub fn append(&mut self, message: Message) -> Result<(), LogError> {
        match message.role {
            Role::Tool => {
                let call_id = message.call_id.as_deref().ok_or(LogError::MissingCallId)?;
                match self.pending.first() {
                    Some(expected) if expected == call_id => {}
                    Some(expected) if self.pending.iter().any(|id| id == call_id) => {
                        return Err(LogError::OutOfOrder {
                            expected: expected.clone(),
                            got: call_id.to_string(),
                        });
                    }
                    _ => return Err(LogError::OrphanedResult(call_id.to_string())),
                }
                let answered = self.pending.remove(0);
                self.answered.insert(answered);
            }
            Role::Assistant => {
                for call in &message.tool_calls {
                    if self.answered.contains(&call.call_id) {
                        return Err(LogError::ReusedCallId(call.call_id.clone()));
                    }
                }
                for call in &message.tool_calls {
                    if !self.pending.contains(&call.call_id) {
                        self.pending.push(call.call_id.clone());
                    }
                }
            }
            Role::System | Role::User => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// Append a step's output in order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) -> Result<(), LogError> {
        for message in messages {
            self.append(message)?;
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Unanswered calls in emission order, each in its latest emitted form
    pub fn pending_calls(&self) -> Vec<&ToolCall> {
        self.pending
            .iter()
            .filter_map(|id| {
                self.messages
                    .iter()
                    .rev()
                    .filter(|m| m.role == Role::Assistant)
                    .flat_map(|m| m.tool_calls.iter())
                    .find(|call| &call.call_id == id)
            })
            .collect()
    }

    /// Messages as the reasoning service should see them
    ///
    /// An assistant message whose calls were all re-emitted later is superseded
    /// by the later message and left out.
    pub fn conversation(&self) -> Vec<Message> {
        let mut re_emitted: HashSet<&str> = HashSet::new();
        let mut kept: Vec<&Message> = Vec::with_capacity(self.messages.len());

        for message in self.messages.iter().rev() {
            if message.role == Role::Assistant && message.has_tool_calls() {
                let superseded = message
                    .tool_calls
                    .iter()
                    .all(|call| re_emitted.contains(call.call_id.as_str()));
                re_emitted.extend(message.tool_calls.iter().map(|call| call.call_id.as_str()));
                if superseded {
                    continue;
                }
            }
            kept.push(message);
        }

        kept.into_iter().rev().cloned().collect()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_call(id: &str, sql: &str) -> ToolCall {
        ToolCall::with_id(id, ToolInvocation::run_query(sql).unwrap())
    }

    #[test]
    fn tool_answers_must_follow_their_call() {
        let mut log = MessageLog::seeded("how much?");
        let err = log.append(Message::tool_result("call_x", "[]")).unwrap_err();
        assert_eq!(err, LogError::OrphanedResult("call_x".into()));

        let err = log
            .append(Message { call_id: None, ..Message::tool_result("ignored", "[]") })
            .unwrap_err();
        assert_eq!(err, LogError::MissingCallId);
    }

    #[test]
    fn answers_are_accepted_once_in_emission_order() {
        let mut log = MessageLog::seeded("q");
        log.append(Message::assistant_with_calls(
            "",
            vec![query_call("a", "SELECT 1"), query_call("b", "SELECT 2")],
        ))
        .unwrap();

        let err = log.append(Message::tool_result("b", "[]")).unwrap_err();
        assert_eq!(err, LogError::OutOfOrder { expected: "a".into(), got: "b".into() });

        log.append(Message::tool_result("a", "[]")).unwrap();
        log.append(Message::tool_result("b", "[]")).unwrap();
        assert!(log.pending_calls().is_empty());

        let err = log.append(Message::tool_result("a", "[]")).unwrap_err();
        assert_eq!(err, LogError::OrphanedResult("a".into()));
    }

    #[test]
    fn re_emitting_a_pending_call_continues_it() {
        let mut log = MessageLog::seeded("q");
        log.append(Message::assistant_with_calls("", vec![query_call("a", "SELECT totl FROM t")]))
            .unwrap();
        log.append(Message::assistant_with_calls("", vec![query_call("a", "SELECT total FROM t")]))
            .unwrap();

        let pending = log.pending_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].invocation.query(), Some("SELECT total FROM t"));

        log.append(Message::tool_result("a", "[]")).unwrap();
        assert!(log.pending_calls().is_empty());
    }

    #[test]
    fn answered_ids_cannot_be_emitted_again() {
        let mut log = MessageLog::seeded("q");
        log.append(Message::assistant_with_calls("", vec![query_call("a", "SELECT 1")])).unwrap();
        log.append(Message::tool_result("a", "[]")).unwrap();

        let err = log
            .append(Message::assistant_with_calls("", vec![query_call("a", "SELECT 2")]))
            .unwrap_err();
        assert_eq!(err, LogError::ReusedCallId("a".into()));
    }

    #[test]
    fn conversation_elides_superseded_emissions() {
        let mut log = MessageLog::seeded("q");
        log.append(Message::assistant_with_calls("draft", vec![query_call("a", "SELECT totl FROM t")]))
            .unwrap();
        log.append(Message::assistant_with_calls("", vec![query_call("a", "SELECT total FROM t")]))
            .unwrap();
        log.append(Message::tool_result("a", "[[1]]")).unwrap();
        log.append(Message::assistant("one")).unwrap();

        let view = log.conversation();
        assert_eq!(log.len(), 5);
        assert_eq!(view.len(), 4);
        assert_eq!(view[1].tool_calls[0].invocation.query(), Some("SELECT total FROM t"));
        assert_eq!(view[2].role, Role::Tool);
    }
}
