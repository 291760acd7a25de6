/// Reasoning service abstraction
///
/// A step hands the service a conversation, the capabilities it may call and
/// whether a call is mandatory. Backends implement `ReasoningClient`; the reply
/// contract (assistant role, offered capabilities only, a call when one is
/// required) is enforced by `ReasoningRequest::accept` for every backend alike.

// OpenAI-compatible chat-completions backend
pub mod openai;

use crate::{
    error::ReasoningProtocolError,
    tools::Capability,
    workflow::{Message, Role, Step},
};
use async_trait::async_trait;

pub use openai::OpenAiClient;

/// Whether the reply must call a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The service may answer in text or call a capability
    Auto,
    /// The service must call one of the offered capabilities
    Required,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Required => "required",
        }
    }
}

/// One call to the reasoning service
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    /// Step issuing the request, used in logs and contract errors
    pub step: Step,
    pub messages: Vec<Message>,
    pub capabilities: Vec<Capability>,
    pub tool_choice: ToolChoice,
}

impl ReasoningRequest {
    pub fn new(step: Step, messages: Vec<Message>) -> Self {
        Self {
            step,
            messages,
            capabilities: Vec::new(),
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Offer capabilities to the service
    pub fn offering(mut self, capabilities: &[Capability], tool_choice: ToolChoice) -> Self {
        self.capabilities = capabilities.to_vec();
        self.tool_choice = tool_choice;
        self
    }

    /// Check a reply against this request's contract
    pub fn accept(&self, reply: Message) -> Result<Message, ReasoningProtocolError> {
        if reply.role != Role::Assistant {
            return Err(ReasoningProtocolError::Malformed(format!(
                "expected an assistant reply, got role {:?}",
                reply.role
            )));
        }

        if let Some(call) = reply
            .tool_calls
            .iter()
            .find(|call| !self.capabilities.contains(&call.invocation.capability()))
        {
            return Err(ReasoningProtocolError::UnexpectedCapability { name: call.name().to_string() });
        }

        if self.tool_choice == ToolChoice::Required && !reply.has_tool_calls() {
            return Err(ReasoningProtocolError::MissingToolCall { step: self.step.to_string() });
        }

        Ok(reply)
    }
}

/// Backend able to complete a reasoning request
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Produce the next assistant message
    async fn complete(&self, request: &ReasoningRequest) -> Result<Message, ReasoningProtocolError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}
