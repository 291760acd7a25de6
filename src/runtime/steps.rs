/// Step execution
///
/// Each step reads the accumulated log and returns the messages it produced.
/// Steps never mutate the log themselves; the orchestrator appends their output
/// after checking it against the log's correlation rules.

use crate::{
    error::{FailureKind, ReasoningProtocolError},
    reasoning::{ReasoningClient, ReasoningRequest, ToolChoice},
    tools::{Capability, ToolInvocation, ToolRegistry},
    workflow::{Message, MessageLog, PromptSet, Step, ToolCall},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Messages produced by one step
#[derive(Debug, Default)]
pub struct StepOutput {
    pub messages: Vec<Message>,
    /// Query text the step proposed or executed, if any
    pub attempted_query: Option<String>,
}

impl StepOutput {
    fn with_messages(messages: Vec<Message>) -> Self {
        Self { messages, attempted_query: None }
    }
}

/// Executes individual steps against the reasoning service and tool registry
pub struct StepExecutor {
    reasoner: Arc<dyn ReasoningClient>,
    tools: Arc<ToolRegistry>,
    prompts: PromptSet,
    reasoning_timeout: Duration,
}

impl StepExecutor {
    pub fn new(
        reasoner: Arc<dyn ReasoningClient>,
        tools: Arc<ToolRegistry>,
        prompts: PromptSet,
        reasoning_timeout: Duration,
    ) -> Self {
        Self { reasoner, tools, prompts, reasoning_timeout }
    }

    /// Execute a single step
    pub async fn execute(&self, step: Step, log: &MessageLog) -> Result<StepOutput, FailureKind> {
        match step {
            Step::ListTables => self.list_tables().await,
            Step::DescribeSchemaRequest => self.request_schema(log).await,
            Step::DescribeSchemaExecute | Step::RunQuery => self.execute_pending(log).await,
            Step::GenerateQuery => self.generate_query(log).await,
            Step::CheckQuery => self.check_query(log).await,
            Step::End => Ok(StepOutput::default()),
        }
    }

    /// Synthesize and answer a `list_tables` call
    async fn list_tables(&self) -> Result<StepOutput, FailureKind> {
        let call = ToolCall::new(ToolInvocation::ListTables);
        let call_id = call.call_id.clone();

        let mut messages = vec![Message::assistant_with_calls("", vec![call])];
        match self.tools.invoke(&ToolInvocation::ListTables).await {
            Ok(output) => {
                let tables = output.render();
                tracing::info!("📋 Available tables: {}", tables);
                messages.push(Message::tool_result(call_id, tables.clone()));
                messages.push(Message::assistant(format!("Available tables: {}", tables)));
            }
            Err(error) if error.is_recoverable() => {
                messages.push(Message::tool_error(call_id, format!("Error: {}", error)));
            }
            Err(error) => return Err(FailureKind::ToolUnavailable(error)),
        }

        Ok(StepOutput::with_messages(messages))
    }

    async fn request_schema(&self, log: &MessageLog) -> Result<StepOutput, FailureKind> {
        let request = ReasoningRequest::new(Step::DescribeSchemaRequest, log.conversation())
            .offering(&[Capability::GetSchema], ToolChoice::Required);
        let reply = self.reason(request).await?;
        Ok(StepOutput::with_messages(vec![reply]))
    }

    /// Answer every pending call in emission order
    async fn execute_pending(&self, log: &MessageLog) -> Result<StepOutput, FailureKind> {
        let mut output = StepOutput::default();

        for call in log.pending_calls() {
            tracing::info!("🔧 Invoking {} ({})", call.name(), call.call_id);
            if let Some(query) = call.invocation.query() {
                output.attempted_query = Some(query.to_string());
            }

            let started = Instant::now();
            match self.tools.invoke(&call.invocation).await {
                Ok(result) => {
                    tracing::debug!("✅ {} completed in {}ms", call.name(), started.elapsed().as_millis());
                    output.messages.push(Message::tool_result(call.call_id.clone(), result.render()));
                }
                Err(error) if error.is_recoverable() => {
                    tracing::warn!("⚠️ {} failed: {}", call.name(), error);
                    output
                        .messages
                        .push(Message::tool_error(call.call_id.clone(), format!("Error: {}", error)));
                }
                Err(error) => {
                    tracing::error!("❌ {} aborted the run: {}", call.name(), error);
                    return Err(FailureKind::ToolUnavailable(error));
                }
            }
        }

        Ok(output)
    }

    async fn generate_query(&self, log: &MessageLog) -> Result<StepOutput, FailureKind> {
        let mut messages = vec![Message::system(self.prompts.generate_query())];
        messages.extend(log.conversation());

        let request = ReasoningRequest::new(Step::GenerateQuery, messages)
            .offering(&[Capability::RunQuery], ToolChoice::Auto);
        let mut reply = self.reason(request).await?;

        if reply.tool_calls.len() > 1 {
            tracing::warn!(
                "⚠️ Query generation emitted {} calls, keeping the first",
                reply.tool_calls.len()
            );
            reply.tool_calls.truncate(1);
        }

        let attempted_query = reply
            .tool_calls
            .first()
            .and_then(|call| call.invocation.query())
            .map(str::to_string);

        Ok(StepOutput { messages: vec![reply], attempted_query })
    }

    /// Review the candidate query; the reviewed call keeps the candidate's id
    async fn check_query(&self, log: &MessageLog) -> Result<StepOutput, FailureKind> {
        let candidate = log
            .last_assistant()
            .and_then(|message| message.tool_calls.first())
            .ok_or_else(|| ReasoningProtocolError::MissingToolCall { step: Step::GenerateQuery.to_string() })?;
        let query = candidate.invocation.query().ok_or_else(|| {
            ReasoningProtocolError::UnexpectedCapability { name: candidate.name().to_string() }
        })?;

        let request = ReasoningRequest::new(
            Step::CheckQuery,
            vec![Message::system(self.prompts.check_query()), Message::user(query)],
        )
        .offering(&[Capability::RunQuery], ToolChoice::Required);
        let mut reply = self.reason(request).await?;

        let reviewed = std::mem::take(&mut reply.tool_calls)
            .into_iter()
            .next()
            .ok_or_else(|| ReasoningProtocolError::MissingToolCall { step: Step::CheckQuery.to_string() })?;
        if reviewed.invocation.query() != Some(query) {
            tracing::info!("✏️ Query rewritten during review");
        }
        let attempted_query = reviewed.invocation.query().map(str::to_string);
        reply.tool_calls = vec![ToolCall::with_id(candidate.call_id.clone(), reviewed.invocation)];

        Ok(StepOutput { messages: vec![reply], attempted_query })
    }

    /// One bounded reasoning call, checked against the request's contract
    async fn reason(&self, request: ReasoningRequest) -> Result<Message, ReasoningProtocolError> {
        let started = Instant::now();
        tracing::debug!(
            "🧠 Reasoning for '{}' with {} ({} messages)",
            request.step,
            self.reasoner.model(),
            request.messages.len()
        );

        let reply = tokio::time::timeout(self.reasoning_timeout, self.reasoner.complete(&request))
            .await
            .map_err(|_| ReasoningProtocolError::Timeout(self.reasoning_timeout))??;

        tracing::debug!("🧠 '{}' replied in {}ms", request.step, started.elapsed().as_millis());
        let mut reply = request.accept(reply)?;

        // Backend-chosen ids may repeat across turns; the log correlates on ours
        reply.tool_calls = reply
            .tool_calls
            .into_iter()
            .map(|call| ToolCall::new(call.invocation))
            .collect();
        Ok(reply)
    }
}
