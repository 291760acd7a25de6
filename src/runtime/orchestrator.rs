/// Question-answering orchestrator
///
/// Drives one run through the step graph: seeds the log with the question,
/// executes steps from `ListTables` until the routing decision reaches `End`,
/// and returns the final assistant message. The orchestrator is the only writer
/// of a run's log and holds no per-run state itself, so one instance serves
/// concurrent runs behind an `Arc`.

use crate::{
    config::OrchestrationConfig,
    error::{FailureKind, OrchestrationError},
    reasoning::ReasoningClient,
    runtime::steps::StepExecutor,
    tools::ToolRegistry,
    workflow::{GraphError, Message, MessageLog, PromptSet, Role, Step, WorkflowGraph},
};
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;

/// Successful outcome of a run
#[derive(Debug, Clone)]
pub struct Answer {
    /// Content of the terminal assistant message
    pub text: String,
    /// The run's full message log, starting with the question
    pub transcript: Vec<Message>,
    pub generate_visits: u32,
}

/// Per-run mutable state
struct RunState {
    log: MessageLog,
    step: Step,
    generate_visits: u32,
    last_query: Option<String>,
}

impl RunState {
    fn new(question: &str, start: Step) -> Self {
        Self {
            log: MessageLog::seeded(question),
            step: start,
            generate_visits: 0,
            last_query: None,
        }
    }

    fn fail(&self, kind: impl Into<FailureKind>) -> OrchestrationError {
        OrchestrationError::new(kind, self.last_query.clone())
    }
}

pub struct Orchestrator {
    graph: WorkflowGraph,
    steps: StepExecutor,
    max_generate_visits: Option<u32>,
}

impl Orchestrator {
    pub fn new(
        reasoner: Arc<dyn ReasoningClient>,
        tools: Arc<ToolRegistry>,
        config: &OrchestrationConfig,
    ) -> Result<Self, GraphError> {
        let graph = WorkflowGraph::query_loop()?;
        let prompts = PromptSet::new(tools.dialect(), config.top_k);
        let steps = StepExecutor::new(reasoner, tools, prompts, config.reasoning_timeout());

        Ok(Self {
            graph,
            steps,
            max_generate_visits: config.max_generate_visits,
        })
    }

    /// Answer a question, returning only the answer text
    pub async fn answer_question(&self, question: &str) -> Result<String, OrchestrationError> {
        self.run(question).await.map(|answer| answer.text)
    }

    pub async fn run(&self, question: &str) -> Result<Answer, OrchestrationError> {
        self.run_with_cancellation(question, &CancellationToken::new()).await
    }

    /// Run to completion unless `cancel` fires; it is checked before every step
    pub async fn run_with_cancellation(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Answer, OrchestrationError> {
        let run_started = Instant::now();
        let mut state = RunState::new(question, self.graph.start());

        tracing::info!("🚀 Starting run for question: {}", question);

        while state.step != Step::End {
            let step = state.step;

            if cancel.is_cancelled() {
                tracing::warn!("🛑 Run cancelled before step '{}'", step);
                return Err(state.fail(FailureKind::Cancelled));
            }

            if step == Step::GenerateQuery {
                state.generate_visits += 1;
                if let Some(limit) = self.max_generate_visits {
                    if state.generate_visits > limit {
                        tracing::error!("❌ Query loop exceeded {} generation steps", limit);
                        return Err(state.fail(FailureKind::IterationLimitExceeded { limit }));
                    }
                }
            }

            let step_started = Instant::now();
            tracing::info!("⚙️ Executing step '{}' (generate visit {})", step, state.generate_visits);

            let output = match self.steps.execute(step, &state.log).await {
                Ok(output) => output,
                Err(kind) => {
                    tracing::error!("❌ Step '{}' failed: {}", step, kind);
                    return Err(state.fail(kind));
                }
            };

            if output.attempted_query.is_some() {
                state.last_query = output.attempted_query;
            }
            if let Err(violation) = state.log.extend(output.messages) {
                tracing::error!("❌ Step '{}' broke the message log: {}", step, violation);
                return Err(state.fail(violation));
            }

            tracing::info!("✅ Step '{}' completed in {}ms", step, step_started.elapsed().as_millis());

            state.step = match self.graph.next(step, &state.log) {
                Ok(next) => next,
                Err(error) => return Err(state.fail(error)),
            };
        }

        let text = match state.log.last() {
            Some(message) if message.role == Role::Assistant && !message.has_tool_calls() => {
                message.content.clone()
            }
            _ => String::new(),
        };

        tracing::info!(
            "🏁 Run finished in {}ms after {} generation steps",
            run_started.elapsed().as_millis(),
            state.generate_visits
        );

        Ok(Answer {
            text,
            transcript: state.log.into_messages(),
            generate_visits: state.generate_visits,
        })
    }
}
