/// Workflow definition layer
///
/// This module holds everything a run is made of, independent of how steps are
/// executed:
/// - Conversation types (Message, ToolCall, MessageLog)
/// - The petgraph step graph and its routing decision
/// - System prompts for the reasoning steps

// Conversation and message log types
pub mod types;

// Step graph with structural validation
pub mod graph;

// Prompt rendering for generation and checking
pub mod prompts;

// Re-export commonly used types
pub use graph::{route, GraphError, Step, Transition, WorkflowGraph};
pub use prompts::PromptSet;
pub use types::{Message, MessageLog, Role, ToolCall};
