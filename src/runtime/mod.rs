/// Runtime execution layer
///
/// This module runs questions through the step graph. It handles:
/// - Executing individual steps against the reasoning service and tool registry
/// - Driving a run from the first step to the final answer
/// - Iteration limits and cancellation between steps

// Individual step execution handlers
pub mod steps;

// Run driver over the workflow graph
pub mod orchestrator;

// Re-export main types
pub use orchestrator::{Answer, Orchestrator};
pub use steps::{StepExecutor, StepOutput};
