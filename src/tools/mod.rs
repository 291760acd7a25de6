/// Capabilities offered to the reasoning service
///
/// - Typed invocations for list_tables, get_schema and run_query
/// - The read-only guard applied to every query
/// - The registry that dispatches invocations to the database adapter

// Capability definitions, invocations and outputs
pub mod types;

// Lexical read-only check for SQL text
pub mod guard;

// Invocation dispatch and error classification
pub mod registry;

pub use guard::ensure_read_only;
pub use registry::ToolRegistry;
pub use types::{Capability, ToolDefinition, ToolInvocation, ToolOutput};
