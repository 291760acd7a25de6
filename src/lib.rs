/// FiscalFlow: natural-language questions over an invoice database
///
/// This library answers questions by coordinating a reasoning service with
/// database introspection and read-only query execution, driven by a validated
/// petgraph step graph.

// Core configuration and setup
pub mod config;

// Error taxonomy for runs, tools and the reasoning service
pub mod error;

// Database adapter contract, SQLite implementation and invoice store
pub mod database;

// Capabilities offered to the reasoning service and their dispatch
pub mod tools;

// Conversation types, step graph and prompts
pub mod workflow;

// Reasoning service contract and OpenAI-compatible backend
pub mod reasoning;

// Step execution and run orchestration
pub mod runtime;

// HTTP API layer - question answering, metrics and health endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{FailureKind, OrchestrationError};
pub use runtime::{Answer, Orchestrator};
pub use server::start_server;
