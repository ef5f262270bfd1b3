//! Tool contracts and the tool registry.
//!
//! A tool is anything the execution engine can dispatch: it exposes a
//! canonical name, a version, a SHA-256 identity, JSON Schemas for its
//! input and output, a declared risk category, and a post-execution
//! `verify` hook. The registry holds these as [`ToolDefinition`] records;
//! the planner pins each step to the identity the registry reported at
//! planning time, and the engine refuses to run a step whose pinned
//! identity no longer matches (tool drift).
//!
//! The concrete tools here are contract implementations with simulated
//! effects; real side effects live behind the same trait in deployments.

mod builtin;
mod definition;
mod registry;

pub use builtin::builtin_tools;
pub use definition::{Tool, ToolDefinition, ToolIdentity, ToolOutcome};
pub use registry::ToolRegistry;

/// Errors raised by tool lookup, validation, and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("tool '{0}' is disabled")]
    Disabled(String),

    #[error("input for tool '{tool}' failed schema validation: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("tool '{tool}' execution failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("input schema for tool '{0}' is not a valid JSON Schema")]
    BadSchema(String),
}
