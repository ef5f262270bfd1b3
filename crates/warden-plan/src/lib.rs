//! Deterministic execution plans.
//!
//! A plan is built mutably through [`PlanBuilder`], then frozen into a
//! [`FrozenPlan`]. Freezing consumes the builder, computes the canonical
//! snapshot and its SHA-256, and yields a type with read-only accessors:
//! post-freeze mutation is a compile-time impossibility, and freezing
//! twice cannot be expressed. [`FrozenPlan::validate_integrity`]
//! recomputes snapshot and hash on demand.

mod planner;
mod schema;

pub use planner::{ExecutionPlanner, PlanDecision};
pub use schema::{FrozenPlan, PlanBuilder, PlanStep, RetryPolicy};

/// Errors raised while constructing plans.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The intent has no tool mapping.
    #[error("no plan mapping for intent '{0}'")]
    UnmappedIntent(String),

    /// A step references a tool the registry does not know.
    #[error("tool '{0}' is not registered; cannot pin its identity")]
    UnknownTool(String),

    /// Step input failed the tool's schema.
    #[error(transparent)]
    InvalidInput(#[from] warden_tools::ToolError),
}
