//! Execution half of the governance pipeline.
//!
//! A frozen plan passes through the [`RiskSimulator`], the
//! [`PermissionChecker`], and confirmation resolution before the
//! [`ExecutionEngine`] runs it step by step: integrity-validated,
//! drift-checked, kill-switch polled, sandbox-routed. Reversible steps
//! register undo actions with the [`RollbackEngine`]; the
//! [`ExecutionGateway`] is the single front door that also writes one
//! audit entry per plan attempt.

mod engine;
mod gateway;
mod permission;
mod rollback;
mod simulator;

pub use engine::{ExecutionEngine, ExecutionReport, FinalState, KillSwitch, StepTrace};
pub use gateway::{ConfirmationDecision, Confirmer, ExecutionGateway, GatewayOutcome, StaticConfirmer};
pub use permission::{PermissionChecker, PermissionResult, PermissionTier};
pub use rollback::{
    NullProbe, RollbackAction, RollbackEngine, RollbackStatus, RollbackSummary, StateProbe,
};
pub use simulator::{RiskSimulator, SimulationResult};

/// Errors from the execution half of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("plan integrity breach: stored hash/snapshot disagrees with recomputation")]
    PlanIntegrityBreach,

    #[error("circular dependency in plan steps")]
    CircularDependency,

    #[error("step depends on unknown step '{0}'")]
    UnknownDependency(String),

    #[error(transparent)]
    Policy(#[from] warden_policy::PolicyError),

    #[error(transparent)]
    Tool(#[from] warden_tools::ToolError),

    #[error(transparent)]
    Ledger(#[from] warden_ledger::LedgerError),
}
