//! Execution gateway: the single controlled entry point for plan
//! execution.
//!
//! For each plan: permission check against the trust score, risk
//! simulation, confirmation resolution, engine invocation, and exactly
//! one audit-ledger entry regardless of outcome.

use crate::engine::{ExecutionEngine, ExecutionReport, FinalState, KillSwitch};
use crate::permission::PermissionChecker;
use crate::simulator::{RiskSimulator, SimulationResult};
use crate::ExecError;
use serde_json::json;
use warden_ledger::{AuditEntry, AuditLedger};
use warden_plan::FrozenPlan;

/// How a required confirmation was (or was not) obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Granted,
    Denied,
    NotRequired,
}

/// Confirmation resolver: interactive prompt in the CLI, injected
/// decision in tests and the orchestrator.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmer with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmer(pub bool);

impl Confirmer for StaticConfirmer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Outcome of one gateway pass.
#[derive(Debug)]
pub struct GatewayOutcome {
    pub report: Option<ExecutionReport>,
    pub simulation: Option<SimulationResult>,
    pub final_state: FinalState,
    pub confirmation: ConfirmationDecision,
    /// User-facing refusal or failure message, if any.
    pub message: Option<String>,
}

impl GatewayOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self.final_state, FinalState::Finished)
    }
}

/// Thin front door over simulation, gating, execution, and auditing.
pub struct ExecutionGateway {
    engine: ExecutionEngine,
    simulator: RiskSimulator,
    permissions: PermissionChecker,
    ledger: AuditLedger,
}

impl ExecutionGateway {
    #[must_use]
    pub fn new(
        engine: ExecutionEngine,
        simulator: RiskSimulator,
        permissions: PermissionChecker,
        ledger: AuditLedger,
    ) -> Self {
        Self {
            engine,
            simulator,
            permissions,
            ledger,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Run one plan attempt through every gate.
    ///
    /// `auto_confirm` pre-grants confirmation (orchestrator steps and
    /// `simulate` dry-runs); otherwise `confirmer` resolves it.
    pub async fn execute_plan(
        &mut self,
        plan: &FrozenPlan,
        confirmer: &dyn Confirmer,
        auto_confirm: bool,
        force_confirmation: bool,
        kill_switch: Option<KillSwitch>,
    ) -> Result<GatewayOutcome, ExecError> {
        // 1. Permission gate.
        let permission = self.permissions.check(plan.risk_level());
        if !permission.allowed {
            tracing::warn!(plan_id = plan.plan_id(), reason = %permission.reason, "permission denied");
            self.record(plan, None, FinalState::Blocked, None)?;
            return Ok(GatewayOutcome {
                report: None,
                simulation: None,
                final_state: FinalState::Blocked,
                confirmation: ConfirmationDecision::NotRequired,
                message: Some(permission.reason),
            });
        }

        // 2. Simulate before execute; a simulation failure blocks.
        let simulation = match self.simulator.simulate_plan(plan) {
            Ok(simulation) => simulation,
            Err(error) => {
                self.record(plan, None, FinalState::Blocked, None)?;
                return Ok(GatewayOutcome {
                    report: None,
                    simulation: None,
                    final_state: FinalState::Blocked,
                    confirmation: ConfirmationDecision::NotRequired,
                    message: Some(error.to_string()),
                });
            }
        };

        // 3. Confirmation resolution. Denial is cancellation, not failure.
        let needs_confirmation = force_confirmation
            || plan.requires_confirmation()
            || simulation.requires_confirmation
            || permission.requires_confirmation;
        let confirmation = if !needs_confirmation {
            ConfirmationDecision::NotRequired
        } else if auto_confirm {
            ConfirmationDecision::Granted
        } else {
            let prompt = format!(
                "Plan {} carries {} risk ({} step(s)). Proceed?",
                plan.plan_id(),
                simulation.cumulative_risk,
                plan.steps().len()
            );
            if confirmer.confirm(&prompt) {
                ConfirmationDecision::Granted
            } else {
                ConfirmationDecision::Denied
            }
        };

        if confirmation == ConfirmationDecision::Denied {
            tracing::info!(plan_id = plan.plan_id(), "confirmation denied; cancelled");
            self.record(plan, Some(&simulation), FinalState::Denied, None)?;
            return Ok(GatewayOutcome {
                report: None,
                simulation: Some(simulation),
                final_state: FinalState::Denied,
                confirmation,
                message: Some("Execution cancelled: confirmation denied.".to_string()),
            });
        }

        // 4. Execute.
        let report = self.engine.execute_plan(plan, kill_switch).await;
        match report {
            Ok(report) => {
                self.record(plan, Some(&simulation), report.final_state, Some(&report))?;
                let message = report.error.clone();
                Ok(GatewayOutcome {
                    final_state: report.final_state,
                    simulation: Some(simulation),
                    confirmation,
                    message,
                    report: Some(report),
                })
            }
            Err(error) => {
                // Integrity breaches and graph errors still get audited.
                self.record(plan, Some(&simulation), FinalState::Blocked, None)?;
                Ok(GatewayOutcome {
                    report: None,
                    simulation: Some(simulation),
                    final_state: FinalState::Blocked,
                    confirmation,
                    message: Some(error.to_string()),
                })
            }
        }
    }

    fn record(
        &mut self,
        plan: &FrozenPlan,
        simulation: Option<&SimulationResult>,
        final_state: FinalState,
        report: Option<&ExecutionReport>,
    ) -> Result<(), ExecError> {
        let simulation_summary = simulation
            .map(SimulationResult::summary)
            .unwrap_or_else(|| "not-simulated".to_string());
        let mut entry = AuditEntry::new(
            plan.plan_id(),
            plan.deterministic_hash(),
            simulation_summary,
            final_state.as_str(),
        )
        .with_trace_id(format!("trace-{}", uuid::Uuid::new_v4()));

        if let Some(simulation) = simulation {
            entry = entry.with_extra("risk_factors", json!(simulation.risk_factors));
        }
        if let Some(report) = report {
            entry = entry.with_extra("steps_executed", json!(report.trace.len()));
            if let Some(error) = &report.error {
                entry = entry.with_extra("error", json!(error));
            }
        }
        self.ledger.record_entry(entry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use warden_plan::{PlanBuilder, PlanStep};
    use warden_policy::{RiskLevel, SafetyPolicyRegistry};
    use warden_tools::ToolRegistry;

    fn gateway(trust: f64) -> (tempfile::TempDir, ExecutionGateway) {
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(ToolRegistry::with_builtins().unwrap());
        let policies = Arc::new(SafetyPolicyRegistry::with_defaults());
        let gateway = ExecutionGateway::new(
            ExecutionEngine::new(Arc::clone(&tools), Arc::clone(&policies)),
            RiskSimulator::new(Arc::clone(&policies)),
            PermissionChecker::new(trust),
            AuditLedger::open(dir.path().join("audit.jsonl")).unwrap(),
        );
        (dir, gateway)
    }

    fn plan_for(tool: &str, input: serde_json::Value, risk: RiskLevel) -> FrozenPlan {
        let registry = ToolRegistry::with_builtins().unwrap();
        let identity = registry.get_tool_identity(tool).unwrap();
        PlanBuilder::new()
            .add_step(
                PlanStep::new(tool, input, risk)
                    .with_identity(identity.version, identity.sha256),
            )
            .freeze()
    }

    #[tokio::test]
    async fn low_risk_plan_executes_and_is_audited() {
        let (_dir, mut gateway) = gateway(0.8);
        let plan = plan_for("open_url", json!({"url": "https://google.com"}), RiskLevel::Low);
        let outcome = gateway
            .execute_plan(&plan, &StaticConfirmer(false), false, false, None)
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.final_state, FinalState::Finished);

        let entries = gateway.ledger().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].final_state, "FINISHED");
        assert_eq!(entries[0].deterministic_hash, plan.deterministic_hash());
        assert!(gateway.ledger().validate_chain().unwrap().valid);
    }

    #[tokio::test]
    async fn confirmation_denial_is_cancellation_with_ledger_entry() {
        let (_dir, mut gateway) = gateway(0.8);
        let plan = plan_for("delete_file", json!({"path": "a.txt"}), RiskLevel::High);
        let outcome = gateway
            .execute_plan(&plan, &StaticConfirmer(false), false, false, None)
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.final_state, FinalState::Denied);
        assert_eq!(outcome.confirmation, ConfirmationDecision::Denied);

        let entries = gateway.ledger().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].final_state, "DENIED");
    }

    #[tokio::test]
    async fn confirmation_grant_executes_high_risk_plan() {
        let (_dir, mut gateway) = gateway(0.8);
        let plan = plan_for("delete_file", json!({"path": "a.txt"}), RiskLevel::High);
        let outcome = gateway
            .execute_plan(&plan, &StaticConfirmer(true), false, false, None)
            .await
            .unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn low_trust_blocks_without_executing() {
        let (_dir, mut gateway) = gateway(0.2);
        let plan = plan_for("delete_file", json!({"path": "a.txt"}), RiskLevel::High);
        let outcome = gateway
            .execute_plan(&plan, &StaticConfirmer(true), false, false, None)
            .await
            .unwrap();
        assert_eq!(outcome.final_state, FinalState::Blocked);
        assert!(outcome.report.is_none());
        assert_eq!(gateway.ledger().entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn force_confirmation_applies_to_low_risk_plans() {
        let (_dir, mut gateway) = gateway(0.8);
        let plan = plan_for("open_url", json!({"url": "https://a.com"}), RiskLevel::Low);
        let outcome = gateway
            .execute_plan(&plan, &StaticConfirmer(false), false, true, None)
            .await
            .unwrap();
        assert_eq!(outcome.final_state, FinalState::Denied);
    }

    #[tokio::test]
    async fn every_attempt_writes_exactly_one_entry() {
        let (_dir, mut gateway) = gateway(0.8);
        let plan = plan_for("open_url", json!({"url": "https://a.com"}), RiskLevel::Low);
        for _ in 0..3 {
            let _ = gateway
                .execute_plan(&plan, &StaticConfirmer(true), false, false, None)
                .await
                .unwrap();
        }
        assert_eq!(gateway.ledger().entries().unwrap().len(), 3);
        assert!(gateway.ledger().validate_chain().unwrap().valid);
    }
}
