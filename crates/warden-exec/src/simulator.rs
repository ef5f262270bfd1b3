//! Pre-execution risk simulation.
//!
//! Inspects a frozen plan for compound risk patterns and enforces
//! governance gates. No plan executes without simulator approval.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_plan::FrozenPlan;
use warden_policy::{PolicyError, RiskLevel, SafetyPolicyRegistry};

/// Outcome of the risk simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub cumulative_risk: RiskLevel,
    pub requires_confirmation: bool,
    pub requires_sandbox: bool,
    pub rollback_required: bool,
    pub risk_factors: Vec<String>,
}

impl SimulationResult {
    /// Compact summary string recorded in the audit ledger.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "risk={} confirmation={} sandbox={} factors={}",
            self.cumulative_risk,
            self.requires_confirmation,
            self.requires_sandbox,
            self.risk_factors.len()
        )
    }
}

/// Compound-risk engine over frozen plans.
///
/// Escalation rules:
/// - 2+ HIGH steps escalate to CRITICAL
/// - more than one destructive step escalates to CRITICAL
/// - destructive + network escalates one level
/// - file + network is at least HIGH (exfiltration pattern)
/// - any irreversible step forces confirmation
pub struct RiskSimulator {
    policies: Arc<SafetyPolicyRegistry>,
}

impl RiskSimulator {
    #[must_use]
    pub fn new(policies: Arc<SafetyPolicyRegistry>) -> Self {
        Self { policies }
    }

    /// Inspect the full plan and compute compound risk.
    pub fn simulate_plan(&self, plan: &FrozenPlan) -> Result<SimulationResult, PolicyError> {
        let mut result = SimulationResult {
            cumulative_risk: RiskLevel::Low,
            requires_confirmation: false,
            requires_sandbox: false,
            rollback_required: false,
            risk_factors: Vec::new(),
        };

        let mut destructive_count = 0usize;
        let mut high_risk_count = 0usize;
        let mut irreversible_count = 0usize;
        let mut has_file_op = false;
        let mut has_network_op = false;

        for step in plan.steps() {
            let policy = self.policies.get_policy(&step.tool_name)?;

            if policy.destructive {
                destructive_count += 1;
                result
                    .risk_factors
                    .push(format!("Destructive step: {}", step.tool_name));
            }

            if policy.requires_sandbox {
                result.requires_sandbox = true;
                result
                    .risk_factors
                    .push(format!("Sandbox required: {}", step.tool_name));
            }

            if policy.reversible {
                result.rollback_required = true;
            } else {
                irreversible_count += 1;
                result
                    .risk_factors
                    .push(format!("Irreversible step: {}", step.tool_name));
            }

            // Operation domains, keyed off the tool-name verb.
            let category = step.tool_name.split('_').next().unwrap_or("");
            if matches!(category, "read" | "write" | "delete" | "create") {
                has_file_op = true;
            }
            if matches!(category, "open" | "download" | "post" | "search") {
                has_network_op = true;
            }

            match step.step_risk {
                RiskLevel::Critical => {
                    result.cumulative_risk = RiskLevel::Critical;
                    result.requires_confirmation = true;
                }
                RiskLevel::High => {
                    high_risk_count += 1;
                    if result.cumulative_risk != RiskLevel::Critical {
                        result.cumulative_risk = RiskLevel::High;
                    }
                    result.requires_confirmation = true;
                }
                _ => {}
            }
        }

        if high_risk_count >= 2 {
            result.cumulative_risk = RiskLevel::Critical;
            result.requires_confirmation = true;
            result.risk_factors.push(format!(
                "COMPOUND-RISK: {high_risk_count} HIGH-risk steps chained → CRITICAL."
            ));
        }

        if destructive_count > 1 {
            result.cumulative_risk = RiskLevel::Critical;
            result.requires_confirmation = true;
            result.risk_factors.push(format!(
                "COMPOUND-RISK: {destructive_count} destructive operations → CRITICAL."
            ));
        }

        if destructive_count > 0 && has_network_op {
            result.cumulative_risk = result.cumulative_risk.escalate(1);
            result.requires_confirmation = true;
            result.risk_factors.push(
                "COMPOUND-RISK: Destructive + Network cross-domain → escalated.".to_string(),
            );
        }

        if has_file_op && has_network_op {
            if result.cumulative_risk < RiskLevel::High {
                result.cumulative_risk = RiskLevel::High;
            }
            result.requires_confirmation = true;
            result.risk_factors.push(
                "COMPOUND-RISK: File + Network operations → exfiltration risk.".to_string(),
            );
        }

        if irreversible_count > 0 {
            result.requires_confirmation = true;
            result.risk_factors.push(format!(
                "IRREVERSIBLE: {irreversible_count} non-reversible step(s) present."
            ));
        }

        tracing::info!(
            plan_id = plan.plan_id(),
            risk = %result.cumulative_risk,
            confirmation = result.requires_confirmation,
            sandbox = result.requires_sandbox,
            factors = result.risk_factors.len(),
            "plan simulated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_plan::{PlanBuilder, PlanStep};

    fn simulator() -> RiskSimulator {
        RiskSimulator::new(Arc::new(SafetyPolicyRegistry::with_defaults()))
    }

    fn step(tool: &str, risk: RiskLevel) -> PlanStep {
        PlanStep::new(tool, json!({"path": "x.txt"}), risk)
    }

    #[test]
    fn single_low_risk_step_passes_quietly() {
        let plan = PlanBuilder::new()
            .add_step(step("read_file", RiskLevel::Low))
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert_eq!(result.cumulative_risk, RiskLevel::Low);
        assert!(!result.requires_confirmation);
        assert!(!result.requires_sandbox);
    }

    #[test]
    fn two_high_risk_steps_escalate_to_critical() {
        let plan = PlanBuilder::new()
            .add_step(step("delete_file", RiskLevel::High))
            .add_step(step("install_software", RiskLevel::High))
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert_eq!(result.cumulative_risk, RiskLevel::Critical);
        assert!(result.requires_confirmation);
        assert!(result
            .risk_factors
            .iter()
            .any(|f| f.contains("COMPOUND-RISK: 2 HIGH-risk steps chained")));
    }

    #[test]
    fn multiple_destructive_steps_are_critical() {
        let plan = PlanBuilder::new()
            .add_step(step("delete_file", RiskLevel::High))
            .add_step(step("write_file", RiskLevel::Medium))
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert_eq!(result.cumulative_risk, RiskLevel::Critical);
    }

    #[test]
    fn file_plus_network_is_at_least_high() {
        let plan = PlanBuilder::new()
            .add_step(step("read_file", RiskLevel::Low))
            .add_step(
                PlanStep::new("open_url", json!({"url": "https://a.com"}), RiskLevel::Low),
            )
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert!(result.cumulative_risk >= RiskLevel::High);
        assert!(result.requires_confirmation);
        assert!(result
            .risk_factors
            .iter()
            .any(|f| f.contains("exfiltration")));
    }

    #[test]
    fn irreversible_step_forces_confirmation() {
        let plan = PlanBuilder::new()
            .add_step(step("delete_file", RiskLevel::High))
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert!(result.requires_confirmation);
        assert!(result
            .risk_factors
            .iter()
            .any(|f| f.starts_with("IRREVERSIBLE")));
    }

    #[test]
    fn sandbox_flag_propagates_from_policy() {
        let plan = PlanBuilder::new()
            .add_step(
                PlanStep::new(
                    "write_file",
                    json!({"path": "a.txt", "content": "x"}),
                    RiskLevel::Medium,
                ),
            )
            .freeze();
        let result = simulator().simulate_plan(&plan).unwrap();
        assert!(result.requires_sandbox);
    }

    #[test]
    fn unknown_tool_fails_simulation() {
        let plan = PlanBuilder::new()
            .add_step(step("mystery_tool", RiskLevel::Low))
            .freeze();
        assert!(simulator().simulate_plan(&plan).is_err());
    }
}
