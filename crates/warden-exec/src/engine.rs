//! Deterministic plan execution.
//!
//! Structural isolation: the engine accepts only narrow interfaces (tool
//! registry, policy registry). No router, no planner, no memory layer.
//! It validates plan integrity, orders steps topologically, polls the
//! kill-switch before every step, re-checks pinned tool identities, and
//! routes sandboxed tools through the no-mutation wrapper.

use crate::rollback::{RollbackEngine, RollbackSummary};
use crate::ExecError;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use warden_plan::{FrozenPlan, PlanStep};
use warden_policy::SafetyPolicyRegistry;
use warden_tools::ToolRegistry;

/// Externally-asserted predicate polled before each step.
pub type KillSwitch = Arc<dyn Fn() -> bool + Send + Sync>;

/// Terminal state of a plan attempt, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalState {
    Finished,
    Failed,
    Aborted,
    Denied,
    Blocked,
}

impl FinalState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinalState::Finished => "FINISHED",
            FinalState::Failed => "FAILED",
            FinalState::Aborted => "ABORTED",
            FinalState::Denied => "DENIED",
            FinalState::Blocked => "BLOCKED",
        }
    }
}

/// One executed (or attempted) step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTrace {
    pub step_id: String,
    pub tool: String,
    pub success: bool,
    pub sandboxed: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of one plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub success: bool,
    pub aborted: bool,
    pub final_state: FinalState,
    pub trace: Vec<StepTrace>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub rollback: Option<RollbackSummary>,
    /// Reversible actions left unrolled after a kill-switch abort; the
    /// caller decides whether that warrants manual recovery.
    pub pending_rollback_actions: usize,
}

/// Executes frozen plans under the safety gates.
pub struct ExecutionEngine {
    tools: Arc<ToolRegistry>,
    policies: Arc<SafetyPolicyRegistry>,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>, policies: Arc<SafetyPolicyRegistry>) -> Self {
        Self { tools, policies }
    }

    /// Execute `plan`. The rollback stack lives and dies with this call.
    pub async fn execute_plan(
        &self,
        plan: &FrozenPlan,
        kill_switch: Option<KillSwitch>,
    ) -> Result<ExecutionReport, ExecError> {
        tracing::info!(plan_id = plan.plan_id(), "plan execution started");
        let started = Instant::now();

        if !plan.validate_integrity() {
            tracing::error!(plan_id = plan.plan_id(), "snapshot/hash mismatch");
            return Err(ExecError::PlanIntegrityBreach);
        }

        let ordered = sort_steps(plan.steps())?;

        let mut rollback = RollbackEngine::default();
        let mut context: HashMap<String, Value> = HashMap::new();
        let mut trace: Vec<StepTrace> = Vec::with_capacity(ordered.len());
        let mut plan_success = true;
        let mut aborted = false;
        let mut plan_error: Option<String> = None;

        for step in ordered {
            if let Some(check) = &kill_switch {
                if check() {
                    tracing::warn!(plan_id = plan.plan_id(), "kill-switch asserted; aborting");
                    plan_success = false;
                    aborted = true;
                    plan_error = Some("EXECUTION-ABORTED".to_string());
                    break;
                }
            }

            let step_started = Instant::now();
            tracing::info!(step = %step.step_id, tool = %step.tool_name, "step started");

            // Pinned identity must still match the runtime tool.
            if !step.tool_sha256.is_empty() {
                let runtime = self.tools.get_tool_identity(&step.tool_name);
                let drifted = runtime
                    .as_ref()
                    .map_or(true, |identity| identity.sha256 != step.tool_sha256);
                if drifted {
                    tracing::error!(
                        step = %step.step_id,
                        tool = %step.tool_name,
                        "tool changed since plan freeze"
                    );
                    plan_success = false;
                    plan_error = Some("TOOL_DRIFT_DETECTED".to_string());
                    trace.push(StepTrace {
                        step_id: step.step_id.clone(),
                        tool: step.tool_name.clone(),
                        success: false,
                        sandboxed: false,
                        duration_ms: 0,
                        error: Some("TOOL_DRIFT_DETECTED".to_string()),
                    });
                    break;
                }
            }

            let input = match substitute_parameters(&step.validated_input, &context) {
                Ok(input) => input,
                Err(reference) => {
                    tracing::error!(step = %step.step_id, reference, "unresolvable reference");
                    plan_success = false;
                    let message = format!("Unresolvable reference: {reference}");
                    plan_error = Some(message.clone());
                    trace.push(StepTrace {
                        step_id: step.step_id.clone(),
                        tool: step.tool_name.clone(),
                        success: false,
                        sandboxed: false,
                        duration_ms: 0,
                        error: Some(message),
                    });
                    break;
                }
            };

            let policy = self.policies.get_policy(&step.tool_name)?;
            if policy.reversible {
                rollback.capture_pre_state(
                    &step.step_id,
                    &step.tool_name,
                    policy.pre_state_capture.as_deref(),
                    &input,
                );
            }

            let sandboxed = policy.requires_sandbox;
            let outcome = if sandboxed {
                sandbox_dispatch(step, &input)
            } else {
                match self.tools.dispatch(&step.tool_name, &input).await {
                    Ok(outcome) => outcome,
                    Err(error) => warden_tools::ToolOutcome::failed(error.to_string()),
                }
            };

            let duration_ms = u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX);

            if outcome.success {
                tracing::info!(step = %step.step_id, duration_ms, "step completed");
                context.insert(step.step_id.clone(), outcome.output);
                trace.push(StepTrace {
                    step_id: step.step_id.clone(),
                    tool: step.tool_name.clone(),
                    success: true,
                    sandboxed,
                    duration_ms,
                    error: None,
                });
            } else {
                let error = outcome.error.unwrap_or_else(|| "step failed".to_string());
                tracing::error!(step = %step.step_id, %error, "step failed");
                plan_success = false;
                plan_error = Some(error.clone());
                trace.push(StepTrace {
                    step_id: step.step_id.clone(),
                    tool: step.tool_name.clone(),
                    success: false,
                    sandboxed,
                    duration_ms,
                    error: Some(error),
                });
                break;
            }
        }

        // Failed plans roll back recorded reversible actions. Kill-switch
        // aborts leave the decision to the caller.
        let pending_rollback_actions = if aborted { rollback.stack_len() } else { 0 };
        let rollback_summary = if !plan_success && !aborted && rollback.stack_len() > 0 {
            Some(rollback.execute_rollback())
        } else {
            if plan_success {
                rollback.clear();
            }
            None
        };

        let final_state = if aborted {
            FinalState::Aborted
        } else if plan_success {
            FinalState::Finished
        } else {
            FinalState::Failed
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            plan_id = plan.plan_id(),
            state = final_state.as_str(),
            duration_ms,
            "plan finished"
        );

        Ok(ExecutionReport {
            plan_id: plan.plan_id().to_string(),
            success: plan_success,
            aborted,
            final_state,
            trace,
            duration_ms,
            error: plan_error,
            rollback: rollback_summary,
            pending_rollback_actions,
        })
    }
}

/// Sandbox wrapper for tools marked `requires_sandbox`: no real state
/// mutation, returns a simulated-diff payload. No bypass exists.
fn sandbox_dispatch(step: &PlanStep, input: &Value) -> warden_tools::ToolOutcome {
    tracing::info!(step = %step.step_id, tool = %step.tool_name, "routing through sandbox");
    let params_preview: Map<String, Value> = input
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| {
                    let preview: String = value.to_string().chars().take(100).collect();
                    (key.clone(), Value::from(preview))
                })
                .collect()
        })
        .unwrap_or_default();
    let param_count = params_preview.len();
    warden_tools::ToolOutcome::ok(json!({
        "status": "sandbox_simulated",
        "tool": step.tool_name,
        "params_preview": params_preview,
        "diff": format!(
            "[SANDBOX] Would execute '{}' with {param_count} parameters.",
            step.tool_name
        ),
        "real_execution_required": true,
    }))
}

/// Kahn's algorithm with a deterministic tie-break: ready steps run in
/// sorted step-ID order.
fn sort_steps(steps: &[PlanStep]) -> Result<Vec<&PlanStep>, ExecError> {
    let step_map: BTreeMap<&str, &PlanStep> =
        steps.iter().map(|s| (s.step_id.as_str(), s)).collect();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for step in steps {
        graph.add_node(step.step_id.as_str());
    }
    for step in steps {
        for dep in &step.depends_on {
            if !step_map.contains_key(dep.as_str()) {
                return Err(ExecError::UnknownDependency(dep.clone()));
            }
            graph.add_edge(dep.as_str(), step.step_id.as_str(), ());
        }
    }
    if petgraph::algo::is_cyclic_directed(&graph) {
        return Err(ExecError::CircularDependency);
    }

    let mut in_degree: BTreeMap<&str, usize> = steps
        .iter()
        .map(|s| (s.step_id.as_str(), s.depends_on.len()))
        .collect();
    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut ordered = Vec::with_capacity(steps.len());

    while !queue.is_empty() {
        queue.sort_unstable();
        let current = queue.remove(0);
        ordered.push(step_map[current]);
        for successor in graph.neighbors(current) {
            if let Some(degree) = in_degree.get_mut(successor) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push(successor);
                }
            }
        }
    }

    if ordered.len() != steps.len() {
        return Err(ExecError::CircularDependency);
    }
    Ok(ordered)
}

/// Replace `${step_id.field}` references against accumulated step
/// outputs. A reference that cannot be resolved fails the step.
fn substitute_parameters(
    params: &Value,
    context: &HashMap<String, Value>,
) -> Result<Value, String> {
    let Some(object) = params.as_object() else {
        return Ok(params.clone());
    };
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        let resolved = match value.as_str() {
            Some(text) if text.starts_with("${") && text.ends_with('}') => {
                let reference = &text[2..text.len() - 1];
                let mut parts = reference.splitn(2, '.');
                let step_id = parts.next().unwrap_or_default();
                let field = parts.next();
                match (context.get(step_id), field) {
                    (Some(output), Some(field)) if output.get(field).is_some() => {
                        output[field].clone()
                    }
                    _ => return Err(text.to_string()),
                }
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), resolved);
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use warden_plan::PlanBuilder;
    use warden_policy::RiskLevel;

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(
            Arc::new(ToolRegistry::with_builtins().unwrap()),
            Arc::new(SafetyPolicyRegistry::with_defaults()),
        )
    }

    fn identity_for(tool: &str) -> (String, String) {
        let registry = ToolRegistry::with_builtins().unwrap();
        let identity = registry.get_tool_identity(tool).unwrap();
        (identity.version, identity.sha256)
    }

    fn pinned_step(tool: &str, input: Value, risk: RiskLevel) -> PlanStep {
        let (version, sha) = identity_for(tool);
        PlanStep::new(tool, input, risk).with_identity(version, sha)
    }

    #[tokio::test]
    async fn single_step_plan_finishes() {
        let plan = PlanBuilder::new()
            .add_step(pinned_step(
                "open_url",
                json!({"url": "https://google.com"}),
                RiskLevel::Low,
            ))
            .freeze();
        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(report.success);
        assert_eq!(report.final_state, FinalState::Finished);
        assert_eq!(report.trace.len(), 1);
        assert!(report.trace[0].success);
        assert!(!report.trace[0].sandboxed);
    }

    #[tokio::test]
    async fn tool_drift_aborts_without_effects() {
        let plan = PlanBuilder::new()
            .add_step(
                PlanStep::new("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
                    .with_identity("1.0.0", "f".repeat(64)),
            )
            .freeze();
        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("TOOL_DRIFT_DETECTED"));
        assert_eq!(report.trace.len(), 1);
        assert_eq!(
            report.trace[0].error.as_deref(),
            Some("TOOL_DRIFT_DETECTED")
        );
    }

    #[tokio::test]
    async fn sandboxed_tools_return_simulated_diff() {
        let plan = PlanBuilder::new()
            .add_step(pinned_step(
                "write_file",
                json!({"path": "a.txt", "content": "hello"}),
                RiskLevel::Medium,
            ))
            .freeze();
        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(report.success);
        assert!(report.trace[0].sandboxed);
    }

    #[tokio::test]
    async fn kill_switch_aborts_before_first_step() {
        let plan = PlanBuilder::new()
            .add_step(pinned_step(
                "open_url",
                json!({"url": "https://a.com"}),
                RiskLevel::Low,
            ))
            .freeze();
        let switch: KillSwitch = Arc::new(|| true);
        let report = engine().execute_plan(&plan, Some(switch)).await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.final_state, FinalState::Aborted);
        assert_eq!(report.error.as_deref(), Some("EXECUTION-ABORTED"));
        assert!(report.trace.is_empty());
    }

    #[tokio::test]
    async fn kill_switch_aborts_mid_plan() {
        let first = pinned_step("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
            .with_id("a-first");
        let second = pinned_step("open_url", json!({"url": "https://b.com"}), RiskLevel::Low)
            .with_id("b-second")
            .depends_on("a-first");
        let plan = PlanBuilder::new().add_step(first).add_step(second).freeze();

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        // First poll passes, every later poll aborts.
        let switch: KillSwitch = Arc::new(move || fired_clone.swap(true, Ordering::SeqCst));
        let report = engine().execute_plan(&plan, Some(switch)).await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.trace.len(), 1);
    }

    #[tokio::test]
    async fn steps_execute_in_topological_order_with_sorted_ties() {
        let a = pinned_step("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
            .with_id("step-c");
        let b = pinned_step("open_url", json!({"url": "https://b.com"}), RiskLevel::Low)
            .with_id("step-a");
        let c = pinned_step("open_url", json!({"url": "https://c.com"}), RiskLevel::Low)
            .with_id("step-b")
            .depends_on("step-a");
        let plan = PlanBuilder::new().add_step(a).add_step(b).add_step(c).freeze();

        let report = engine().execute_plan(&plan, None).await.unwrap();
        let order: Vec<&str> = report.trace.iter().map(|t| t.step_id.as_str()).collect();
        assert_eq!(order, vec!["step-a", "step-b", "step-c"]);
    }

    #[tokio::test]
    async fn output_references_substitute_between_steps() {
        let producer = pinned_step(
            "open_url",
            json!({"url": "https://a.com"}),
            RiskLevel::Low,
        )
        .with_id("producer");
        // open_url output carries a "url" field the consumer references.
        let consumer = pinned_step(
            "open_url",
            json!({"url": "${producer.url}"}),
            RiskLevel::Low,
        )
        .with_id("z-consumer")
        .depends_on("producer");
        let plan = PlanBuilder::new()
            .add_step(producer)
            .add_step(consumer)
            .freeze();

        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(report.success, "error: {:?}", report.error);
    }

    #[tokio::test]
    async fn unresolved_reference_fails_the_step() {
        let step = pinned_step(
            "open_url",
            json!({"url": "${ghost.url}"}),
            RiskLevel::Low,
        )
        .with_id("only");
        let plan = PlanBuilder::new().add_step(step).freeze();
        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(!report.success);
        assert!(report
            .error
            .as_deref()
            .unwrap()
            .contains("Unresolvable reference"));
    }

    #[tokio::test]
    async fn failed_step_triggers_rollback_of_reversible_steps() {
        let create = pinned_step(
            "create_file",
            json!({"path": "a.txt"}),
            RiskLevel::Low,
        )
        .with_id("a-create");
        // The malformed URL fails the tool's input schema at dispatch.
        let failing = pinned_step(
            "open_url",
            json!({"url": "not-a-url"}),
            RiskLevel::Low,
        )
        .with_id("b-failing")
        .depends_on("a-create");
        let plan = PlanBuilder::new().add_step(create).add_step(failing).freeze();

        let report = engine().execute_plan(&plan, None).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.final_state, FinalState::Failed);
        let rollback = report.rollback.expect("rollback ran");
        assert_eq!(rollback.total, 1);
        assert_eq!(rollback.rolled_back, 1);
    }

    #[tokio::test]
    async fn cycles_are_rejected() {
        let a = pinned_step("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
            .with_id("a")
            .depends_on("b");
        let b = pinned_step("open_url", json!({"url": "https://b.com"}), RiskLevel::Low)
            .with_id("b")
            .depends_on("a");
        let plan = PlanBuilder::new().add_step(a).add_step(b).freeze();
        let result = engine().execute_plan(&plan, None).await;
        assert!(matches!(result, Err(ExecError::CircularDependency)));
    }

    #[tokio::test]
    async fn unknown_dependency_is_rejected() {
        let a = pinned_step("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
            .with_id("a")
            .depends_on("missing");
        let plan = PlanBuilder::new().add_step(a).freeze();
        let result = engine().execute_plan(&plan, None).await;
        assert!(matches!(result, Err(ExecError::UnknownDependency(_))));
    }

    #[test]
    fn substitution_ignores_plain_values() {
        let context = HashMap::new();
        let params = json!({"path": "a.txt", "count": 3});
        let out = substitute_parameters(&params, &context).unwrap();
        assert_eq!(out, params);
    }

    #[tokio::test]
    async fn kill_switch_counts_pending_rollback_actions() {
        let create = pinned_step("create_file", json!({"path": "a.txt"}), RiskLevel::Low)
            .with_id("a-create");
        let second = pinned_step("open_url", json!({"url": "https://a.com"}), RiskLevel::Low)
            .with_id("b-open")
            .depends_on("a-create");
        let plan = PlanBuilder::new().add_step(create).add_step(second).freeze();

        let polls = Arc::new(AtomicUsize::new(0));
        let polls_clone = Arc::clone(&polls);
        let switch: KillSwitch =
            Arc::new(move || polls_clone.fetch_add(1, Ordering::SeqCst) >= 1);
        let report = engine().execute_plan(&plan, Some(switch)).await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.pending_rollback_actions, 1);
        assert!(report.rollback.is_none());
    }
}
