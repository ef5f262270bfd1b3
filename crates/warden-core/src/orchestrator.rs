//! Autonomous multi-step orchestration.
//!
//! Only reachable at DEEP depth for goal intents. The advisor proposes a
//! strict-JSON plan; the orchestrator validates it (step cap, known
//! intents, loop prevention) and executes each step through the caller's
//! governed pathway. The safety gate, policy engine, and watchdog still
//! apply; only the intent classifier is bypassed.

use crate::advisor::Advisor;
use crate::config::OrchestrationConfig;
use crate::depth::ReasoningLevel;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use warden_intent::{Command, DecisionSource};
use warden_policy::CapabilityRegistry;

/// One advisor-proposed step.
#[derive(Debug, Clone)]
pub struct OrchestratorStep {
    pub step_id: i64,
    pub intent: String,
    pub parameters: Map<String, Value>,
    pub description: String,
}

/// Outcome of one step run through the governed pathway.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

/// The caller-provided governed execution pathway.
#[async_trait]
pub trait StepRunner: Send {
    async fn run_step(&mut self, command: Command) -> StepOutcome;
}

/// Final orchestration summary.
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    /// `success` or `aborted`.
    pub status: &'static str,
    pub steps_executed: usize,
    pub failed_step: Option<i64>,
    pub audit_log: Vec<Value>,
    pub total_time_ms: u64,
}

/// Errors that force an immediate orchestration abort.
const CRITICAL_STEP_ERRORS: &[&str] = &["Policy Violation", "Execution Blocked"];

/// Structured multi-step task planning and controlled execution.
pub struct TaskOrchestrator {
    config: OrchestrationConfig,
}

impl TaskOrchestrator {
    #[must_use]
    pub fn new(config: OrchestrationConfig) -> Self {
        Self { config }
    }

    /// Ask the advisor for a plan and validate it. An empty vector means
    /// the plan was rejected (or the depth was wrong).
    pub async fn generate_plan(
        &self,
        goal: &str,
        advisor: &dyn Advisor,
        reasoning_level: ReasoningLevel,
        capabilities: &CapabilityRegistry,
    ) -> Vec<OrchestratorStep> {
        if reasoning_level != ReasoningLevel::Deep {
            tracing::warn!("plan generation attempted outside DEEP reasoning");
            return Vec::new();
        }

        let Some(raw) = advisor.propose_plan(goal).await else {
            tracing::error!("advisor produced no plan");
            return Vec::new();
        };
        let Some(list) = raw.as_array() else {
            tracing::error!("advisor plan is not a list");
            return Vec::new();
        };

        if list.len() > self.config.max_steps {
            tracing::warn!(
                steps = list.len(),
                limit = self.config.max_steps,
                "plan rejected: exceeds step limit"
            );
            return Vec::new();
        }

        let mut steps = Vec::with_capacity(list.len());
        let mut intent_counts: HashMap<String, usize> = HashMap::new();
        for (index, entry) in list.iter().enumerate() {
            let Some(intent) = entry.get("intent").and_then(Value::as_str) else {
                tracing::error!(index, "plan step missing intent");
                return Vec::new();
            };

            if !capabilities.is_intent_allowed(intent) {
                tracing::warn!(intent, "plan rejected: unknown intent");
                return Vec::new();
            }

            let count = intent_counts.entry(intent.to_string()).or_insert(0);
            *count += 1;
            if *count >= self.config.max_intent_repetitions {
                tracing::warn!(intent, "plan rejected: repeated intent (potential loop)");
                return Vec::new();
            }

            steps.push(OrchestratorStep {
                step_id: entry
                    .get("step_id")
                    .and_then(Value::as_i64)
                    .unwrap_or((index as i64) + 1),
                intent: intent.to_string(),
                parameters: entry
                    .get("parameters")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        steps
    }

    /// Execute a validated plan through `runner` under the global timeout
    /// and consecutive-failure guard.
    pub async fn execute_plan(
        &self,
        steps: Vec<OrchestratorStep>,
        runner: &mut dyn StepRunner,
    ) -> OrchestrationResult {
        let started = Instant::now();
        let mut audit_log = Vec::new();
        let mut steps_executed = 0usize;
        let mut failed_step = None;
        let mut status = "success";
        let mut consecutive_failures = 0usize;

        for step in steps {
            if started.elapsed().as_secs() > self.config.global_timeout_seconds {
                tracing::error!("orchestration aborted: global timeout exceeded");
                status = "aborted";
                break;
            }

            tracing::info!(
                step = step.step_id,
                intent = %step.intent,
                description = %step.description,
                "executing orchestrated step"
            );

            let command = Command::new(
                step.description.clone(),
                step.intent.clone(),
                step.parameters.clone(),
                1.0,
                DecisionSource::Orchestrator,
            );
            let outcome = runner.run_step(command).await;

            audit_log.push(json!({
                "step_id": step.step_id,
                "intent": step.intent,
                "description": step.description,
                "success": outcome.success,
                "output": outcome.output,
                "error": outcome.error,
            }));

            if outcome.success {
                steps_executed += 1;
                consecutive_failures = 0;
                continue;
            }

            consecutive_failures += 1;
            let is_critical = outcome
                .error
                .as_deref()
                .is_some_and(|e| CRITICAL_STEP_ERRORS.contains(&e));
            if consecutive_failures >= 2 {
                tracing::warn!("orchestration aborted: 2 consecutive step failures");
                status = "aborted";
                failed_step = Some(step.step_id);
                break;
            }
            if is_critical {
                tracing::error!(step = step.step_id, "critical security failure; aborting plan");
                status = "aborted";
                failed_step = Some(step.step_id);
                break;
            }
            // A single ordinary failure is recorded and the plan continues.
            failed_step = Some(step.step_id);
        }

        let total_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        OrchestrationResult {
            status,
            steps_executed,
            failed_step,
            audit_log,
            total_time_ms,
        }
    }
}
