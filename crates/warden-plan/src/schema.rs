use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;
use warden_policy::RiskLevel;

/// Execution governor for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

/// One atomic action inside a plan.
///
/// Tool identity (`tool_version`, `tool_sha256`) is pinned at planning
/// time; the engine aborts if the runtime identity differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: String,
    pub tool_name: String,
    pub tool_version: String,
    pub tool_sha256: String,
    /// Parameters already checked against the tool's input schema.
    pub validated_input: Value,
    pub step_risk: RiskLevel,
    /// Predecessor step IDs; kept sorted for canonical hashing.
    pub depends_on: Vec<String>,
    pub retry_policy: RetryPolicy,
    pub timeout_seconds: u64,
    pub description: String,
}

impl PlanStep {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, validated_input: Value, step_risk: RiskLevel) -> Self {
        Self {
            step_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            tool_version: String::new(),
            tool_sha256: String::new(),
            validated_input,
            step_risk,
            depends_on: Vec::new(),
            retry_policy: RetryPolicy::default(),
            timeout_seconds: 30,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = step_id.into();
        self
    }

    #[must_use]
    pub fn with_identity(mut self, version: impl Into<String>, sha256: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self.tool_sha256 = sha256.into();
        self
    }

    #[must_use]
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Canonical JSON string for hashing. Keys are sorted; `depends_on`
    /// is sorted; the description is excluded (display-only).
    #[must_use]
    pub fn to_deterministic_string(&self) -> String {
        let mut sorted_deps = self.depends_on.clone();
        sorted_deps.sort();
        let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
        fields.insert("tool_name", self.tool_name.clone().into());
        fields.insert("tool_version", self.tool_version.clone().into());
        fields.insert("tool_sha256", self.tool_sha256.clone().into());
        fields.insert("validated_input", self.validated_input.clone());
        fields.insert("depends_on", sorted_deps.into());
        fields.insert(
            "retry_policy",
            serde_json::json!({"max_retries": self.retry_policy.max_retries}),
        );
        fields.insert("timeout_seconds", self.timeout_seconds.into());
        fields.insert("step_risk", self.step_risk.as_str().into());
        serde_json::to_string(&fields).expect("canonical step serialization is infallible")
    }
}

/// Mutable plan under construction. Consumed by [`PlanBuilder::freeze`].
#[derive(Debug, Default)]
pub struct PlanBuilder {
    steps: Vec<PlanStep>,
}

impl PlanBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push_step(&mut self, step: PlanStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Freeze the plan: sort step dependencies, derive plan risk and the
    /// confirmation flag, compute the canonical snapshot and SHA-256, and
    /// seal everything behind read-only accessors.
    #[must_use]
    pub fn freeze(mut self) -> FrozenPlan {
        for step in &mut self.steps {
            step.depends_on.sort();
        }

        let risk_level = self
            .steps
            .iter()
            .map(|s| s.step_risk)
            .max()
            .unwrap_or(RiskLevel::Low);
        let requires_confirmation = self
            .steps
            .iter()
            .any(|s| s.step_risk >= RiskLevel::High);

        let snapshot = canonical_string(&self.steps);
        let deterministic_hash = hash_snapshot(&snapshot);
        let plan = FrozenPlan {
            plan_id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
            risk_level,
            steps: self.steps,
            requires_confirmation,
            deterministic_hash,
            snapshot,
        };
        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            risk = %plan.risk_level,
            hash = %&plan.deterministic_hash[..16],
            "plan frozen"
        );
        plan
    }
}

fn canonical_string(steps: &[PlanStep]) -> String {
    steps
        .iter()
        .map(PlanStep::to_deterministic_string)
        .collect::<Vec<_>>()
        .join("|")
}

fn hash_snapshot(snapshot: &str) -> String {
    hex::encode(Sha256::digest(snapshot.as_bytes()))
}

/// An immutable, integrity-checkable plan.
///
/// Constructed only by [`PlanBuilder::freeze`]; every field is private
/// and exposed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenPlan {
    plan_id: String,
    created_at: i64,
    risk_level: RiskLevel,
    steps: Vec<PlanStep>,
    requires_confirmation: bool,
    deterministic_hash: String,
    snapshot: String,
}

impl FrozenPlan {
    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    #[must_use]
    pub fn deterministic_hash(&self) -> &str {
        &self.deterministic_hash
    }

    #[must_use]
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Recompute the canonical snapshot and hash, comparing byte-for-byte
    /// against the stored values.
    #[must_use]
    pub fn validate_integrity(&self) -> bool {
        let current_snapshot = canonical_string(&self.steps);
        let current_hash = hash_snapshot(&current_snapshot);
        current_snapshot == self.snapshot && current_hash == self.deterministic_hash
    }
}
