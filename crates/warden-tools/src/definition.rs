use crate::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use warden_policy::RiskLevel;

/// Pinned identity of a tool: what plans freeze and the engine re-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolIdentity {
    pub version: String,
    pub sha256: String,
}

/// Registered metadata for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub version: String,
    /// Category: file, network, application, system, config.
    pub action_type: String,
    pub risk_category: RiskLevel,
    pub reversible: bool,
    /// JSON Schema the validated input must satisfy.
    pub input_schema: Value,
    /// JSON Schema describing the output payload.
    pub output_schema: Value,
    pub requires_confirmation: bool,
    pub max_execution_seconds: u64,
    pub enabled: bool,
}

impl ToolDefinition {
    /// SHA-256 identity over the definition's behavioral surface.
    ///
    /// Covers name, version, and the input schema so that any change to
    /// what the tool accepts changes its identity.
    #[must_use]
    pub fn identity(&self) -> ToolIdentity {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.version.as_bytes());
        hasher.update([0]);
        hasher.update(self.input_schema.to_string().as_bytes());
        ToolIdentity {
            version: self.version.clone(),
            sha256: hex::encode(hasher.finalize()),
        }
    }
}

/// Result payload from a tool dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolOutcome {
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(reason.into()),
        }
    }
}

/// Contract every dispatchable tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Execute with schema-validated input.
    async fn execute(&self, input: &Value) -> Result<ToolOutcome, ToolError>;

    /// Post-execution verification hook.
    ///
    /// Called by the engine after a dispatch; a `false` return marks the
    /// step failed even if the tool reported success.
    fn verify(&self, _operation: &str, result: &ToolOutcome) -> bool {
        result.success
    }
}
