//! Built-in tool set.
//!
//! These implement the tool contract with simulated effects: each returns
//! a structured payload describing what it would do. Deployments swap in
//! effectful implementations behind the same definitions; the governance
//! layers above (planning, simulation, gating, rollback) are unchanged.
//!
//! Input schemas are derived from the typed parameter structs, so the
//! schema a plan was validated against is exactly the shape the tool
//! deserializes.

use crate::definition::{Tool, ToolDefinition, ToolOutcome};
use crate::ToolError;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use warden_policy::RiskLevel;

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct PathParams {
    #[schemars(length(min = 1))]
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct CreateFileParams {
    #[schemars(length(min = 1))]
    path: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct WriteFileParams {
    #[schemars(length(min = 1))]
    path: String,
    content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct OpenUrlParams {
    #[schemars(regex(pattern = r"^https?://"))]
    url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct LaunchAppParams {
    #[schemars(length(min = 1))]
    app_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct InstallParams {
    #[schemars(length(min = 1))]
    package: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct ChangeConfigParams {
    #[schemars(length(min = 1))]
    setting: String,
    value: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct SearchParams {
    #[schemars(length(min = 1))]
    query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct RunCommandParams {
    #[schemars(length(min = 1))]
    command: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct NoParams {}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

fn status_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["status"],
        "properties": {"status": {"type": "string"}}
    })
}

struct SimulatedTool {
    definition: ToolDefinition,
    outcome: fn(&Value) -> Value,
}

#[async_trait]
impl Tool for SimulatedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::ok((self.outcome)(input)))
    }
}

#[allow(clippy::too_many_arguments)]
fn tool(
    name: &str,
    description: &str,
    action_type: &str,
    risk: RiskLevel,
    reversible: bool,
    requires_confirmation: bool,
    enabled: bool,
    input_schema: Value,
    output_schema: Value,
    outcome: fn(&Value) -> Value,
) -> Arc<dyn Tool> {
    Arc::new(SimulatedTool {
        definition: ToolDefinition {
            name: name.into(),
            description: description.into(),
            version: "1.0.0".into(),
            action_type: action_type.into(),
            risk_category: risk,
            reversible,
            input_schema,
            output_schema,
            requires_confirmation,
            max_execution_seconds: 10,
            enabled,
        },
        outcome,
    })
}

/// The default tool set registered at boot.
#[must_use]
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        tool(
            "read_file",
            "Read contents of a file",
            "file",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<PathParams>(),
            json!({
                "type": "object",
                "required": ["status", "path", "content"],
                "properties": {
                    "status": {"type": "string"},
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                }
            }),
            |input| {
                json!({
                    "status": "ok",
                    "path": input["path"],
                    "content": ""
                })
            },
        ),
        tool(
            "create_file",
            "Create a new file",
            "file",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<CreateFileParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "created",
                    "path": input["path"]
                })
            },
        ),
        tool(
            "write_file",
            "Write contents to a file",
            "file",
            RiskLevel::Medium,
            true,
            true,
            true,
            schema_of::<WriteFileParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "written",
                    "path": input["path"],
                    "bytes": input["content"].as_str().map(str::len).unwrap_or(0)
                })
            },
        ),
        tool(
            "delete_file",
            "Delete a file",
            "file",
            RiskLevel::High,
            false,
            true,
            true,
            schema_of::<PathParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "deleted",
                    "path": input["path"]
                })
            },
        ),
        tool(
            "open_url",
            "Open a URL in the default browser",
            "network",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<OpenUrlParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "opened",
                    "url": input["url"]
                })
            },
        ),
        tool(
            "launch_app",
            "Launch an application",
            "application",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<LaunchAppParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "launched",
                    "app_name": input["app_name"]
                })
            },
        ),
        tool(
            "install_software",
            "Install a software package",
            "system",
            RiskLevel::Medium,
            false,
            true,
            true,
            schema_of::<InstallParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "installed",
                    "package": input["package"]
                })
            },
        ),
        tool(
            "change_config",
            "Change a configuration setting",
            "config",
            RiskLevel::Medium,
            true,
            true,
            true,
            schema_of::<ChangeConfigParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "changed",
                    "setting": input["setting"],
                    "value": input["value"]
                })
            },
        ),
        tool(
            "get_system_info",
            "Get system information",
            "system",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<NoParams>(),
            status_output_schema(),
            |_| {
                json!({
                    "status": "ok",
                    "os": std::env::consts::OS
                })
            },
        ),
        tool(
            "search_web",
            "Search the web",
            "network",
            RiskLevel::Low,
            true,
            false,
            true,
            schema_of::<SearchParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "searched",
                    "query": input["query"]
                })
            },
        ),
        // Disabled by default; enabling requires an explicit operator decision.
        tool(
            "run_command",
            "Execute a system command",
            "system",
            RiskLevel::High,
            false,
            true,
            false,
            schema_of::<RunCommandParams>(),
            status_output_schema(),
            |input| {
                json!({
                    "status": "executed",
                    "command": input["command"]
                })
            },
        ),
    ]
}
