//! Intent-to-plan mapping.
//!
//! The planner owns the only path from a classified intent to a frozen
//! plan. Tool identities are pinned from the registry at this point, so
//! any later replacement of a tool is detectable as drift.

use crate::schema::{FrozenPlan, PlanBuilder, PlanStep};
use crate::PlanError;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use warden_policy::RiskLevel;
use warden_tools::ToolRegistry;

/// Outcome of asking the planner for a plan.
#[derive(Debug)]
pub enum PlanDecision {
    /// A frozen plan ready for simulation and execution.
    Plan(FrozenPlan),
    /// The intent is a goal the orchestrator must expand instead.
    Orchestrate,
}

/// Maps classified commands to frozen plans. Planning only, no execution.
pub struct ExecutionPlanner {
    tools: Arc<ToolRegistry>,
}

impl ExecutionPlanner {
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Build a plan for `intent` with already-extracted entities.
    pub fn create_plan(
        &self,
        intent: &str,
        entities: &Map<String, Value>,
    ) -> Result<PlanDecision, PlanError> {
        if intent == "autonomous_goal" || intent == "complex_goal" {
            tracing::info!(intent, "goal intent detected; deferring to orchestrator");
            return Ok(PlanDecision::Orchestrate);
        }

        let (tool_name, input, risk, description) = match intent {
            "create_file" => {
                let path = string_entity(entities, &["path", "filename"]);
                let description = format!("Create file {path}");
                let mut input = json!({"path": path});
                if let Some(content) = entities.get("content").and_then(Value::as_str) {
                    input["content"] = content.into();
                }
                ("create_file", input, RiskLevel::Medium, description)
            }
            "write_file" => {
                let path = string_entity(entities, &["path", "filename"]);
                let content = string_entity(entities, &["content"]);
                let description = format!("Write to file {path}");
                (
                    "write_file",
                    json!({"path": path, "content": content}),
                    RiskLevel::Medium,
                    description,
                )
            }
            "read_file" => {
                let path = string_entity(entities, &["path", "filepath"]);
                let description = format!("Read file {path}");
                ("read_file", json!({"path": path}), RiskLevel::Low, description)
            }
            "delete_file" => {
                let path = string_entity(entities, &["path", "filepath"]);
                let description = format!("Delete file {path}");
                ("delete_file", json!({"path": path}), RiskLevel::High, description)
            }
            "open_url" => {
                let url = normalize_url(&string_entity(entities, &["url"]));
                let description = format!("Open URL {url}");
                ("open_url", json!({"url": url}), RiskLevel::Low, description)
            }
            "launch_app" => {
                let app = string_entity(entities, &["app_name", "name"]);
                let description = format!("Launch application {app}");
                (
                    "launch_app",
                    json!({"app_name": app}),
                    RiskLevel::Low,
                    description,
                )
            }
            "install_software" => {
                let package = string_entity(entities, &["package"]);
                let description = format!("Install software: {package}");
                (
                    "install_software",
                    json!({"package": package}),
                    RiskLevel::Medium,
                    description,
                )
            }
            "change_config" => {
                let setting = string_entity(entities, &["setting"]);
                let value = string_entity(entities, &["value"]);
                let description = format!("Change configuration: {setting} to {value}");
                (
                    "change_config",
                    json!({"setting": setting, "value": value}),
                    RiskLevel::Medium,
                    description,
                )
            }
            "search_web" => {
                let query = string_entity(entities, &["query"]);
                let description = format!("Search the web for {query}");
                (
                    "search_web",
                    json!({"query": query}),
                    RiskLevel::Low,
                    description,
                )
            }
            "get_system_info" | "get_status" => (
                "get_system_info",
                json!({}),
                RiskLevel::Low,
                "Get system information".to_string(),
            ),
            "run_command" => {
                let command = string_entity(entities, &["command"]);
                let description = format!("Execute command: {command}");
                (
                    "run_command",
                    json!({"command": command}),
                    RiskLevel::High,
                    description,
                )
            }
            other => {
                tracing::warn!(intent = other, "no plan mapping for intent");
                return Err(PlanError::UnmappedIntent(other.to_string()));
            }
        };

        // Pin the tool identity now; drift between here and execution aborts.
        let identity = self
            .tools
            .get_tool_identity(tool_name)
            .ok_or_else(|| PlanError::UnknownTool(tool_name.to_string()))?;
        self.tools.validate_input(tool_name, &input)?;

        let step = PlanStep::new(tool_name, input, risk)
            .with_identity(identity.version, identity.sha256)
            .describe(description);
        let plan = PlanBuilder::new().add_step(step).freeze();
        Ok(PlanDecision::Plan(plan))
    }
}

fn string_entity(entities: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(value) = entities.get(*key).and_then(Value::as_str) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    String::new()
}

/// Ensure URLs carry a protocol; bare hosts become https.
fn normalize_url(url: &str) -> String {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn planner() -> ExecutionPlanner {
        ExecutionPlanner::new(Arc::new(ToolRegistry::with_builtins().unwrap()))
    }

    fn entities(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn open_url_plan_is_single_low_risk_step() {
        let decision = planner()
            .create_plan("open_url", &entities(&[("url", "https://google.com")]))
            .unwrap();
        let PlanDecision::Plan(plan) = decision else {
            panic!("expected a plan");
        };
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.risk_level(), RiskLevel::Low);
        assert!(!plan.requires_confirmation());
        assert!(plan.validate_integrity());
    }

    #[test]
    fn bare_host_urls_gain_https() {
        assert_eq!(normalize_url("www.google.com"), "https://www.google.com");
        assert_eq!(normalize_url("http://a.com"), "http://a.com");
    }

    #[test]
    fn delete_file_plan_requires_confirmation() {
        let decision = planner()
            .create_plan("delete_file", &entities(&[("path", "notes.txt")]))
            .unwrap();
        let PlanDecision::Plan(plan) = decision else {
            panic!("expected a plan");
        };
        assert_eq!(plan.risk_level(), RiskLevel::High);
        assert!(plan.requires_confirmation());
    }

    #[test]
    fn steps_carry_pinned_tool_identity() {
        let tools = Arc::new(ToolRegistry::with_builtins().unwrap());
        let planner = ExecutionPlanner::new(Arc::clone(&tools));
        let PlanDecision::Plan(plan) = planner
            .create_plan("create_file", &entities(&[("path", "a.txt")]))
            .unwrap()
        else {
            panic!("expected a plan");
        };
        let pinned = &plan.steps()[0];
        let runtime = tools.get_tool_identity("create_file").unwrap();
        assert_eq!(pinned.tool_sha256, runtime.sha256);
        assert_eq!(pinned.tool_version, runtime.version);
    }

    #[test]
    fn goal_intents_defer_to_orchestrator() {
        let decision = planner()
            .create_plan("complex_goal", &Map::new())
            .unwrap();
        assert!(matches!(decision, PlanDecision::Orchestrate));
    }

    #[test]
    fn unknown_intent_is_unmapped() {
        let err = planner().create_plan("summon", &Map::new()).unwrap_err();
        assert!(matches!(err, PlanError::UnmappedIntent(_)));
    }

    #[test]
    fn invalid_input_is_rejected_at_planning_time() {
        // Empty path violates the create_file schema (minLength 1).
        let err = planner().create_plan("create_file", &Map::new()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }
}
