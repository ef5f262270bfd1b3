use crate::definition::{Tool, ToolDefinition, ToolIdentity, ToolOutcome};
use crate::ToolError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    schema: JSONSchema,
    identity: ToolIdentity,
}

/// Central registry of dispatchable tools.
///
/// Holds the tool implementations, their compiled input schemas, and
/// their pinned identities. Validation happens here so that every input
/// reaching a tool already satisfies its schema (`validated_input` in
/// plan steps).
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in tool set.
    pub fn with_builtins() -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in crate::builtin::builtin_tools() {
            registry.register_tool(tool)?;
        }
        Ok(registry)
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let definition = tool.definition().clone();
        let schema = JSONSchema::compile(&definition.input_schema)
            .map_err(|_| ToolError::BadSchema(definition.name.clone()))?;
        let identity = definition.identity();
        tracing::debug!(tool = %definition.name, version = %identity.version, "tool registered");
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                tool,
                schema,
                identity,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|r| r.tool.definition().clone())
    }

    /// Current identity of a tool, as re-checked at execution time.
    #[must_use]
    pub fn get_tool_identity(&self, name: &str) -> Option<ToolIdentity> {
        self.tools.get(name).map(|r| r.identity.clone())
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .is_some_and(|r| r.tool.definition().enabled)
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|r| r.tool.definition().clone())
            .collect()
    }

    /// Validate `input` against the tool's schema.
    pub fn validate_input(&self, name: &str, input: &Value) -> Result<(), ToolError> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let result = registered.schema.validate(input);
        if let Err(errors) = result {
            let reason = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ToolError::InvalidInput {
                tool: name.to_string(),
                reason,
            });
        }
        Ok(())
    }

    /// Dispatch a tool with pre-validated input and run its verify hook.
    pub async fn dispatch(&self, name: &str, input: &Value) -> Result<ToolOutcome, ToolError> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let definition = registered.tool.definition();
        if !definition.enabled {
            return Err(ToolError::Disabled(name.to_string()));
        }
        self.validate_input(name, input)?;

        let outcome = registered.tool.execute(input).await?;
        if !registered.tool.verify(name, &outcome) {
            tracing::warn!(tool = name, "tool verification hook rejected the result");
            return Ok(ToolOutcome::failed(format!(
                "verification failed for '{name}'"
            )));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_register_and_expose_identities() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let identity = registry.get_tool_identity("create_file").unwrap();
        assert_eq!(identity.sha256.len(), 64);
        assert!(registry.get_definition("open_url").is_some());
    }

    #[test]
    fn input_validation_rejects_missing_required_fields() {
        let registry = ToolRegistry::with_builtins().unwrap();
        assert!(registry
            .validate_input("create_file", &json!({"path": "notes.txt"}))
            .is_ok());
        let err = registry
            .validate_input("create_file", &json!({}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn dispatch_refuses_disabled_tools() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let err = registry
            .dispatch("run_command", &json!({"command": "ls"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Disabled(_)));
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_fails() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let err = registry.dispatch("teleport", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn dispatch_runs_enabled_tool() {
        let registry = ToolRegistry::with_builtins().unwrap();
        let outcome = registry
            .dispatch("open_url", &json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output["url"], "https://example.com");
    }
}
