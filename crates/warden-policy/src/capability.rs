//! Capability registry: declarative grouping of intents.
//!
//! A capability names a set of intents and the maximum risk the system
//! will accept for them. Each intent belongs to at most one capability;
//! registering it twice is a boot-time error, not a runtime warning.

use crate::error::PolicyError;
use crate::risk::RiskLevel;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct Capability {
    allowed_intents: BTreeSet<String>,
    max_risk: RiskLevel,
}

#[derive(Default)]
struct CapabilityState {
    capabilities: BTreeMap<String, Capability>,
    intent_to_capability: BTreeMap<String, String>,
    locked: bool,
}

/// Registry of system capabilities with single-ownership of intents.
#[derive(Default)]
pub struct CapabilityRegistry {
    state: RwLock<CapabilityState>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the baseline capabilities and locked.
    pub fn with_defaults() -> Result<Self, PolicyError> {
        let registry = Self::new();
        registry.register_capability(
            "FileSystemCapability",
            &[
                "create_file",
                "delete_file",
                "write_file",
                "read_file",
                "list_directory",
                "move_file",
                "copy_file",
            ],
            RiskLevel::High,
        )?;
        registry.register_capability(
            "ConversationCapability",
            &["chat", "clarify", "conversation", "unknown"],
            RiskLevel::Low,
        )?;
        registry.register_capability(
            "SystemCapability",
            &["get_status", "get_system_info", "help", "autonomous_goal", "complex_goal"],
            RiskLevel::Critical,
        )?;
        registry.register_capability(
            "CodeExecutionCapability",
            &["run_command", "run_script", "install_software", "change_config"],
            RiskLevel::High,
        )?;
        registry.register_capability(
            "AppLauncherCapability",
            &["launch_app", "open_url", "search_web"],
            RiskLevel::Medium,
        )?;
        registry.lock();
        Ok(registry)
    }

    /// Register a capability. Dual registration of an intent fails.
    pub fn register_capability(
        &self,
        name: &str,
        allowed_intents: &[&str],
        max_risk: RiskLevel,
    ) -> Result<(), PolicyError> {
        let mut state = self.state.write();
        if state.locked {
            return Err(PolicyError::RegistryLocked(name.to_string()));
        }

        for intent in allowed_intents {
            if let Some(existing) = state.intent_to_capability.get(*intent) {
                if existing != name {
                    return Err(PolicyError::DuplicateIntent {
                        intent: (*intent).to_string(),
                        existing: existing.clone(),
                    });
                }
            }
        }

        state.capabilities.insert(
            name.to_string(),
            Capability {
                allowed_intents: allowed_intents.iter().map(|s| (*s).to_string()).collect(),
                max_risk,
            },
        );
        for intent in allowed_intents {
            state
                .intent_to_capability
                .insert((*intent).to_string(), name.to_string());
        }
        tracing::debug!(capability = name, intents = allowed_intents.len(), "registered capability");
        Ok(())
    }

    /// Lock the registry against further modification.
    pub fn lock(&self) {
        self.state.write().locked = true;
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.read().locked
    }

    /// Name of the capability governing this intent, if any.
    #[must_use]
    pub fn capability_for_intent(&self, intent: &str) -> Option<String> {
        self.state.read().intent_to_capability.get(intent).cloned()
    }

    #[must_use]
    pub fn is_intent_allowed(&self, intent: &str) -> bool {
        self.state.read().intent_to_capability.contains_key(intent)
    }

    /// Maximum risk permitted for an intent's capability.
    #[must_use]
    pub fn max_risk_for_intent(&self, intent: &str) -> Option<RiskLevel> {
        let state = self.state.read();
        let cap = state.intent_to_capability.get(intent)?;
        state.capabilities.get(cap).map(|c| c.max_risk)
    }

    /// All intents known to any capability.
    #[must_use]
    pub fn known_intents(&self) -> Vec<String> {
        self.state.read().intent_to_capability.keys().cloned().collect()
    }
}
