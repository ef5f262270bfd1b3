//! Per-tool safety contracts and the boot-locked policy registry.
//!
//! Every tool that can be dispatched must have a [`SafetyPolicy`] declaring
//! its reversibility, destructiveness, sandbox requirement, and handler
//! identifiers. The registry is locked once during boot; the lock computes
//! a SHA-256 over a canonical serialization so later audits can prove the
//! policy set was not altered mid-session.

use crate::error::PolicyError;
use crate::risk::RiskLevel;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Confirmation threshold attached to a tool.
pub type ConfirmationLevel = RiskLevel;

/// Structured safety metadata for a single tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub tool_name: String,
    pub reversible: bool,
    pub destructive: bool,
    pub requires_sandbox: bool,
    pub confirmation_required_level: ConfirmationLevel,
    /// Identifier of a registered undo handler, if reversible.
    pub rollback_strategy: Option<String>,
    /// Identifier of a registered pre-state capture handler.
    pub pre_state_capture: Option<String>,
    /// Declared mutually-exclusive resources.
    pub resource_locks: Vec<String>,
    pub cpu_cost: u8,
    pub memory_cost: u8,
    pub network_cost: u8,
    /// Impact multiplier for compound risk calculations.
    pub risk_weight: u8,
}

impl SafetyPolicy {
    /// A read-only, reversible, no-cost policy baseline.
    #[must_use]
    pub fn benign(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            reversible: true,
            destructive: false,
            requires_sandbox: false,
            confirmation_required_level: RiskLevel::Low,
            rollback_strategy: None,
            pre_state_capture: None,
            resource_locks: Vec::new(),
            cpu_cost: 1,
            memory_cost: 1,
            network_cost: 0,
            risk_weight: 1,
        }
    }

    #[must_use]
    pub fn destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }

    #[must_use]
    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    #[must_use]
    pub fn sandboxed(mut self, requires_sandbox: bool) -> Self {
        self.requires_sandbox = requires_sandbox;
        self
    }

    #[must_use]
    pub fn confirmation_level(mut self, level: ConfirmationLevel) -> Self {
        self.confirmation_required_level = level;
        self
    }

    #[must_use]
    pub fn rollback(mut self, strategy: &str, pre_state_capture: Option<&str>) -> Self {
        self.rollback_strategy = Some(strategy.to_string());
        self.pre_state_capture = pre_state_capture.map(str::to_string);
        self
    }

    #[must_use]
    pub fn locks(mut self, locks: &[&str]) -> Self {
        self.resource_locks = locks.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn costs(mut self, cpu: u8, memory: u8, network: u8, risk_weight: u8) -> Self {
        self.cpu_cost = cpu;
        self.memory_cost = memory;
        self.network_cost = network;
        self.risk_weight = risk_weight;
        self
    }
}

/// Canonical subset of a policy that participates in the registry hash.
#[derive(Serialize)]
struct HashedPolicy<'a> {
    reversible: bool,
    destructive: bool,
    confirmation_required_level: &'a str,
    requires_sandbox: bool,
    rollback_strategy: &'a Option<String>,
    pre_state_capture: &'a Option<String>,
}

#[derive(Default)]
struct RegistryState {
    policies: BTreeMap<String, SafetyPolicy>,
    hash: Option<String>,
    locked: bool,
}

/// Boot-locked mapping from tool name to safety contract.
///
/// No tool may execute without a policy. After [`lock_registry`]
/// runs, registration fails and the registry hash is fixed.
///
/// [`lock_registry`]: SafetyPolicyRegistry::lock_registry
#[derive(Default)]
pub struct SafetyPolicyRegistry {
    state: RwLock<RegistryState>,
}

impl SafetyPolicyRegistry {
    /// Empty, unlocked registry. Callers register policies, then lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in tool policies and locked.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for policy in default_policies() {
            // The registry is not yet locked, so registration cannot fail.
            let _ = registry.register_policy(policy);
        }
        registry.lock_registry();
        registry
    }

    /// Register a policy. Fails once the registry is locked.
    pub fn register_policy(&self, policy: SafetyPolicy) -> Result<(), PolicyError> {
        let mut state = self.state.write();
        if state.locked {
            tracing::error!(
                tool = %policy.tool_name,
                "attempted policy registration after registry lock; rejected"
            );
            return Err(PolicyError::RegistryLocked(policy.tool_name));
        }
        tracing::debug!(tool = %policy.tool_name, "registered safety policy");
        state.policies.insert(policy.tool_name.clone(), policy);
        Ok(())
    }

    /// Compute the registry SHA-256 and lock. Idempotent.
    pub fn lock_registry(&self) {
        let mut state = self.state.write();
        if state.locked {
            return;
        }
        let canonical: BTreeMap<&str, HashedPolicy<'_>> = state
            .policies
            .iter()
            .map(|(name, p)| {
                (
                    name.as_str(),
                    HashedPolicy {
                        reversible: p.reversible,
                        destructive: p.destructive,
                        confirmation_required_level: p.confirmation_required_level.as_str(),
                        requires_sandbox: p.requires_sandbox,
                        rollback_strategy: &p.rollback_strategy,
                        pre_state_capture: &p.pre_state_capture,
                    },
                )
            })
            .collect();
        // BTreeMap keys serialize sorted, so the JSON is canonical.
        let serialized =
            serde_json::to_string(&canonical).expect("policy serialization is infallible");
        let digest = Sha256::digest(serialized.as_bytes());
        let hash = hex::encode(digest);
        tracing::info!(
            policies = state.policies.len(),
            sha256 = %hash,
            "safety policy registry locked"
        );
        state.hash = Some(hash);
        state.locked = true;
    }

    /// Retrieve a tool's policy. Missing policy means the system refuses
    /// to execute the tool.
    pub fn get_policy(&self, tool_name: &str) -> Result<SafetyPolicy, PolicyError> {
        let state = self.state.read();
        state.policies.get(tool_name).cloned().ok_or_else(|| {
            tracing::error!(tool = tool_name, "tool has no safety policy; execution refused");
            PolicyError::MissingPolicy(tool_name.to_string())
        })
    }

    #[must_use]
    pub fn has_policy(&self, tool_name: &str) -> bool {
        self.state.read().policies.contains_key(tool_name)
    }

    /// SHA-256 of the locked registry, if locked.
    #[must_use]
    pub fn get_registry_hash(&self) -> Option<String> {
        self.state.read().hash.clone()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.read().locked
    }

    #[must_use]
    pub fn list_policies(&self) -> Vec<SafetyPolicy> {
        self.state.read().policies.values().cloned().collect()
    }
}

/// Built-in policies for the core tool set.
fn default_policies() -> Vec<SafetyPolicy> {
    vec![
        SafetyPolicy::benign("read_file"),
        SafetyPolicy::benign("write_file")
            .destructive(true)
            .sandboxed(true)
            .confirmation_level(RiskLevel::Medium)
            .rollback("restore_backup", Some("capture_file_content")),
        SafetyPolicy::benign("delete_file")
            .reversible(false)
            .destructive(true)
            .confirmation_level(RiskLevel::High)
            .locks(&["file_system", "system_state"])
            .costs(5, 5, 0, 10),
        SafetyPolicy::benign("run_command")
            .reversible(false)
            .destructive(true)
            .sandboxed(true)
            .confirmation_level(RiskLevel::Critical)
            .locks(&["shell", "system_processes"])
            .costs(50, 30, 10, 20),
        SafetyPolicy::benign("get_system_info")
            .locks(&["system_info"])
            .costs(2, 5, 0, 1),
        SafetyPolicy::benign("open_url")
            .locks(&["network"])
            .costs(10, 50, 80, 5),
        SafetyPolicy::benign("launch_app")
            .confirmation_level(RiskLevel::Medium)
            .locks(&["application_state", "system_info"])
            .costs(30, 60, 0, 10),
        SafetyPolicy::benign("install_software")
            .reversible(false)
            .confirmation_level(RiskLevel::High)
            .locks(&["system_processes", "disk"])
            .costs(40, 50, 100, 15),
        SafetyPolicy::benign("change_config")
            .destructive(true)
            .confirmation_level(RiskLevel::Medium)
            .rollback("restore_config", Some("capture_config_value")),
        SafetyPolicy::benign("search_web"),
        SafetyPolicy::benign("create_file")
            .confirmation_level(RiskLevel::Medium)
            .rollback("delete_created_file", None)
            .locks(&["file_system"])
            .costs(5, 10, 0, 1),
        SafetyPolicy::benign("conversation"),
        SafetyPolicy::benign("autonomous_goal")
            .reversible(false)
            .destructive(true)
            .sandboxed(true)
            .confirmation_level(RiskLevel::High),
    ]
}
