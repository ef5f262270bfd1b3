use crate::risk::RiskLevel;

/// Errors raised by the governance registries and the policy engine.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Registration attempted after the registry was locked.
    #[error("registry is locked; cannot register '{0}' at runtime")]
    RegistryLocked(String),

    /// A tool was queried that has no safety policy.
    #[error("no safety policy registered for tool '{0}'; refusing to execute un-governed tools")]
    MissingPolicy(String),

    /// An intent was registered to a second capability.
    #[error("intent '{intent}' is already mapped to capability '{existing}'")]
    DuplicateIntent { intent: String, existing: String },

    /// An intent is not registered in any capability.
    #[error("intent '{0}' not registered in any capability")]
    UnregisteredIntent(String),

    /// Command risk exceeds the owning capability's ceiling.
    #[error("risk level {risk} exceeds allowed limit ({max_risk}) for {capability}")]
    RiskExceedsCapability {
        capability: String,
        risk: RiskLevel,
        max_risk: RiskLevel,
    },

    /// A risk-level string failed to parse.
    #[error("unknown risk level '{0}'")]
    UnknownRiskLevel(String),

    /// Canonical serialization of the registry failed.
    #[error("registry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
