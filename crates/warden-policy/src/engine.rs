//! Policy engine: capability and risk-ceiling validation.

use crate::capability::CapabilityRegistry;
use crate::error::PolicyError;
use crate::risk::RiskLevel;
use std::sync::Arc;

/// Validates classified intents against capability boundaries.
///
/// Two rules:
/// 1. The intent must be registered in some capability.
/// 2. The evaluated risk must not exceed the capability's `max_risk`.
pub struct PolicyEngine {
    registry: Arc<CapabilityRegistry>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Validate that `intent` is allowed and within its risk ceiling.
    pub fn validate(&self, intent: &str, risk_level: RiskLevel) -> Result<(), PolicyError> {
        if !self.registry.is_intent_allowed(intent) {
            tracing::error!(intent, "policy blocked: intent not registered in any capability");
            return Err(PolicyError::UnregisteredIntent(intent.to_string()));
        }

        let capability = self
            .registry
            .capability_for_intent(intent)
            .ok_or_else(|| PolicyError::UnregisteredIntent(intent.to_string()))?;
        let max_risk = self
            .registry
            .max_risk_for_intent(intent)
            .ok_or_else(|| PolicyError::UnregisteredIntent(intent.to_string()))?;

        if risk_level > max_risk {
            tracing::error!(
                intent,
                risk = %risk_level,
                %max_risk,
                %capability,
                "policy blocked: risk exceeds capability ceiling"
            );
            return Err(PolicyError::RiskExceedsCapability {
                capability,
                risk: risk_level,
                max_risk,
            });
        }

        tracing::info!(intent, risk = %risk_level, %capability, "policy validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(Arc::new(CapabilityRegistry::with_defaults().unwrap()))
    }

    #[test]
    fn allows_intent_within_ceiling() {
        assert!(engine().validate("delete_file", RiskLevel::High).is_ok());
    }

    #[test]
    fn rejects_unregistered_intent() {
        let err = engine().validate("format_disk", RiskLevel::Low).unwrap_err();
        assert!(matches!(err, PolicyError::UnregisteredIntent(_)));
    }

    #[test]
    fn rejects_risk_above_ceiling() {
        // open_url belongs to AppLauncherCapability (max MEDIUM).
        let err = engine().validate("open_url", RiskLevel::Critical).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::RiskExceedsCapability { max_risk: RiskLevel::Medium, .. }
        ));
    }

    #[test]
    fn conversation_capability_caps_at_low() {
        let e = engine();
        assert!(e.validate("conversation", RiskLevel::Low).is_ok());
        assert!(e.validate("conversation", RiskLevel::Medium).is_err());
    }
}
