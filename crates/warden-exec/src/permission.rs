//! Permission tiers and trust gating.
//!
//! Three tiers gate execution by user trust score. LOW auto-executes for
//! trusted users; HIGH always demands confirmation. Trust comes from
//! configuration; the session does not learn.

use serde::{Deserialize, Serialize};
use warden_policy::RiskLevel;

/// Permission tier for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionTier {
    Low,
    Medium,
    High,
}

impl PermissionTier {
    /// Tier implied by a plan's risk level.
    #[must_use]
    pub fn from_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => PermissionTier::Low,
            RiskLevel::Medium => PermissionTier::Medium,
            RiskLevel::High | RiskLevel::Critical => PermissionTier::High,
        }
    }

    /// Minimum trust score required to act in this tier.
    #[must_use]
    pub fn trust_requirement(self) -> f64 {
        match self {
            PermissionTier::Low => 0.3,
            PermissionTier::Medium => 0.5,
            PermissionTier::High => 0.7,
        }
    }

    /// Only LOW-tier actions may run without a confirmation path.
    #[must_use]
    pub fn auto_executes(self) -> bool {
        matches!(self, PermissionTier::Low)
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResult {
    pub allowed: bool,
    pub reason: String,
    pub requires_confirmation: bool,
    pub tier: PermissionTier,
}

/// Enforces permission tiers against the session's trust score.
#[derive(Debug, Clone)]
pub struct PermissionChecker {
    trust_score: f64,
}

impl PermissionChecker {
    #[must_use]
    pub fn new(trust_score: f64) -> Self {
        Self {
            trust_score: trust_score.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }

    /// Check whether an action at `risk` may proceed.
    #[must_use]
    pub fn check(&self, risk: RiskLevel) -> PermissionResult {
        let tier = PermissionTier::from_risk(risk);
        let required = tier.trust_requirement();

        if self.trust_score < required {
            return PermissionResult {
                allowed: false,
                reason: format!(
                    "Insufficient trust ({:.2} < {required:.2})",
                    self.trust_score
                ),
                requires_confirmation: true,
                tier,
            };
        }

        // HIGH always confirms; MEDIUM confirms below comfortable trust.
        let requires_confirmation = match tier {
            PermissionTier::High => true,
            PermissionTier::Medium => self.trust_score < 0.6,
            PermissionTier::Low => false,
        };

        PermissionResult {
            allowed: true,
            reason: "Permission granted".to_string(),
            requires_confirmation,
            tier,
        }
    }
}
