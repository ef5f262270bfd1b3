use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk classification shared by steps, plans, policies, and capabilities.
///
/// The derived `Ord` gives the governance ordering
/// `LOW < MEDIUM < HIGH < CRITICAL` used by the policy engine and the
/// risk simulator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Escalate by `levels`, saturating at `Critical`.
    #[must_use]
    pub fn escalate(self, levels: u8) -> Self {
        let idx = (self.as_u8() + levels).min(3);
        match idx {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            2 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        }
    }

    /// Canonical uppercase name, as serialized into the ledger and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = crate::error::PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(crate::error::PolicyError::UnknownRiskLevel(
                other.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_governance_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn escalate_saturates_at_critical() {
        assert_eq!(RiskLevel::High.escalate(1), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.escalate(2), RiskLevel::Critical);
        assert_eq!(RiskLevel::Low.escalate(1), RiskLevel::Medium);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("EXTREME".parse::<RiskLevel>().is_err());
    }
}
