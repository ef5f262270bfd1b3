//! Configuration.
//!
//! All knobs live in one serde-deserialized structure with defaults, so
//! a missing or partial TOML file always yields a runnable system.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub lazy_load: bool,
    pub confidence_threshold: f64,
    pub mid_confidence_threshold: f64,
    pub unload_after_seconds: u64,
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".into(),
            lazy_load: true,
            confidence_threshold: 0.75,
            mid_confidence_threshold: 0.5,
            unload_after_seconds: 120,
            device: "cpu".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceMonitorConfig {
    /// Minimum free RAM (GB) to permit an embedding model load.
    pub warn_threshold_gb: f64,
}

impl Default for ResourceMonitorConfig {
    fn default() -> Self {
        Self {
            warn_threshold_gb: 3.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub planning_keywords: Vec<String>,
    /// Ambiguity above this forces DEEP.
    pub deep_ambiguity_threshold: f64,
    /// Ambiguity below this permits SHALLOW.
    pub shallow_ambiguity_threshold: f64,
    /// Turn count at or below which SHALLOW is permitted.
    pub shallow_turn_floor: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            planning_keywords: [
                "organize", "schedule", "plan", "optimize", "arrange", "clean up", "figure out",
                "setup", "configure",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            deep_ambiguity_threshold: 0.5,
            shallow_ambiguity_threshold: 0.2,
            shallow_turn_floor: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub trigger_turns: usize,
    pub preserve_recent: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            trigger_turns: 20,
            preserve_recent: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_steps: usize,
    pub max_intent_repetitions: usize,
    pub global_timeout_seconds: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            max_intent_repetitions: 3,
            global_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Static session trust score.
    pub trust_score: f64,
    pub ledger_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            trust_score: 0.8,
            ledger_path: "data/audit_ledger.jsonl".into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub embedding: EmbeddingConfig,
    pub resource_monitor: ResourceMonitorConfig,
    pub reasoning: ReasoningConfig,
    pub compression: CompressionSettings,
    pub orchestration: OrchestrationConfig,
    pub gateway: GatewayConfig,
}

impl WardenConfig {
    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Ok(toml::from_str(&contents)?)
    }

    #[must_use]
    pub fn contains_planning_keywords(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.reasoning
            .planning_keywords
            .iter()
            .any(|kw| lower.contains(kw))
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_thresholds() {
        let config = WardenConfig::default();
        assert_eq!(config.embedding.confidence_threshold, 0.75);
        assert_eq!(config.embedding.mid_confidence_threshold, 0.5);
        assert_eq!(config.compression.trigger_turns, 20);
        assert_eq!(config.compression.preserve_recent, 6);
        assert_eq!(config.orchestration.max_steps, 6);
        assert_eq!(config.orchestration.max_intent_repetitions, 3);
        assert_eq!(config.orchestration.global_timeout_seconds, 10);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: WardenConfig =
            toml::from_str("[embedding]\nconfidence_threshold = 0.9\n").unwrap();
        assert_eq!(config.embedding.confidence_threshold, 0.9);
        assert_eq!(config.embedding.mid_confidence_threshold, 0.5);
        assert_eq!(config.gateway.trust_score, 0.8);
    }

    #[test]
    fn planning_keyword_detection() {
        let config = WardenConfig::default();
        assert!(config.contains_planning_keywords("please organize my desk"));
        assert!(!config.contains_planning_keywords("open google"));
    }
}
