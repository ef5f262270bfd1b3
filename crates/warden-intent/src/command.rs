use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Which cascade stage produced a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Clarification,
    Refinement,
    Embedding,
    Semantic,
    Regex,
    Advisor,
    Orchestrator,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionSource::Clarification => "clarification",
            DecisionSource::Refinement => "refinement",
            DecisionSource::Embedding => "embedding",
            DecisionSource::Semantic => "semantic",
            DecisionSource::Regex => "regex",
            DecisionSource::Advisor => "advisor",
            DecisionSource::Orchestrator => "orchestrator",
        };
        f.write_str(s)
    }
}

/// A classified user instruction. Immutable downstream of classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub raw_input: String,
    /// Canonical verb identifier, e.g. `create_file`.
    pub intent: String,
    /// Extracted parameter values, keyed by parameter name.
    pub entities: Map<String, Value>,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    pub decision_source: DecisionSource,
    /// Set when emotional tone or policy forces an explicit confirmation.
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl Command {
    #[must_use]
    pub fn new(
        raw_input: impl Into<String>,
        intent: impl Into<String>,
        entities: Map<String, Value>,
        confidence: f64,
        decision_source: DecisionSource,
    ) -> Self {
        Self {
            raw_input: raw_input.into(),
            intent: intent.into(),
            entities,
            confidence: confidence.clamp(0.0, 1.0),
            decision_source,
            requires_confirmation: false,
        }
    }

    /// String-typed entity accessor; empty entities return `None`.
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
