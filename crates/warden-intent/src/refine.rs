//! Refinement of the previous successful intent.
//!
//! Detects correction phrasing ("rename to x", "instead use y", prefixes
//! "no " / "actually ") and clones the prior intent with the targeted
//! parameter mutated. Confidence drops slightly so revised high-risk
//! actions re-enter confirmation.

use crate::command::{Command, DecisionSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const REFINEMENT_PHRASES: &[&str] = &[
    "make it shorter",
    "change name to",
    "rename to",
    "use different",
    "modify that",
    "edit that",
    "update it",
    "instead use",
    "change content to",
    "change contents to",
    "make it",
];

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:name|rename)(?:\s+to)?\s+(\S+)").expect("valid regex"));
static CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:contents?|text)(?:\s+to)?\s+["']?(.+?)["']?$"#).expect("valid regex")
});
static INSTEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"instead use\s+(.+)").expect("valid regex"));

/// Confidence penalty applied to refined intents.
const REFINEMENT_PENALTY: f64 = 0.05;

/// A previously executed intent available for refinement.
#[derive(Debug, Clone)]
pub struct PriorIntent {
    pub intent: String,
    pub parameters: Map<String, Value>,
    pub confidence: f64,
}

/// Rule-based mutation of the previous intent.
#[derive(Debug, Default)]
pub struct RefinementEngine;

impl RefinementEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Attempt to refine `prior` based on `user_input`. Returns `None`
    /// when the input is not a refinement or nothing mutated.
    #[must_use]
    pub fn refine(&self, user_input: &str, prior: &PriorIntent) -> Option<Command> {
        let text = user_input.to_lowercase().trim().to_string();

        let matches_refinement = REFINEMENT_PHRASES.iter().any(|p| text.contains(p))
            || text.starts_with("no ")
            || text.starts_with("actually ");
        if !matches_refinement {
            return None;
        }

        let mut parameters = prior.parameters.clone();
        let mut mutated = false;

        // Rule A: "change name/rename to X".
        if text.contains("name") || text.contains("rename") {
            if let Some(caps) = NAME_RE.captures(&text) {
                let new_value = caps[1].to_string();
                if parameters.contains_key("path") {
                    parameters.insert("path".into(), new_value.into());
                    mutated = true;
                } else if parameters.contains_key("app_name") {
                    parameters.insert("app_name".into(), new_value.into());
                    mutated = true;
                }
            }
        }

        // Rule B: "change content/text to X".
        if !mutated && (text.contains("content") || text.contains("text")) {
            if let Some(caps) = CONTENT_RE.captures(&text) {
                if parameters.contains_key("content") {
                    parameters.insert("content".into(), caps[1].to_string().into());
                    mutated = true;
                }
            }
        }

        // Rule C: "make it shorter" halves the content. The contract is
        // only "produce shorter content"; halving stands in until a
        // summarization primitive exists.
        if !mutated && text.contains("shorter") {
            if let Some(current) = parameters.get("content").and_then(Value::as_str) {
                let half: String = current.chars().take(current.chars().count() / 2).collect();
                parameters.insert("content".into(), half.into());
                mutated = true;
            }
        }

        // Rule D: "instead use X" guesses the parameter from the value shape.
        if !mutated {
            if let Some(caps) = INSTEAD_RE.captures(&text) {
                let value = caps[1].trim().to_string();
                if parameters.contains_key("path") && value.contains('.') {
                    parameters.insert("path".into(), value.into());
                    mutated = true;
                } else if parameters.contains_key("url")
                    && (value.contains("http") || value.contains(".com"))
                {
                    parameters.insert("url".into(), value.into());
                    mutated = true;
                } else if parameters.contains_key("app_name") {
                    parameters.insert("app_name".into(), value.into());
                    mutated = true;
                }
            }
        }

        if !mutated {
            return None;
        }

        let confidence = (prior.confidence - REFINEMENT_PENALTY).max(0.0);
        tracing::info!(intent = %prior.intent, confidence, "refinement applied");
        Some(Command::new(
            user_input,
            prior.intent.clone(),
            parameters,
            confidence,
            DecisionSource::Refinement,
        ))
    }
}
