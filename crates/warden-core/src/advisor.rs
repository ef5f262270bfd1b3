//! External language-model advisor contract.
//!
//! The advisor only ever recommends an intent; parameters are always
//! re-extracted locally. Its output is parsed into a tagged verdict;
//! malformed shapes never propagate, they become "unknown" and bump a
//! watchdog counter.

use async_trait::async_trait;
use serde_json::Value;
use warden_context::InteractionTurn;
use warden_intent::Command;

/// Everything the advisor sees for one consultation.
pub struct AdvisorRequest<'a> {
    pub text: &'a str,
    /// Current best classification, if any stage produced one.
    pub best_guess: Option<&'a Command>,
    pub language: &'a str,
    /// Depth label; deeper levels receive explicit step-by-step
    /// system instructions.
    pub reasoning_level: &'a str,
    pub history: &'a [InteractionTurn],
}

/// Well-formed advisory response.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorReport {
    pub intent: String,
    pub confidence: f64,
    pub needs_confirmation: bool,
    pub reasoning: String,
}

/// Parsed advisor output.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorVerdict {
    Report(AdvisorReport),
    Malformed,
}

impl AdvisorVerdict {
    /// Parse a raw advisor payload. Anything that fails the shape check
    /// is `Malformed`.
    #[must_use]
    pub fn parse(raw: &Value) -> Self {
        let Some(object) = raw.as_object() else {
            return AdvisorVerdict::Malformed;
        };
        let Some(intent) = object.get("intent").and_then(Value::as_str) else {
            return AdvisorVerdict::Malformed;
        };
        let Some(confidence) = object.get("confidence").and_then(Value::as_f64) else {
            return AdvisorVerdict::Malformed;
        };
        if !(0.0..=1.0).contains(&confidence) || intent.trim().is_empty() {
            return AdvisorVerdict::Malformed;
        }
        let needs_confirmation = object
            .get("needs_confirmation")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        AdvisorVerdict::Report(AdvisorReport {
            intent: intent.trim().to_string(),
            confidence,
            needs_confirmation,
            reasoning,
        })
    }
}

/// Contract for the remote advisory model.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Analyze an utterance. The raw payload is shape-checked by the
    /// caller via [`AdvisorVerdict::parse`].
    async fn analyze(&self, request: AdvisorRequest<'_>) -> Value;

    /// Summarize text for context compression. Advisors without a
    /// summarizer return `None` and the rule-based extractor runs.
    async fn generate_summary(&self, _text: &str) -> Option<String> {
        None
    }

    /// Propose a strict-JSON multi-step plan for a goal. Used only by
    /// the orchestrator at DEEP depth.
    async fn propose_plan(&self, _goal: &str) -> Option<Value> {
        None
    }
}

/// Advisor that knows nothing; every consultation returns unknown.
#[derive(Debug, Default)]
pub struct NullAdvisor;

#[async_trait]
impl Advisor for NullAdvisor {
    async fn analyze(&self, _request: AdvisorRequest<'_>) -> Value {
        serde_json::json!({
            "intent": "unknown",
            "confidence": 0.0,
            "needs_confirmation": false,
            "reasoning": "no advisor configured",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wellformed_payload_parses() {
        let verdict = AdvisorVerdict::parse(&json!({
            "intent": "create_file",
            "confidence": 0.8,
            "needs_confirmation": true,
            "reasoning": "user asked for a file",
        }));
        let AdvisorVerdict::Report(report) = verdict else {
            panic!("expected report");
        };
        assert_eq!(report.intent, "create_file");
        assert!(report.needs_confirmation);
    }

    #[test]
    fn missing_intent_is_malformed() {
        assert_eq!(
            AdvisorVerdict::parse(&json!({"confidence": 0.8})),
            AdvisorVerdict::Malformed
        );
    }

    #[test]
    fn out_of_range_confidence_is_malformed() {
        assert_eq!(
            AdvisorVerdict::parse(&json!({"intent": "x", "confidence": 1.5})),
            AdvisorVerdict::Malformed
        );
    }

    #[test]
    fn non_object_is_malformed() {
        assert_eq!(
            AdvisorVerdict::parse(&json!("just a string")),
            AdvisorVerdict::Malformed
        );
        assert_eq!(AdvisorVerdict::parse(&json!(null)), AdvisorVerdict::Malformed);
    }

    #[test]
    fn optional_fields_default() {
        let verdict = AdvisorVerdict::parse(&json!({"intent": "open_url", "confidence": 0.7}));
        let AdvisorVerdict::Report(report) = verdict else {
            panic!("expected report");
        };
        assert!(!report.needs_confirmation);
        assert_eq!(report.reasoning, "");
    }
}
