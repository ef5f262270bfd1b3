//! Pending-clarification state machine.
//!
//! When a command misses required parameters, the pipeline parks it here
//! and asks one question. The next utterance is treated as the answer:
//! validated, merged into the pending parameters, and released with a
//! capped confidence boost. Three invalid answers abort the pending state.

use crate::command::{Command, DecisionSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Fields whose answers must look like filesystem-safe names.
const PATH_LIKE_FIELDS: &[&str] = &["path", "app_name"];

static INVALID_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));

const MAX_ATTEMPTS: u32 = 3;

/// Confidence gained by a resolved clarification, capped at 0.90.
fn boosted_confidence(current: f64) -> f64 {
    (current + 0.25).min(0.90)
}

#[derive(Debug, Clone)]
struct PendingIntent {
    intent: String,
    parameters: Map<String, Value>,
    confidence: f64,
    raw_input: String,
}

/// Outcome of feeding a user answer to the pending clarification.
#[derive(Debug)]
pub enum ClarificationOutcome {
    /// Answer accepted; a complete command is released.
    Resolved(Command),
    /// Answer invalid; the question stands and attempts remain.
    Retry { question: String, attempt: u32 },
    /// Three invalid answers; pending state dropped.
    Aborted,
}

/// Manages the state of one outstanding clarification.
#[derive(Debug, Default)]
pub struct ClarificationManager {
    pending: Option<PendingIntent>,
    missing_fields: Vec<String>,
    attempt_count: u32,
    last_question: String,
}

impl ClarificationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn missing_fields(&self) -> &[String] {
        &self.missing_fields
    }

    #[must_use]
    pub fn last_question(&self) -> &str {
        &self.last_question
    }

    /// Park an ambiguous intent and remember the question asked.
    pub fn create_clarification(
        &mut self,
        raw_input: &str,
        intent: &str,
        parameters: Map<String, Value>,
        confidence: f64,
        missing_fields: Vec<String>,
        question: &str,
    ) {
        tracing::info!(intent, question, "clarification requested");
        self.pending = Some(PendingIntent {
            intent: intent.to_string(),
            parameters,
            confidence,
            raw_input: raw_input.to_string(),
        });
        self.missing_fields = missing_fields;
        self.attempt_count = 0;
        self.last_question = question.to_string();
    }

    /// Treat `answer` as the response to the outstanding question.
    ///
    /// Returns `None` when nothing is pending.
    pub fn resolve(&mut self, answer: &str) -> Option<ClarificationOutcome> {
        let pending = self.pending.as_ref()?;
        self.attempt_count += 1;
        let text = answer.trim();

        if !self.answer_is_valid(text) {
            if self.attempt_count >= MAX_ATTEMPTS {
                tracing::warn!("clarification aborted after {MAX_ATTEMPTS} invalid answers");
                self.clear();
                return Some(ClarificationOutcome::Aborted);
            }
            return Some(ClarificationOutcome::Retry {
                question: self.last_question.clone(),
                attempt: self.attempt_count,
            });
        }

        let mut parameters = pending.parameters.clone();
        // Merge the answer into the first missing field; remaining gaps
        // re-enter feasibility validation downstream.
        if let Some(field) = self.missing_fields.first() {
            parameters.insert(field.clone(), Value::from(text));
        }

        let command = Command::new(
            pending.raw_input.clone(),
            pending.intent.clone(),
            parameters,
            boosted_confidence(pending.confidence),
            DecisionSource::Clarification,
        );
        tracing::info!(intent = %command.intent, confidence = command.confidence, "clarification resolved");
        self.clear();
        Some(ClarificationOutcome::Resolved(command))
    }

    fn answer_is_valid(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let path_like = self
            .missing_fields
            .iter()
            .any(|f| PATH_LIKE_FIELDS.contains(&f.as_str()));
        if path_like {
            if text.len() < 2 {
                return false;
            }
            if INVALID_FILENAME_CHARS.is_match(text) {
                return false;
            }
        }
        true
    }

    /// Reset the clarification state.
    pub fn clear(&mut self) {
        self.pending = None;
        self.missing_fields.clear();
        self.attempt_count = 0;
        self.last_question.clear();
    }
}
