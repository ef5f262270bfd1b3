//! Contextual memory compression.
//!
//! When the history grows past the trigger, older turns are folded into a
//! single summary turn. Recent turns and safety-tagged turns survive
//! verbatim: a HIGH risk record or a confirmation must never be
//! summarized away.

use crate::memory::InteractionTurn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

/// Compression thresholds.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Turn count above which compression runs.
    pub trigger_turns: usize,
    /// Most recent turns always preserved.
    pub preserve_recent: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            trigger_turns: 20,
            preserve_recent: 6,
        }
    }
}

static FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_\-.]+\.[a-z]{2,4}\b").expect("valid regex"));

fn is_safety_tagged(turn: &InteractionTurn) -> bool {
    turn.metadata.get("risk_level").and_then(Value::as_str) == Some("HIGH")
        || turn.metadata.get("confirmation_required").and_then(Value::as_bool) == Some(true)
        || turn.metadata.get("safety_violation").and_then(Value::as_bool) == Some(true)
        || turn.metadata.get("execution_log").and_then(Value::as_bool) == Some(true)
}

/// Compresses long histories while preserving semantic continuity.
#[derive(Debug, Default)]
pub struct ContextCompressor {
    config: CompressionConfig,
}

impl ContextCompressor {
    #[must_use]
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn should_compress(&self, turn_count: usize) -> bool {
        turn_count > self.config.trigger_turns
    }

    /// Compress older turns, preserving safety records and the most
    /// recent segment. `summarize` is the advisor-provided summarizer;
    /// `None` (or a failed call upstream) falls back to rule extraction.
    #[must_use]
    pub fn compress(
        &self,
        history: Vec<InteractionTurn>,
        summary_from_advisor: Option<String>,
    ) -> Vec<InteractionTurn> {
        if history.len() <= self.config.preserve_recent {
            return history;
        }

        let split = history.len() - self.config.preserve_recent;
        let (older, recent) = history.split_at(split);

        let mut safety_records = Vec::new();
        let mut to_compress = Vec::new();
        for turn in older {
            if is_safety_tagged(turn) {
                safety_records.push(turn.clone());
            } else {
                to_compress.push(turn.clone());
            }
        }

        if to_compress.is_empty() {
            return history;
        }

        let summary = summary_from_advisor.unwrap_or_else(|| rule_summarize(&to_compress));
        tracing::info!(
            compressed = to_compress.len(),
            preserved_safety = safety_records.len(),
            "history compressed"
        );

        let mut out = Vec::with_capacity(1 + safety_records.len() + recent.len());
        out.push(
            InteractionTurn::new("system", format!("[COMPRESSED HISTORY SUMMARY]\n{summary}"))
                .with_meta("is_compressed_summary", Value::Bool(true)),
        );
        out.extend(safety_records);
        out.extend(recent.iter().cloned());
        out
    }
}

/// Lightweight rule-based summarization: unique intents, filenames, and
/// completed actions.
fn rule_summarize(entries: &[InteractionTurn]) -> String {
    let mut intents: BTreeSet<String> = BTreeSet::new();
    let mut files: BTreeSet<String> = BTreeSet::new();
    let mut actions: BTreeSet<String> = BTreeSet::new();

    for entry in entries {
        if let Some(intent) = entry.metadata.get("intent").and_then(Value::as_str) {
            intents.insert(intent.to_string());
        }
        for found in FILE_RE.find_iter(&entry.content) {
            files.insert(found.as_str().to_string());
        }
        if entry.metadata.get("success").and_then(Value::as_bool) == Some(true) {
            let intent = entry
                .metadata
                .get("intent")
                .and_then(Value::as_str)
                .unwrap_or("task");
            actions.insert(format!("Completed {intent}"));
        }
    }

    let mut parts = Vec::new();
    if !intents.is_empty() {
        parts.push(format!(
            "Intents: {}",
            intents.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    if !files.is_empty() {
        parts.push(format!(
            "Files: {}",
            files.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    if !actions.is_empty() {
        parts.push(format!(
            "Recent Actions: {}",
            actions.into_iter().collect::<Vec<_>>().join(" | ")
        ));
    }

    if parts.is_empty() {
        "Multiple earlier turns compressed. No specific goals or files identified.".to_string()
    } else {
        parts.join("\n")
    }
}
