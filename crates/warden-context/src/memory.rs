//! Structured short-term memory. No pronouns, only explicit "last X"
//! references. Populated only on verified execution success; cleared on
//! reset.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use warden_intent::Command;

/// One turn of the interaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionTurn {
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    /// Safety markers and free-form metadata.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl InteractionTurn {
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

static FILE_PHRASES: &[&str] = &["last file", "previous file", "the file"];
static APP_PHRASES: &[&str] = &["last app", "previous app", "the app"];

static PHRASE_RES: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    let mut patterns = Vec::new();
    for phrase in FILE_PHRASES {
        patterns.push((
            Regex::new(&format!("(?i){}", regex::escape(phrase))).expect("valid regex"),
            true,
        ));
    }
    for phrase in APP_PHRASES {
        patterns.push((
            Regex::new(&format!("(?i){}", regex::escape(phrase))).expect("valid regex"),
            false,
        ));
    }
    patterns
});

/// Number of consecutive detections that promote a preferred language.
const LANGUAGE_PROMOTION_THRESHOLD: u32 = 5;

/// Volatile session state. Owned by one session, never shared.
#[derive(Debug, Default)]
pub struct SessionMemory {
    pub last_created_file: Option<String>,
    pub last_opened_app: Option<String>,
    pub last_path: Option<String>,
    pub last_successful_intent: Option<String>,
    pub last_parameters: Map<String, Value>,
    consecutive_lang_hits: HashMap<String, u32>,
    last_detected_lang: Option<String>,
    preferred_language: String,
    interaction_history: Vec<InteractionTurn>,
}

impl SessionMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            preferred_language: "en".to_string(),
            ..Self::default()
        }
    }

    /// Explicitly clear all session state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Resolve explicit references ("last file", "the app") against
    /// remembered artifacts. Returns the resolved text and whether
    /// anything changed.
    #[must_use]
    pub fn resolve_reference(&self, text: &str) -> (String, bool) {
        let mut resolved = text.to_string();
        let target_file = self.last_created_file.as_ref().or(self.last_path.as_ref());

        for (pattern, is_file) in PHRASE_RES.iter() {
            let replacement = if *is_file {
                target_file
            } else {
                self.last_opened_app.as_ref()
            };
            if let Some(value) = replacement {
                if pattern.is_match(&resolved) {
                    resolved = pattern.replace_all(&resolved, value.as_str()).into_owned();
                }
            }
        }

        let modified = resolved != text;
        if modified {
            tracing::info!(original = text, resolved = %resolved, "resolved session references");
        }
        (resolved, modified)
    }

    /// Update memory from a verified-successful command. Callers must
    /// only invoke this after execution succeeded.
    pub fn update_from_success(&mut self, command: &Command) {
        self.last_successful_intent = Some(command.intent.clone());
        self.last_parameters = command.entities.clone();

        match command.intent.as_str() {
            "create_file" | "write_file" => {
                if let Some(path) = command.entity("path") {
                    self.last_created_file = Some(path.to_string());
                    self.last_path = Some(path.to_string());
                }
            }
            "launch_app" => {
                if let Some(app) = command.entity("app_name") {
                    self.last_opened_app = Some(app.to_string());
                }
            }
            "read_file" | "delete_file" => {
                if let Some(path) = command.entity("path") {
                    self.last_path = Some(path.to_string());
                }
            }
            _ => {}
        }
    }

    /// Track consecutive language detections; promote to preferred after
    /// five in a row. A different detection resets the counter.
    pub fn update_language_preference(&mut self, lang: &str) {
        if self.last_detected_lang.as_deref() == Some(lang) {
            *self.consecutive_lang_hits.entry(lang.to_string()).or_insert(0) += 1;
        } else {
            self.consecutive_lang_hits = HashMap::from([(lang.to_string(), 1)]);
        }
        self.last_detected_lang = Some(lang.to_string());

        if self
            .consecutive_lang_hits
            .get(lang)
            .copied()
            .unwrap_or(0)
            >= LANGUAGE_PROMOTION_THRESHOLD
        {
            if self.preferred_language != lang {
                tracing::info!(language = lang, "preferred language promoted");
            }
            self.preferred_language = lang.to_string();
        }
    }

    #[must_use]
    pub fn preferred_language(&self) -> &str {
        &self.preferred_language
    }

    #[must_use]
    pub fn consecutive_hits(&self, lang: &str) -> u32 {
        self.consecutive_lang_hits.get(lang).copied().unwrap_or(0)
    }

    pub fn add_interaction(&mut self, turn: InteractionTurn) {
        self.interaction_history.push(turn);
    }

    #[must_use]
    pub fn interaction_history(&self) -> &[InteractionTurn] {
        &self.interaction_history
    }

    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.interaction_history.len()
    }

    /// Replace the history (used after compression).
    pub fn set_interaction_history(&mut self, history: Vec<InteractionTurn>) {
        self.interaction_history = history;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_intent::DecisionSource;

    fn command(intent: &str, pairs: &[(&str, &str)]) -> Command {
        let entities: Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect();
        Command::new("input", intent, entities, 0.9, DecisionSource::Semantic)
    }

    #[test]
    fn create_file_success_sets_last_created_file() {
        let mut memory = SessionMemory::new();
        memory.update_from_success(&command("create_file", &[("path", "notes.txt")]));
        assert_eq!(memory.last_created_file.as_deref(), Some("notes.txt"));
        assert_eq!(memory.last_path.as_deref(), Some("notes.txt"));
        assert_eq!(memory.last_successful_intent.as_deref(), Some("create_file"));
    }

    #[test]
    fn open_url_does_not_touch_app_memory() {
        let mut memory = SessionMemory::new();
        memory.update_from_success(&command("open_url", &[("url", "https://google.com")]));
        assert!(memory.last_opened_app.is_none());
    }

    #[test]
    fn resolves_last_file_reference() {
        let mut memory = SessionMemory::new();
        memory.update_from_success(&command("create_file", &[("path", "notes.txt")]));
        let (resolved, modified) = memory.resolve_reference("open the last file");
        assert!(modified);
        assert_eq!(resolved, "open the notes.txt");
    }

    #[test]
    fn no_memory_means_no_resolution() {
        let memory = SessionMemory::new();
        let (resolved, modified) = memory.resolve_reference("open the last file");
        assert!(!modified);
        assert_eq!(resolved, "open the last file");
    }

    #[test]
    fn resolves_app_reference() {
        let mut memory = SessionMemory::new();
        memory.update_from_success(&command("launch_app", &[("app_name", "spotify")]));
        let (resolved, modified) = memory.resolve_reference("close the last app");
        assert!(modified);
        assert_eq!(resolved, "close the spotify");
    }

    #[test]
    fn fifth_consecutive_detection_promotes_language() {
        let mut memory = SessionMemory::new();
        for _ in 0..4 {
            memory.update_language_preference("es");
            assert_eq!(memory.preferred_language(), "en");
        }
        memory.update_language_preference("es");
        assert_eq!(memory.preferred_language(), "es");
    }

    #[test]
    fn different_detection_resets_the_counter() {
        let mut memory = SessionMemory::new();
        for _ in 0..4 {
            memory.update_language_preference("es");
        }
        memory.update_language_preference("en");
        assert_eq!(memory.consecutive_hits("es"), 0);
        memory.update_language_preference("es");
        assert_eq!(memory.consecutive_hits("es"), 1);
        assert_eq!(memory.preferred_language(), "en");
    }

    #[test]
    fn clear_resets_everything() {
        let mut memory = SessionMemory::new();
        memory.update_from_success(&command("create_file", &[("path", "a.txt")]));
        memory.add_interaction(InteractionTurn::new("user", "hello"));
        memory.clear();
        assert!(memory.last_created_file.is_none());
        assert_eq!(memory.turn_count(), 0);
        assert_eq!(memory.preferred_language(), "en");
    }
}
