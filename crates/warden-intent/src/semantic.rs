//! Rule-based semantic engine.
//!
//! Splits compound utterances on connectors and classifies each segment
//! with keyword rules, producing structured intents with confidence and a
//! clarification flag. This is the cascade stage below the embedding
//! router and above the regex fallback.

use crate::extract;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// One classified segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticIntent {
    pub intent: String,
    pub parameters: Map<String, Value>,
    pub confidence: f64,
    pub requires_clarification: bool,
}

impl SemanticIntent {
    fn unknown() -> Self {
        Self {
            intent: "unknown".into(),
            parameters: Map::new(),
            confidence: 0.0,
            requires_clarification: true,
        }
    }
}

/// Result over all segments of an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticResult {
    pub intents: Vec<SemanticIntent>,
    /// Minimum confidence across segments.
    pub confidence: f64,
    pub requires_clarification: bool,
}

static NAMED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnamed\s+(\S+)").expect("valid regex"));
static FILE_AFTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfile\s+(?:named\s+)?(\S+)").expect("valid regex"));

/// Segments that classify below this confidence request clarification.
const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Rule-based semantic intent parser.
#[derive(Debug, Default)]
pub struct SemanticEngine;

impl SemanticEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Convert natural language to one or more structured intents.
    /// Supports splitting commands like "do A and do B".
    #[must_use]
    pub fn parse(&self, input: &str) -> SemanticResult {
        let segments = split_on_connectors(input);
        let mut intents = Vec::with_capacity(segments.len());
        let mut requires_clarification = false;
        let mut min_confidence = 1.0f64;

        for segment in segments {
            let mut intent = classify_segment(&segment);
            if intent.confidence < CONFIDENCE_THRESHOLD {
                intent.requires_clarification = true;
            }
            requires_clarification |= intent.requires_clarification;
            min_confidence = min_confidence.min(intent.confidence);
            intents.push(intent);
        }

        if intents.is_empty() {
            return SemanticResult {
                intents: vec![SemanticIntent::unknown()],
                confidence: 0.0,
                requires_clarification: true,
            };
        }

        SemanticResult {
            intents,
            confidence: min_confidence,
            requires_clarification,
        }
    }
}

/// Split on `and then` > `and` > `then`, once.
fn split_on_connectors(text: &str) -> Vec<String> {
    let lower = text.to_lowercase().trim().to_string();
    for connector in [" and then ", " and ", " then "] {
        if let Some(position) = lower.find(connector) {
            let (left, right) = lower.split_at(position);
            return vec![
                left.trim().to_string(),
                right[connector.len()..].trim().to_string(),
            ];
        }
    }
    vec![lower]
}

fn classify_segment(text: &str) -> SemanticIntent {
    let text = text.trim();
    if text.is_empty() {
        return SemanticIntent::unknown();
    }

    // File creation: requires a create-ish verb AND "file".
    if (text.contains("create") || text.contains("make") || text.contains("write"))
        && text.contains("file")
    {
        let is_write = text.contains("write") || text.contains("content");
        let intent = if is_write { "write_file" } else { "create_file" };
        let mut parameters = extract::extract_parameters(intent, text);
        if parameters.get("path").is_none() {
            if let Some(name) = capture(&NAMED_RE, text).or_else(|| {
                capture(&FILE_AFTER_RE, text)
                    .filter(|n| !matches!(n.as_str(), "and" | "with" | "named"))
            }) {
                parameters.insert("path".into(), name.into());
            }
        }
        let has_path = parameters.contains_key("path");
        let has_content = parameters.contains_key("content");
        return SemanticIntent {
            intent: intent.into(),
            parameters,
            confidence: if has_path && (has_content || !is_write) {
                0.85
            } else {
                0.6
            },
            requires_clarification: !has_path,
        };
    }

    // URL opening.
    if text.contains("open") && (text.contains("http") || text.contains(".com")) {
        let parameters = extract::extract_parameters("open_url", text);
        let has_url = parameters.contains_key("url");
        return SemanticIntent {
            intent: "open_url".into(),
            parameters,
            confidence: if has_url { 0.9 } else { 0.5 },
            requires_clarification: !has_url,
        };
    }

    // File reading.
    if (text.contains("open") || text.contains("read")) && text.contains("file") {
        let parameters = extract::extract_parameters("read_file", text);
        let has_path = parameters.contains_key("path");
        return SemanticIntent {
            intent: "read_file".into(),
            parameters,
            confidence: if has_path { 0.85 } else { 0.55 },
            requires_clarification: !has_path,
        };
    }

    // Deletion: only the exact verbs; near-misses were already stopped by
    // the normalization guard upstream.
    if (text.contains("delete") || text.contains("remove")) && text.contains("file")
        || text.starts_with("delete ")
    {
        let parameters = extract::extract_parameters("delete_file", text);
        let has_path = parameters.contains_key("path");
        return SemanticIntent {
            intent: "delete_file".into(),
            parameters,
            confidence: if has_path { 0.85 } else { 0.6 },
            requires_clarification: !has_path,
        };
    }

    // Web search.
    if text.contains("search") || text.starts_with("look up") {
        let parameters = extract::extract_parameters("search_web", text);
        let has_query = parameters.contains_key("query");
        return SemanticIntent {
            intent: "search_web".into(),
            parameters,
            confidence: if has_query { 0.8 } else { 0.5 },
            requires_clarification: !has_query,
        };
    }

    // Software install.
    if text.contains("install") {
        let parameters = extract::extract_parameters("install_software", text);
        let has_package = parameters.contains_key("package");
        return SemanticIntent {
            intent: "install_software".into(),
            parameters,
            confidence: if has_package { 0.8 } else { 0.5 },
            requires_clarification: !has_package,
        };
    }

    // Config change.
    if text.contains("config") || (text.contains("setting") && text.contains(" to ")) {
        let parameters = extract::extract_parameters("change_config", text);
        let complete = parameters.contains_key("setting") && parameters.contains_key("value");
        return SemanticIntent {
            intent: "change_config".into(),
            parameters,
            confidence: if complete { 0.8 } else { 0.5 },
            requires_clarification: !complete,
        };
    }

    // App launch: last of the verb rules so URLs and files win above.
    if text.contains("launch") || text.contains("start") || text.contains("open") {
        let parameters = extract::extract_parameters("launch_app", text);
        let has_app = parameters.contains_key("app_name");
        if has_app {
            return SemanticIntent {
                intent: "launch_app".into(),
                parameters,
                confidence: 0.8,
                requires_clarification: false,
            };
        }
        return SemanticIntent {
            intent: "launch_app".into(),
            parameters,
            confidence: 0.4,
            requires_clarification: true,
        };
    }

    SemanticIntent::unknown()
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> SemanticResult {
        SemanticEngine::new().parse(input)
    }

    #[test]
    fn create_file_with_name_is_confident() {
        let result = parse("create file notes.txt");
        assert_eq!(result.intents[0].intent, "create_file");
        assert_eq!(result.intents[0].parameters["path"], "notes.txt");
        assert!(!result.requires_clarification);
    }

    #[test]
    fn create_file_without_name_requires_clarification() {
        let result = parse("create file");
        assert_eq!(result.intents[0].intent, "create_file");
        assert!(result.intents[0].requires_clarification);
        assert!(result.requires_clarification);
    }

    #[test]
    fn write_with_content_extracts_both() {
        let result = parse(r#"write file a.txt with content "hello""#);
        let intent = &result.intents[0];
        assert_eq!(intent.intent, "write_file");
        assert_eq!(intent.parameters["path"], "a.txt");
        assert_eq!(intent.parameters["content"], "hello");
        assert_eq!(intent.confidence, 0.85);
    }

    #[test]
    fn open_url_beats_launch_app() {
        let result = parse("open https://google.com");
        assert_eq!(result.intents[0].intent, "open_url");
        assert_eq!(result.intents[0].confidence, 0.9);
    }

    #[test]
    fn compound_command_splits_on_and_then() {
        let result = parse("create file a.txt and then open https://google.com");
        assert_eq!(result.intents.len(), 2);
        assert_eq!(result.intents[0].intent, "create_file");
        assert_eq!(result.intents[1].intent, "open_url");
    }

    #[test]
    fn compound_confidence_is_the_minimum() {
        let result = parse("create file a.txt and open https://google.com");
        assert_eq!(result.intents.len(), 2);
        assert!(result.confidence <= result.intents[0].confidence);
        assert!(result.confidence <= result.intents[1].confidence);
    }

    #[test]
    fn delete_file_classifies() {
        let result = parse("delete file notes.txt");
        assert_eq!(result.intents[0].intent, "delete_file");
        assert_eq!(result.intents[0].parameters["path"], "notes.txt");
    }

    #[test]
    fn launch_known_app() {
        let result = parse("launch spotify");
        assert_eq!(result.intents[0].intent, "launch_app");
        assert_eq!(result.intents[0].parameters["app_name"], "spotify");
    }

    #[test]
    fn gibberish_is_unknown() {
        let result = parse("florble the wuzzle");
        assert_eq!(result.intents[0].intent, "unknown");
        assert!(result.requires_clarification);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn empty_input_is_unknown() {
        let result = parse("   ");
        assert_eq!(result.intents[0].intent, "unknown");
    }
}
