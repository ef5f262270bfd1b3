//! Legacy regex intent detector. Last resort of the cascade.

use crate::command::{Command, DecisionSource};
use crate::extract;
use once_cell::sync::Lazy;
use regex::Regex;

static PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)^(?:create|make|new)\b.*\bfile\b").expect("valid regex"),
            "create_file",
        ),
        (
            Regex::new(r"(?i)^(?:read|show|cat)\b.*\bfile\b").expect("valid regex"),
            "read_file",
        ),
        (
            Regex::new(r"(?i)^delete\b").expect("valid regex"),
            "delete_file",
        ),
        (
            Regex::new(r"(?i)^open\b.*(?:https?://|www\.|\.com)").expect("valid regex"),
            "open_url",
        ),
        (
            Regex::new(r"(?i)^(?:launch|start|run)\b").expect("valid regex"),
            "launch_app",
        ),
        (
            Regex::new(r"(?i)^install\b").expect("valid regex"),
            "install_software",
        ),
        (
            Regex::new(r"(?i)^search\b").expect("valid regex"),
            "search_web",
        ),
    ]
});

/// Regex fallback confidence; deliberately modest.
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Pattern-table intent detection.
#[must_use]
pub fn detect(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    for (pattern, intent) in PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            let entities = extract::extract_parameters(intent, trimmed);
            return Some(Command::new(
                trimmed,
                *intent,
                entities,
                FALLBACK_CONFIDENCE,
                DecisionSource::Regex,
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pattern_matches() {
        let cmd = detect("create file notes.txt").unwrap();
        assert_eq!(cmd.intent, "create_file");
        assert_eq!(cmd.entity("path"), Some("notes.txt"));
        assert_eq!(cmd.decision_source, DecisionSource::Regex);
    }

    #[test]
    fn url_pattern_matches() {
        let cmd = detect("open www.example.com").unwrap();
        assert_eq!(cmd.intent, "open_url");
    }

    #[test]
    fn no_pattern_returns_none() {
        assert!(detect("what a lovely day").is_none());
    }
}
