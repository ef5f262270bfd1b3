//! Per-intent required-parameter checks and real-world feasibility.
//!
//! Missing required parameters raise a clarification with the
//! intent-specific question; infeasible values (malformed URLs, forbidden
//! filename characters, protected paths) fail with an explicit reason.
//! Missing optional parameters pass through.

use crate::extract::KNOWN_APPS;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Result of feasibility validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeasibilityResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub requires_clarification: bool,
    pub clarification_question: Option<String>,
    /// Required fields that were absent or empty.
    pub missing_fields: Vec<String>,
}

impl FeasibilityResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }
}

struct IntentSpec {
    required: &'static [&'static str],
    clarification: Option<&'static str>,
}

static INTENT_PARAMETERS: Lazy<HashMap<&'static str, IntentSpec>> = Lazy::new(|| {
    HashMap::from([
        (
            "create_file",
            IntentSpec {
                required: &["path"],
                clarification: Some("What should I name the new file?"),
            },
        ),
        (
            "write_file",
            IntentSpec {
                required: &["path", "content"],
                clarification: Some("What should I name the file?"),
            },
        ),
        (
            "delete_file",
            IntentSpec {
                required: &["path"],
                clarification: Some("Which file would you like me to delete?"),
            },
        ),
        (
            "read_file",
            IntentSpec {
                required: &["path"],
                clarification: Some("Which file would you like me to read?"),
            },
        ),
        (
            "open_url",
            IntentSpec {
                required: &["url"],
                clarification: Some("Which URL should I open?"),
            },
        ),
        (
            "launch_app",
            IntentSpec {
                required: &["app_name"],
                clarification: Some("Which application should I launch?"),
            },
        ),
        (
            "search_web",
            IntentSpec {
                required: &["query"],
                clarification: Some("What would you like me to search for?"),
            },
        ),
        (
            "install_software",
            IntentSpec {
                required: &["package"],
                clarification: Some("Which package should I install?"),
            },
        ),
        (
            "change_config",
            IntentSpec {
                required: &["setting", "value"],
                clarification: Some("Which setting should I change, and to what value?"),
            },
        ),
        (
            "conversation",
            IntentSpec {
                required: &[],
                clarification: None,
            },
        ),
        (
            "unknown",
            IntentSpec {
                required: &[],
                clarification: None,
            },
        ),
    ])
});

/// Characters forbidden in filenames (Windows and POSIX union, minus the
/// path separators that legitimate paths carry).
static INVALID_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).expect("valid regex"));

/// Paths that must never be targeted.
const PROTECTED_PATHS: &[&str] = &[
    "/", "C:\\", "C:/", "/root", "/home", "/etc", "/usr", "/bin", "/var", "/sys", "/proc",
    "/boot",
];
const PROTECTED_PREFIXES: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "/usr/",
    "/etc/",
    "/bin/",
    "/sbin/",
    "/var/",
    "/sys/",
    "/proc/",
];

static URL_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/]+\.[^\s/]+").expect("valid regex"));

/// Validates commands against parameter requirements and feasibility.
#[derive(Debug, Default)]
pub struct FeasibilityValidator;

impl FeasibilityValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check required parameters, then value feasibility.
    #[must_use]
    pub fn validate(&self, intent: &str, params: &Map<String, Value>) -> FeasibilityResult {
        let Some(spec) = INTENT_PARAMETERS.get(intent) else {
            // Unknown intent: nothing to validate here.
            return FeasibilityResult::ok();
        };

        let missing: Vec<String> = spec
            .required
            .iter()
            .filter(|key| {
                params
                    .get(**key)
                    .and_then(Value::as_str)
                    .map_or(true, |v| v.trim().is_empty())
            })
            .map(|k| (*k).to_string())
            .collect();

        if !missing.is_empty() {
            // One question at a time; content is only asked about once a
            // name exists.
            let question = if missing == ["content"] {
                "What content should I write in the file?".to_string()
            } else {
                spec.clarification
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("I need more information: {}", missing.join(", ")))
            };
            return FeasibilityResult {
                valid: false,
                errors: vec![format!(
                    "Missing required parameter(s): {}",
                    missing.join(", ")
                )],
                requires_clarification: true,
                clarification_question: Some(question),
                missing_fields: missing,
            };
        }

        self.validate_values(intent, params)
    }

    fn validate_values(&self, intent: &str, params: &Map<String, Value>) -> FeasibilityResult {
        let mut errors = Vec::new();

        match intent {
            "create_file" | "write_file" | "delete_file" | "read_file" => {
                if let Some(path) = params.get("path").and_then(Value::as_str) {
                    if INVALID_FILENAME_CHARS.is_match(path) {
                        errors.push(format!("Path '{path}' contains forbidden characters"));
                    }
                    if is_protected_path(path) {
                        errors.push(format!("Path '{path}' is protected"));
                    }
                }
            }
            "open_url" => {
                if let Some(url) = params.get("url").and_then(Value::as_str) {
                    if !URL_SHAPE_RE.is_match(url) {
                        errors.push(format!("'{url}' is not a valid http(s) URL"));
                    }
                }
            }
            "launch_app" => {
                if let Some(app) = params.get("app_name").and_then(Value::as_str) {
                    let lower = app.to_lowercase();
                    if !KNOWN_APPS.contains(&lower.as_str()) {
                        errors.push(format!(
                            "Application '{app}' is not in the known applications list"
                        ));
                    }
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            FeasibilityResult::ok()
        } else {
            FeasibilityResult {
                valid: false,
                errors,
                ..FeasibilityResult::default()
            }
        }
    }
}

fn is_protected_path(path: &str) -> bool {
    PROTECTED_PATHS.contains(&path)
        || PROTECTED_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect()
    }

    fn validator() -> FeasibilityValidator {
        FeasibilityValidator::new()
    }

    #[test]
    fn missing_path_asks_the_delete_question() {
        let result = validator().validate("delete_file", &Map::new());
        assert!(!result.valid);
        assert!(result.requires_clarification);
        assert_eq!(
            result.clarification_question.as_deref(),
            Some("Which file would you like me to delete?")
        );
        assert_eq!(result.missing_fields, vec!["path"]);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let result = validator().validate("read_file", &params(&[("path", " ")]));
        assert!(result.requires_clarification);
    }

    #[test]
    fn complete_parameters_pass() {
        let result = validator().validate("delete_file", &params(&[("path", "notes.txt")]));
        assert!(result.valid);
        assert!(!result.requires_clarification);
    }

    #[test]
    fn forbidden_characters_fail_without_clarification() {
        let result = validator().validate("create_file", &params(&[("path", "no|pe.txt")]));
        assert!(!result.valid);
        assert!(!result.requires_clarification);
        assert!(result.errors[0].contains("forbidden"));
    }

    #[test]
    fn protected_paths_are_refused() {
        let result = validator().validate("delete_file", &params(&[("path", "/etc/passwd")]));
        assert!(!result.valid);
        assert!(result.errors[0].contains("protected"));

        let result = validator().validate("delete_file", &params(&[("path", "/")]));
        assert!(!result.valid);
    }

    #[test]
    fn malformed_url_fails() {
        let result = validator().validate("open_url", &params(&[("url", "not a url")]));
        assert!(!result.valid);
    }

    #[test]
    fn wellformed_url_passes() {
        let result =
            validator().validate("open_url", &params(&[("url", "https://google.com")]));
        assert!(result.valid);
    }

    #[test]
    fn unknown_app_fails_with_explicit_reason() {
        let result = validator().validate("launch_app", &params(&[("app_name", "zenplayer")]));
        assert!(!result.valid);
        assert!(result.errors[0].contains("zenplayer"));
    }

    #[test]
    fn known_app_passes() {
        let result = validator().validate("launch_app", &params(&[("app_name", "spotify")]));
        assert!(result.valid);
    }

    #[test]
    fn optional_parameters_may_be_absent() {
        // content is optional for create_file.
        let result = validator().validate("create_file", &params(&[("path", "a.txt")]));
        assert!(result.valid);
    }

    #[test]
    fn write_file_requires_both_path_and_content() {
        let result = validator().validate("write_file", &params(&[("path", "a.txt")]));
        assert!(result.requires_clarification);
        assert_eq!(result.missing_fields, vec!["content"]);
        assert_eq!(
            result.clarification_question.as_deref(),
            Some("What content should I write in the file?")
        );
    }
}
