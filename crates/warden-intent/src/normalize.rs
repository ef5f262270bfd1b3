//! Conservative input normalization with a destructive-keyword guard.
//!
//! Philosophy: conservative beats clever. If unsure, do nothing, and
//! never auto-correct toward destructive intent. The guard consults the
//! destructive set and the near-miss table BEFORE the safe-correction
//! table; inverting that order is the bug class the tests below exercise.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Result of a normalization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationResult {
    /// The cleaned input string.
    pub normalized: String,
    pub was_modified: bool,
    /// Canonical destructive keyword the input was suspiciously close to.
    pub dangerous_token_detected: Option<String>,
    /// Human-readable summary of changes.
    pub delta: String,
    pub modification_count: usize,
}

/// Words that must never be auto-corrected. A misspelled token within
/// edit-distance 1 of any of these stops the pass and asks the user to
/// type the word explicitly.
const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "delete",
    "remove",
    "format",
    "wipe",
    "shutdown",
    "erase",
    "overwrite",
    "kill",
    "terminate",
    "destroy",
    "purge",
];

/// Safe command keywords eligible for distance-1 correction.
const SAFE_KEYWORDS: &[&str] = &[
    "create", "open", "launch", "close", "write", "rename", "read", "list", "show", "find",
    "search", "move", "copy", "start", "stop", "run", "execute", "print", "save", "load", "help",
    "exit", "quit", "clear", "new", "make", "get", "set",
];

/// Common English words within edit-distance 1 of a safe keyword that are
/// not typos ("how" is one edit from "show"). Never corrected.
const COMMON_WORDS_EXCLUSION: &[&str] = &[
    // near "list"
    "last", "lost", "lust", "fist", "gist", "mist", "wist", // near "show"
    "shot", "shop", "shoe", "shod", "shoo", // conversational words near commands
    "how", "who", "now", "row", "sow", "bow", "cow", "low", "mow", "tow", "vow", "wow", "what",
    "when", "where", "why", "was", "has", "had", "are", "our", // near "find"
    "bind", "kind", "mind", "wind", "rind", // near "move"
    "love", "dove", "cove", "rove", "wove", // near "copy"
    "cozy", "cony", "corp", // near "stop"
    "step", "stem", "stow", // near "run"
    "gun", "sun", "bun", "fun", "nun", "pun", // near "get"
    "got", "gut", "git", "gat", // near "set"
    "sat", "sit", "sot", "net", "bet", "jet", "let", "met", "pet", "vet", "wet", "yet",
    // near "new"
    "dew", "few", "hew", "mew", "sew", // near "read"
    "bead", "dead", "head", "lead", "mead", // near "save"
    "cave", "gave", "have", "lave", "nave", "pave", "rave", "wave", // near "load"
    "road", "toad", "goad", // near "make"
    "bake", "cake", "fake", "lake", "rake", "sake", "take", "wake", // near "open"
    "oven", // near "quit"
    "knit", "spit", "slit", "grit", // near "exit"
    "edit", // near "print"
    "pint", // near "clear"
    "clean", "cleat", // near "start"
    "smart", "stark", "stare", "stars", // near "close"
    "chose", "those", // near "write"
    "white", "quite", "kite", // near "search"
    "starch", // near "launch"
    "haunch", "paunch",
];

/// Static typo dictionary, exact lowercase match only.
static TYPO_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("teh", "the"),
        ("plese", "please"),
        ("pleese", "please"),
        ("creat", "create"),
        ("cretae", "create"),
        ("craete", "create"),
        ("launc", "launch"),
        ("opne", "open"),
        ("clos", "close"),
        ("wrtie", "write"),
        ("wriet", "write"),
        ("renmae", "rename"),
        ("renam", "rename"),
        ("fiel", "file"),
        ("flie", "file"),
        ("fodler", "folder"),
        ("foldr", "folder"),
        ("direcotry", "directory"),
        ("directoy", "directory"),
        ("adn", "and"),
        ("nad", "and"),
        ("thn", "then"),
        ("thne", "then"),
        ("hte", "the"),
        ("yuo", "you"),
        ("taht", "that"),
        ("waht", "what"),
        ("whta", "what"),
    ])
});

/// Explicit near-miss table for destructive keywords: misspellings that
/// are edit-distance > 1 from the keyword but clearly destructive intent.
/// Checked before the distance loop.
static DESTRUCTIVE_NEAR_MISS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("deleet", "delete"),
        ("delet", "delete"),
        ("del", "delete"),
        ("deleete", "delete"),
        ("remov", "remove"),
        ("remvoe", "remove"),
        ("rmove", "remove"),
        ("foramt", "format"),
        ("fromat", "format"),
        ("wiipe", "wipe"),
        ("wip", "wipe"),
        ("shutdwon", "shutdown"),
        ("shutdonw", "shutdown"),
        ("shutdwn", "shutdown"),
        ("eras", "erase"),
        ("erease", "erase"),
        ("overwrit", "overwrite"),
        ("kil", "kill"),
        ("terminat", "terminate"),
        ("destory", "destroy"),
        ("destry", "destroy"),
        ("purg", "purge"),
    ])
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Compress runs of three or more identical ASCII letters to two.
/// Digits and symbols pass through, so "v1.0000.txt" is untouched.
fn compress_repeated_alpha(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_char: Option<char> = None;
    let mut run_len = 0usize;
    for c in text.chars() {
        if c.is_ascii_alphabetic() && run_char == Some(c) {
            run_len += 1;
            if run_len <= 2 {
                out.push(c);
            }
        } else {
            run_char = Some(c);
            run_len = 1;
            out.push(c);
        }
    }
    out
}

static QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("valid regex"));

/// Connector patterns normalized for multi-intent splitting. Longer
/// patterns first to avoid partial matches.
static CONNECTOR_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)\bandthen\b").expect("valid regex"),
            "and then",
        ),
        (
            Regex::new(r"(?i)\bn\s+then\b").expect("valid regex"),
            "and then",
        ),
        (
            Regex::new(r"(?i)\bthen\s+and\b").expect("valid regex"),
            "and then",
        ),
    ]
});

const PLACEHOLDER_PREFIX: char = '\u{0}';

fn is_path_token(token: &str) -> bool {
    token.contains('.') || token.contains('/') || token.contains('\\')
}

fn is_digit_token(token: &str) -> bool {
    let stripped: String = token.chars().filter(|c| *c != '.' && *c != '-').collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

fn should_skip_token(token: &str) -> bool {
    token.is_empty() || is_path_token(token) || is_digit_token(token)
}

fn extract_quotes(text: &str, placeholders: &mut Vec<String>) -> String {
    QUOTE_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let idx = placeholders.len();
            placeholders.push(caps[0].to_string());
            format!("{PLACEHOLDER_PREFIX}QUOTE{idx}{PLACEHOLDER_PREFIX}")
        })
        .into_owned()
}

fn restore_quotes(mut text: String, placeholders: &[String]) -> String {
    for (idx, quoted) in placeholders.iter().enumerate() {
        text = text.replace(
            &format!("{PLACEHOLDER_PREFIX}QUOTE{idx}{PLACEHOLDER_PREFIX}"),
            quoted,
        );
    }
    text
}

/// Pre-pipeline input normalization.
#[derive(Debug, Default)]
pub struct NormalizationEngine;

impl NormalizationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run all normalization transforms on `raw_input`.
    #[must_use]
    pub fn normalize(&self, raw_input: &str) -> NormalizationResult {
        let mut changes: Vec<String> = Vec::new();
        let mut mod_count = 0usize;

        // Quoted sections are replaced with placeholders so they are
        // never touched, then restored verbatim at the end.
        let mut placeholders = Vec::new();
        let mut text = extract_quotes(raw_input, &mut placeholders);

        let collapsed = WHITESPACE_RE.replace_all(&text, " ").trim().to_string();
        if collapsed != text {
            changes.push("whitespace collapsed".to_string());
            mod_count += 1;
        }
        text = collapsed;

        let compressed = compress_repeated_alpha(&text);
        if compressed != text {
            changes.push("repeated chars compressed".to_string());
            mod_count += 1;
        }
        text = compressed;

        for (pattern, replacement) in CONNECTOR_PATTERNS.iter() {
            let replaced = pattern.replace_all(&text, *replacement).into_owned();
            if replaced != text {
                changes.push(format!("connector normalised -> '{replacement}'"));
                mod_count += 1;
            }
            text = replaced;
        }

        let tokens: Vec<&str> = text.split(' ').collect();
        let mut new_tokens: Vec<String> = Vec::with_capacity(tokens.len());
        let mut dangerous_token: Option<String> = None;

        'tokens: for token in &tokens {
            if token.starts_with(PLACEHOLDER_PREFIX) || should_skip_token(token) {
                new_tokens.push((*token).to_string());
                continue;
            }

            let lower = token.to_lowercase();

            // An exact destructive keyword is deliberate input; pass it on.
            if DESTRUCTIVE_KEYWORDS.contains(&lower.as_str()) {
                new_tokens.push((*token).to_string());
                continue;
            }

            // Near-miss table catches distance>1 misspellings that are
            // still clearly destructive intent.
            if let Some(canonical) = DESTRUCTIVE_NEAR_MISS.get(lower.as_str()) {
                dangerous_token = Some((*canonical).to_string());
                break 'tokens;
            }

            for keyword in DESTRUCTIVE_KEYWORDS {
                if strsim::levenshtein(&lower, keyword) <= 1 {
                    dangerous_token = Some((*keyword).to_string());
                    break 'tokens;
                }
            }

            if let Some(corrected) = TYPO_MAP.get(lower.as_str()) {
                changes.push(format!("typo '{token}' -> '{corrected}'"));
                mod_count += 1;
                new_tokens.push((*corrected).to_string());
                continue;
            }

            if COMMON_WORDS_EXCLUSION.contains(&lower.as_str()) {
                new_tokens.push((*token).to_string());
                continue;
            }

            let correction = SAFE_KEYWORDS
                .iter()
                .find(|kw| lower != **kw && strsim::levenshtein(&lower, kw) <= 1);
            if let Some(keyword) = correction {
                changes.push(format!("keyword '{token}' -> '{keyword}'"));
                mod_count += 1;
                new_tokens.push((*keyword).to_string());
                continue;
            }

            new_tokens.push((*token).to_string());
        }

        if dangerous_token.is_none() {
            text = new_tokens.join(" ");
        }

        let text = restore_quotes(text, &placeholders);
        let was_modified = text != raw_input;
        let delta = if changes.is_empty() {
            "no changes".to_string()
        } else {
            changes.join("; ")
        };

        if let Some(keyword) = &dangerous_token {
            tracing::warn!(keyword = %keyword, "dangerous token detected; normalization aborted");
        }

        NormalizationResult {
            normalized: text,
            was_modified,
            dangerous_token_detected: dangerous_token,
            delta,
            modification_count: mod_count,
        }
    }
}
