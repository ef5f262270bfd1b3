//! Conversational shaping: softens polite/casual phrasing into clean
//! command intent without rewriting it.
//!
//! Filler stripping is verb-gated, synonym mapping applies only at the
//! first actionable token, and destructive synonyms are never mapped:
//! they surface an explicit rejection, not a confirmation prompt.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Dominant detected tone, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    Urgent,
    Frustrated,
    Polite,
    Casual,
    #[default]
    Neutral,
}

impl Tone {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Urgent => "urgent",
            Tone::Frustrated => "frustrated",
            Tone::Polite => "polite",
            Tone::Casual => "casual",
            Tone::Neutral => "neutral",
        }
    }

    /// Tones that upgrade SHALLOW reasoning to STANDARD.
    #[must_use]
    pub fn is_hostile(self) -> bool {
        matches!(self, Tone::Urgent | Tone::Frustrated)
    }
}

/// Result of a conversational processing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationResult {
    pub cleaned: String,
    pub was_modified: bool,
    pub tone: Tone,
    pub filler_stripped: bool,
    pub synonym_mapped: bool,
    /// A destructive synonym was found at verb position; the caller must
    /// reject with an explicit message.
    pub clarification_needed: bool,
    pub dangerous_synonym: Option<String>,
    /// Multiplied against confidence AFTER classification, never before.
    pub confidence_modifier: f64,
    pub indirect_phrasing: bool,
}

/// Safe action verbs; filler is only stripped when followed by one.
const SAFE_VERBS: &[&str] = &[
    "create", "open", "launch", "write", "close", "rename", "make", "start", "boot", "shut",
    "read", "list", "show", "find", "search", "move", "copy", "run", "execute", "save", "load",
    "print", "get", "set", "new", "clear", "help",
];

/// Filler phrases, longest first to avoid partial matches.
const FILLER_PHRASES: &[&str] = &[
    "i would like to",
    "would you mind",
    "i want to",
    "i wanna",
    "could you",
    "can you",
    "please",
    "pls",
    "hey",
    "yo",
    "bro",
    "buddy",
];

const MODAL_VERBS: &[&str] = &["would", "could", "might", "should", "may"];

/// Casual verb -> canonical command, verb-position only.
static SAFE_SYNONYM_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("make", "create"),
        ("start", "launch"),
        ("open up", "open"),
        ("spin up", "create"),
        ("boot", "launch"),
        ("shut", "close"),
    ])
});

/// Never mapped; always rejected.
const DESTRUCTIVE_SYNONYMS: &[&str] = &[
    "wipe",
    "erase",
    "destroy",
    "kill",
    "purge",
    "nuke",
    "obliterate",
    "annihilate",
    "trash",
    "zap",
];

static TONE_KEYWORDS: Lazy<Vec<(Tone, HashSet<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            Tone::Urgent,
            HashSet::from(["asap", "urgent", "now", "immediately", "hurry", "quick", "fast", "rush"]),
        ),
        (
            Tone::Frustrated,
            HashSet::from(["ugh", "again", "still", "broken", "why", "useless", "argh", "seriously"]),
        ),
        (
            Tone::Polite,
            HashSet::from(["please", "thank", "kindly", "appreciate", "thanks", "sorry", "excuse"]),
        ),
        (
            Tone::Casual,
            HashSet::from(["hey", "yo", "bro", "buddy", "wanna", "gonna", "lemme", "gimme"]),
        ),
    ]
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));
static QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("valid regex"));

const PLACEHOLDER_PREFIX: char = '\u{0}';

/// Pre-pipeline conversational softening.
#[derive(Debug, Default)]
pub struct ConversationLayer;

impl ConversationLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Process `input`. The caller applies `confidence_modifier` after
    /// classification.
    #[must_use]
    pub fn process(&self, input: &str) -> ConversationResult {
        let original = input;
        let mut filler_stripped = false;
        let mut synonym_mapped = false;
        let mut clarification_needed = false;
        let mut dangerous_synonym: Option<String> = None;

        let mut placeholders: Vec<String> = Vec::new();
        let mut text = QUOTE_RE
            .replace_all(input, |caps: &regex::Captures<'_>| {
                let idx = placeholders.len();
                placeholders.push(caps[0].to_string());
                format!("{PLACEHOLDER_PREFIX}Q{idx}{PLACEHOLDER_PREFIX}")
            })
            .into_owned();

        // Filler stripping: beginning only, one phrase, and only when the
        // next token is a safe verb.
        let mut stripped: Option<String> = None;
        {
            let trimmed = text.trim_start();
            let lower = trimmed.to_lowercase();
            for phrase in FILLER_PHRASES {
                if let Some(rest) = lower.strip_prefix(phrase) {
                    let Some(rest) = rest.strip_prefix(' ') else {
                        continue;
                    };
                    let next_word = rest.split_whitespace().next().unwrap_or("");
                    if SAFE_VERBS.contains(&next_word) {
                        stripped = Some(trimmed[phrase.len()..].trim_start().to_string());
                        break;
                    }
                }
            }
        }
        if let Some(remainder) = stripped {
            text = remainder;
            filler_stripped = true;
        }

        // Synonym mapping at the first actionable token. Two-word
        // synonyms are checked before single-word.
        let words: Vec<&str> = text.split_whitespace().collect();
        if !words.is_empty() {
            let two_word = if words.len() >= 2 {
                format!("{} {}", words[0], words[1]).to_lowercase()
            } else {
                String::new()
            };
            let one_word = words[0].to_lowercase();

            if let Some(canonical) = SAFE_SYNONYM_MAP.get(two_word.as_str()) {
                text = join_mapped(canonical, &words[2..]);
                synonym_mapped = true;
            } else if let Some(canonical) = SAFE_SYNONYM_MAP.get(one_word.as_str()) {
                text = join_mapped(canonical, &words[1..]);
                synonym_mapped = true;
            } else if DESTRUCTIVE_SYNONYMS.contains(&one_word.as_str()) {
                clarification_needed = true;
                dangerous_synonym = Some(one_word);
            }
        }

        // Dominant tone over all lowercased tokens of the ORIGINAL text,
        // first matching priority wins.
        let tokens: HashSet<String> = WORD_RE
            .find_iter(&original.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect();
        let tone = TONE_KEYWORDS
            .iter()
            .find(|(_, keywords)| tokens.iter().any(|t| keywords.contains(t.as_str())))
            .map(|(tone, _)| *tone)
            .unwrap_or(Tone::Neutral);

        let modal_found = MODAL_VERBS.iter().any(|m| tokens.contains(*m));
        let indirect_phrasing = filler_stripped || modal_found;
        let confidence_modifier = if indirect_phrasing { 0.95 } else { 1.0 };

        for (idx, quoted) in placeholders.iter().enumerate() {
            text = text.replace(
                &format!("{PLACEHOLDER_PREFIX}Q{idx}{PLACEHOLDER_PREFIX}"),
                quoted,
            );
        }

        let was_modified = text != original || filler_stripped || synonym_mapped;

        ConversationResult {
            cleaned: text,
            was_modified,
            tone,
            filler_stripped,
            synonym_mapped,
            clarification_needed,
            dangerous_synonym,
            confidence_modifier,
            indirect_phrasing,
        }
    }
}

fn join_mapped(canonical: &str, rest: &[&str]) -> String {
    if rest.is_empty() {
        canonical.to_string()
    } else {
        format!("{canonical} {}", rest.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process(input: &str) -> ConversationResult {
        ConversationLayer::new().process(input)
    }

    #[test]
    fn filler_stripped_when_followed_by_safe_verb() {
        let result = process("can you create a file");
        assert!(result.filler_stripped);
        assert_eq!(result.cleaned, "create a file");
        assert!(result.indirect_phrasing);
        assert_eq!(result.confidence_modifier, 0.95);
    }

    #[test]
    fn filler_kept_when_not_followed_by_safe_verb() {
        let result = process("can you believe this");
        assert!(!result.filler_stripped);
        assert_eq!(result.cleaned, "can you believe this");
    }

    #[test]
    fn only_one_filler_phrase_is_stripped() {
        let result = process("please open notes.txt");
        assert!(result.filler_stripped);
        assert_eq!(result.cleaned, "open notes.txt");
    }

    #[test]
    fn synonym_maps_at_verb_position_only() {
        let result = process("make a file named a.txt");
        assert!(result.synonym_mapped);
        assert_eq!(result.cleaned, "create a file named a.txt");

        // "make" not at verb position stays.
        let result = process("open the make directory");
        assert!(!result.synonym_mapped);
    }

    #[test]
    fn two_word_synonyms_win_over_single_word() {
        let result = process("open up spotify");
        assert!(result.synonym_mapped);
        assert_eq!(result.cleaned, "open spotify");
    }

    #[test]
    fn destructive_synonym_triggers_clarification_without_mapping() {
        let result = process("nuke my downloads");
        assert!(result.clarification_needed);
        assert_eq!(result.dangerous_synonym.as_deref(), Some("nuke"));
        assert_eq!(result.cleaned, "nuke my downloads");
    }

    #[test]
    fn tone_priority_urgent_beats_polite() {
        let result = process("please do this now");
        assert_eq!(result.tone, Tone::Urgent);
    }

    #[test]
    fn polite_tone_detected() {
        let result = process("please create a file");
        assert_eq!(result.tone, Tone::Polite);
    }

    #[test]
    fn neutral_tone_for_plain_commands() {
        let result = process("create notes.txt");
        assert_eq!(result.tone, Tone::Neutral);
        assert_eq!(result.confidence_modifier, 1.0);
    }

    #[test]
    fn modal_verbs_set_indirect_phrasing() {
        let result = process("would launch spotify");
        assert!(result.indirect_phrasing);
        assert_eq!(result.confidence_modifier, 0.95);
    }

    #[test]
    fn quoted_strings_survive_untouched() {
        let result = process("please create 'make it so.txt'");
        assert!(result.cleaned.contains("'make it so.txt'"));
    }

    #[test]
    fn boot_maps_to_launch() {
        let result = process("boot spotify");
        assert_eq!(result.cleaned, "launch spotify");
    }
}
