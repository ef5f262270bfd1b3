//! Adaptive reasoning depth.
//!
//! Scales reasoning before any advisor escalation. Rules, not learning:
//! deep for planning-shaped input, shallow only for confident, calm,
//! early-session commands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth of reasoning applied to one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    Shallow,
    Standard,
    Deep,
}

impl ReasoningLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningLevel::Shallow => "shallow",
            ReasoningLevel::Standard => "standard",
            ReasoningLevel::Deep => "deep",
        }
    }
}

impl fmt::Display for ReasoningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to depth selection for one turn.
#[derive(Debug, Clone)]
pub struct DepthSignals<'a> {
    pub embedding_confidence: f64,
    pub ambiguity_score: f64,
    pub conversation_turn_count: usize,
    pub contains_planning_keywords: bool,
    pub user_input: &'a str,
    /// Tone label from the conversation layer; hostile tones forbid
    /// SHALLOW.
    pub emotion_state: &'a str,
    /// Ambiguity above this forces DEEP.
    pub deep_ambiguity_threshold: f64,
    /// Ambiguity below this permits SHALLOW.
    pub shallow_ambiguity_threshold: f64,
    /// Turn count at or below which SHALLOW is permitted.
    pub shallow_turn_floor: usize,
}

const MULTI_STEP_INDICATORS: &[&str] = &["then", "after that", "also", "finally", "next", "and then"];

/// Rule-based depth controller.
pub struct ReasoningDepthController;

impl ReasoningDepthController {
    /// Determine the reasoning level for one turn.
    #[must_use]
    pub fn determine_level(signals: &DepthSignals<'_>) -> ReasoningLevel {
        let lower = signals.user_input.to_lowercase();
        let has_multi_step = MULTI_STEP_INDICATORS
            .iter()
            .any(|indicator| lower.contains(indicator));

        if signals.contains_planning_keywords
            || signals.ambiguity_score > signals.deep_ambiguity_threshold
            || has_multi_step
        {
            return ReasoningLevel::Deep;
        }

        let shallow_eligible = signals.embedding_confidence >= 0.85
            && signals.ambiguity_score < signals.shallow_ambiguity_threshold
            && signals.conversation_turn_count <= signals.shallow_turn_floor
            && !signals.contains_planning_keywords;

        if shallow_eligible {
            if matches!(signals.emotion_state, "angry" | "frustrated" | "sarcastic" | "urgent") {
                return ReasoningLevel::Standard;
            }
            return ReasoningLevel::Shallow;
        }

        ReasoningLevel::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals<'a>(input: &'a str, confidence: f64) -> DepthSignals<'a> {
        DepthSignals {
            embedding_confidence: confidence,
            ambiguity_score: 1.0 - confidence,
            conversation_turn_count: 1,
            contains_planning_keywords: false,
            user_input: input,
            emotion_state: "neutral",
            deep_ambiguity_threshold: 0.5,
            shallow_ambiguity_threshold: 0.2,
            shallow_turn_floor: 2,
        }
    }

    #[test]
    fn confident_calm_early_turns_are_shallow() {
        let level = ReasoningDepthController::determine_level(&signals("open google", 0.92));
        assert_eq!(level, ReasoningLevel::Shallow);
    }

    #[test]
    fn planning_keywords_force_deep() {
        let mut s = signals("organize my downloads", 0.9);
        s.contains_planning_keywords = true;
        assert_eq!(
            ReasoningDepthController::determine_level(&s),
            ReasoningLevel::Deep
        );
    }

    #[test]
    fn multi_step_indicators_force_deep() {
        let level = ReasoningDepthController::determine_level(&signals(
            "create a.txt then open b.txt",
            0.9,
        ));
        assert_eq!(level, ReasoningLevel::Deep);
    }

    #[test]
    fn high_ambiguity_forces_deep() {
        let level = ReasoningDepthController::determine_level(&signals("do the thing", 0.3));
        assert_eq!(level, ReasoningLevel::Deep);
    }

    #[test]
    fn hostile_emotion_upgrades_shallow_to_standard() {
        let mut s = signals("open google", 0.92);
        s.emotion_state = "frustrated";
        assert_eq!(
            ReasoningDepthController::determine_level(&s),
            ReasoningLevel::Standard
        );
    }

    #[test]
    fn late_session_turns_are_standard() {
        let mut s = signals("open google", 0.92);
        s.conversation_turn_count = 5;
        assert_eq!(
            ReasoningDepthController::determine_level(&s),
            ReasoningLevel::Standard
        );
    }

    #[test]
    fn middling_confidence_is_standard() {
        let level = ReasoningDepthController::determine_level(&signals("open something", 0.7));
        assert_eq!(level, ReasoningLevel::Standard);
    }
}
