//! Input shaping and the intent classification cascade.
//!
//! Utterances pass through deterministic transforms before any
//! classification: the [`NormalizationEngine`] (typo correction with a
//! destructive-keyword guard) and the [`ConversationLayer`] (filler
//! stripping, synonym mapping, tone detection). Classification then runs
//! as a strict priority cascade (pending clarification, refinement,
//! embedding, rule-based semantics, regex fallback) and every surviving
//! command is feasibility-checked before execution.
//!
//! The destructive-keyword guard is the safety cornerstone: no input that
//! trips it is ever transformed into an executable destructive command.

pub mod clarify;
pub mod command;
pub mod conversation;
pub mod embedding;
pub mod extract;
pub mod fallback;
pub mod feasibility;
pub mod normalize;
pub mod refine;
pub mod semantic;

pub use clarify::{ClarificationManager, ClarificationOutcome};
pub use command::{Command, DecisionSource};
pub use conversation::{ConversationLayer, ConversationResult};
pub use embedding::{EmbeddingBackend, EmbeddingClassification, EmbeddingRouter, RouterConfig};
pub use feasibility::{FeasibilityResult, FeasibilityValidator};
pub use normalize::{NormalizationEngine, NormalizationResult};
pub use refine::{PriorIntent, RefinementEngine};
pub use semantic::{SemanticEngine, SemanticIntent, SemanticResult};
