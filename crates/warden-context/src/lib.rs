//! Volatile per-session context.
//!
//! [`SessionMemory`] tracks the artifacts of verified executions for
//! explicit reference resolution ("open the last file") and the
//! interaction history the advisor sees. [`ContextCompressor`] bounds
//! that history while preserving safety-tagged turns, and
//! [`LanguageMirror`] keeps system messages in the user's language.

mod compressor;
mod history;
mod language;
mod memory;

pub use compressor::{CompressionConfig, ContextCompressor};
pub use history::{CommandHistory, ExecutionHistory, ExecutionRecord};
pub use language::LanguageMirror;
pub use memory::{InteractionTurn, SessionMemory};
