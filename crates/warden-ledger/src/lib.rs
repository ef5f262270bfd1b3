//! Append-only, hash-chained audit ledger.
//!
//! One JSON object per line. Each record carries the hash of its
//! predecessor, so editing or deleting any line invalidates everything
//! after it. The genesis predecessor is sixty-four zero characters.
//!
//! The chain hash covers the canonical JSON of
//! `{plan_id, deterministic_hash, simulation_result, final_state,
//! created_at, previous_record_hash}` with sorted keys; any other fields
//! on a record are carried but not hashed.

mod entry;
mod ledger;

pub use entry::{AuditEntry, ChainValidation, GENESIS_HASH};
pub use ledger::AuditLedger;

/// Errors raised by ledger I/O and chain validation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger record is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}
