use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Previous-record hash of the first entry in a chain.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One row of the audit ledger.
///
/// Records are immutable once written. `extra` carries free-form fields
/// (simulation factors, trace excerpts) that are persisted but excluded
/// from chain hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub plan_id: String,
    pub deterministic_hash: String,
    pub simulation_result: String,
    pub final_state: String,
    /// Unix seconds.
    pub created_at: i64,
    pub trace_id: String,
    #[serde(default)]
    pub previous_record_hash: String,
    #[serde(default)]
    pub current_record_hash: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        plan_id: impl Into<String>,
        deterministic_hash: impl Into<String>,
        simulation_result: impl Into<String>,
        final_state: impl Into<String>,
    ) -> Self {
        let created_at = chrono::Utc::now().timestamp();
        Self {
            plan_id: plan_id.into(),
            deterministic_hash: deterministic_hash.into(),
            simulation_result: simulation_result.into(),
            final_state: final_state.into(),
            created_at,
            trace_id: format!("audit-{created_at}"),
            previous_record_hash: String::new(),
            current_record_hash: String::new(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// SHA-256 over the canonical hashed fields plus `previous_hash`.
    #[must_use]
    pub fn compute_record_hash(&self, previous_hash: &str) -> String {
        // BTreeMap serializes with sorted keys, giving a canonical form.
        let mut hashed: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        hashed.insert("plan_id", self.plan_id.clone().into());
        hashed.insert("deterministic_hash", self.deterministic_hash.clone().into());
        hashed.insert("simulation_result", self.simulation_result.clone().into());
        hashed.insert("final_state", self.final_state.clone().into());
        hashed.insert("created_at", self.created_at.into());
        hashed.insert("previous_record_hash", previous_hash.to_string().into());
        let canonical =
            serde_json::to_string(&hashed).expect("canonical entry serialization is infallible");
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// Outcome of a full chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainValidation {
    pub valid: bool,
    pub records_checked: usize,
    /// Index of the first discrepant record, if any.
    pub break_at: Option<usize>,
    pub error: Option<String>,
}

impl ChainValidation {
    #[must_use]
    pub fn ok(records_checked: usize) -> Self {
        Self {
            valid: true,
            records_checked,
            break_at: None,
            error: None,
        }
    }

    #[must_use]
    pub fn broken(records_checked: usize, break_at: usize, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            records_checked,
            break_at: Some(break_at),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_hash_is_deterministic() {
        let entry = AuditEntry::new("plan-1", "abc", "LOW", "FINISHED");
        let h1 = entry.compute_record_hash(GENESIS_HASH);
        let h2 = entry.compute_record_hash(GENESIS_HASH);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn record_hash_covers_previous_hash() {
        let entry = AuditEntry::new("plan-1", "abc", "LOW", "FINISHED");
        let h1 = entry.compute_record_hash(GENESIS_HASH);
        let h2 = entry.compute_record_hash(&"1".repeat(64));
        assert_ne!(h1, h2);
    }

    #[test]
    fn extra_fields_do_not_affect_hash() {
        let base = AuditEntry::new("plan-1", "abc", "LOW", "FINISHED");
        let with_extra = base
            .clone()
            .with_extra("risk_factors", serde_json::json!(["IRREVERSIBLE"]));
        assert_eq!(
            base.compute_record_hash(GENESIS_HASH),
            with_extra.compute_record_hash(GENESIS_HASH)
        );
    }
}
