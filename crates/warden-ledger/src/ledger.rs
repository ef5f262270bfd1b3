use crate::entry::{AuditEntry, ChainValidation, GENESIS_HASH};
use crate::LedgerError;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only JSONL ledger with a tamper-evident hash chain.
///
/// The chain head is recovered from the file on open, so a ledger
/// survives process restarts. Writes are strictly sequential; one entry
/// is appended per plan attempt regardless of outcome.
pub struct AuditLedger {
    path: PathBuf,
    last_record_hash: String,
}

impl AuditLedger {
    /// Open (or create) the ledger at `path` and recover the chain head.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let last_record_hash = Self::read_last_hash(&path)?;
        Ok(Self {
            path,
            last_record_hash,
        })
    }

    fn read_last_hash(path: &Path) -> Result<String, LedgerError> {
        if !path.exists() {
            return Ok(GENESIS_HASH.to_string());
        }
        let file = fs::File::open(path)?;
        let mut last = GENESIS_HASH.to_string();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(trimmed)?;
            last = entry.current_record_hash;
        }
        Ok(last)
    }

    /// Append an entry, linking it into the chain. Returns the record hash.
    pub fn record_entry(&mut self, mut entry: AuditEntry) -> Result<String, LedgerError> {
        entry.previous_record_hash = self.last_record_hash.clone();
        entry.current_record_hash = entry.compute_record_hash(&self.last_record_hash);

        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        self.last_record_hash = entry.current_record_hash.clone();
        tracing::info!(
            plan_id = %entry.plan_id,
            state = %entry.final_state,
            chain_hash = %&entry.current_record_hash[..16],
            "audit entry recorded"
        );
        Ok(entry.current_record_hash)
    }

    /// Walk the whole file, verifying linkage and recomputing every hash.
    ///
    /// Stops at the first discrepancy.
    pub fn validate_chain(&self) -> Result<ChainValidation, LedgerError> {
        if !self.path.exists() {
            return Ok(ChainValidation::ok(0));
        }

        let file = fs::File::open(&self.path)?;
        let mut previous_hash = GENESIS_HASH.to_string();
        let mut records_checked = 0usize;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(trimmed)?;
            records_checked += 1;

            if entry.previous_record_hash != previous_hash {
                tracing::error!(record = index, "chain broken: previous-hash mismatch");
                return Ok(ChainValidation::broken(
                    records_checked,
                    index,
                    format!("previous hash mismatch at record {index}"),
                ));
            }

            let expected = entry.compute_record_hash(&previous_hash);
            if expected != entry.current_record_hash {
                tracing::error!(record = index, "chain broken: content hash mismatch");
                return Ok(ChainValidation::broken(
                    records_checked,
                    index,
                    format!("content hash mismatch at record {index}"),
                ));
            }

            previous_hash = entry.current_record_hash;
        }

        tracing::info!(records = records_checked, "audit chain verified");
        Ok(ChainValidation::ok(records_checked))
    }

    /// All entries recorded for a specific plan.
    pub fn plan_history(&self, plan_id: &str) -> Result<Vec<AuditEntry>, LedgerError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.plan_id == plan_id)
            .collect())
    }

    /// Read the entire ledger.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            out.push(serde_json::from_str(trimmed)?);
        }
        Ok(out)
    }

    /// Current chain head.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.last_record_hash
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
