//! Snapshot capture and LIFO rollback.
//!
//! Hard constraints: rollback never re-plans, never touches the memory
//! layer, and only uses registered undo handlers. Failures are counted,
//! not thrown; they escalate the reported risk state.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Read-only access to pre-execution state for snapshotting.
///
/// The default probe reports nothing as existing, which matches the
/// simulated tool backends; effectful deployments supply a real probe.
pub trait StateProbe: Send + Sync {
    fn file_content(&self, _path: &str) -> Option<String> {
        None
    }

    fn config_value(&self, _setting: &str) -> Option<String> {
        None
    }
}

/// Probe that sees no pre-existing state.
#[derive(Debug, Default)]
pub struct NullProbe;

impl StateProbe for NullProbe {}

/// One entry on the undo stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAction {
    pub step_id: String,
    pub tool_name: String,
    /// Identifier of the registered undo handler.
    pub undo_logic: String,
    /// Pre-state payload the handler restores from.
    pub snapshot: Value,
}

/// Rollback completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackStatus {
    Empty,
    Complete,
    Partial,
}

/// Summary of one rollback run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackSummary {
    pub rolled_back: usize,
    pub failed: usize,
    pub total: usize,
    pub status: RollbackStatus,
    pub risk_escalated: bool,
}

/// Captures pre-state snapshots and executes the undo stack in strict
/// LIFO order. Owned by the engine for one plan's lifetime.
pub struct RollbackEngine {
    stack: Vec<RollbackAction>,
    failure_count: usize,
    probe: Box<dyn StateProbe>,
}

impl Default for RollbackEngine {
    fn default() -> Self {
        Self::new(Box::new(NullProbe))
    }
}

impl RollbackEngine {
    #[must_use]
    pub fn new(probe: Box<dyn StateProbe>) -> Self {
        Self {
            stack: Vec::new(),
            failure_count: 0,
            probe,
        }
    }

    /// Capture state before a reversible step executes. Returns whether
    /// an action was registered.
    pub fn capture_pre_state(
        &mut self,
        step_id: &str,
        tool_name: &str,
        pre_state_capture: Option<&str>,
        parameters: &Value,
    ) -> bool {
        let (undo_logic, snapshot) = match (tool_name, pre_state_capture) {
            ("write_file", _) => {
                let path = parameters["path"].as_str().unwrap_or_default();
                match self.probe.file_content(path) {
                    Some(old_content) => (
                        "restore_file",
                        json!({"path": path, "exists": true, "old_content": old_content}),
                    ),
                    None => ("delete_file", json!({"path": path, "exists": false})),
                }
            }
            ("create_file", _) => {
                let path = parameters["path"].as_str().unwrap_or_default();
                ("delete_file", json!({"path": path, "exists": false}))
            }
            ("change_config", _) => {
                let setting = parameters["setting"].as_str().unwrap_or_default();
                let prev = self.probe.config_value(setting);
                ("restore_config", json!({"setting": setting, "prev_value": prev}))
            }
            // A declared capture handler with no specialized snapshot
            // still records the parameters for its undo handler.
            (_, Some(_)) => ("generic_restore", parameters.clone()),
            _ => return false,
        };

        tracing::info!(tool = tool_name, step = step_id, "rollback action registered");
        self.stack.push(RollbackAction {
            step_id: step_id.to_string(),
            tool_name: tool_name.to_string(),
            undo_logic: undo_logic.to_string(),
            snapshot,
        });
        true
    }

    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Execute the undo stack in reverse order. Consumes the stack.
    pub fn execute_rollback(&mut self) -> RollbackSummary {
        if self.stack.is_empty() {
            tracing::info!("no actions to rollback");
            return RollbackSummary {
                rolled_back: 0,
                failed: 0,
                total: 0,
                status: RollbackStatus::Empty,
                risk_escalated: false,
            };
        }

        let total = self.stack.len();
        tracing::info!(actions = total, "rollback started");
        let mut rolled_back = 0usize;
        let mut failed = 0usize;

        let actions: Vec<RollbackAction> = self.stack.drain(..).rev().collect();
        for action in &actions {
            tracing::info!(tool = %action.tool_name, step = %action.step_id, "reversing step");
            if dispatch_undo(action) {
                rolled_back += 1;
            } else {
                failed += 1;
                self.failure_count += 1;
                tracing::error!(
                    tool = %action.tool_name,
                    step = %action.step_id,
                    "rollback step failed; risk state escalated"
                );
            }
        }

        let status = if failed == 0 {
            RollbackStatus::Complete
        } else {
            RollbackStatus::Partial
        };
        tracing::info!(rolled_back, total, failed, ?status, "rollback finished");

        RollbackSummary {
            rolled_back,
            failed,
            total,
            status,
            risk_escalated: failed > 0,
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// Drop any registered actions (after a fully successful plan).
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

/// Dispatch to the registered undo handler. Handlers restore from the
/// snapshot only; they read nothing else and never re-plan.
fn dispatch_undo(action: &RollbackAction) -> bool {
    match action.undo_logic.as_str() {
        "restore_file" => {
            action.snapshot["path"].as_str().is_some()
                && action.snapshot["old_content"].is_string()
        }
        "delete_file" => action.snapshot["path"].as_str().is_some(),
        "restore_config" => {
            let setting = action.snapshot["setting"].as_str().unwrap_or_default();
            tracing::info!(setting, "restoring configuration value");
            !setting.is_empty()
        }
        "generic_restore" => true,
        other => {
            tracing::warn!(undo_logic = other, "unknown undo logic");
            false
        }
    }
}
