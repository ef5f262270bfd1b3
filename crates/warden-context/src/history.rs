//! Bounded command and execution history rings backing the CLI's
//! `history` and `logs` commands.

use std::collections::VecDeque;

/// Recent raw commands with their outcomes.
#[derive(Debug)]
pub struct CommandHistory {
    entries: VecDeque<(String, bool)>,
    max_size: usize,
}

impl CommandHistory {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add(&mut self, command: impl Into<String>, success: bool) {
        if self.entries.len() == self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back((command.into(), success));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent first.
    #[must_use]
    pub fn recent(&self, count: Option<usize>) -> Vec<(String, bool)> {
        let take = count.unwrap_or(self.entries.len());
        self.entries.iter().rev().take(take).cloned().collect()
    }
}

/// One recorded plan execution.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub plan_id: String,
    pub command: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Recent plan executions.
#[derive(Debug)]
pub struct ExecutionHistory {
    entries: VecDeque<ExecutionRecord>,
    max_size: usize,
}

impl ExecutionHistory {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add(&mut self, record: ExecutionRecord) {
        if self.entries.len() == self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    #[must_use]
    pub fn recent(&self, count: Option<usize>) -> Vec<ExecutionRecord> {
        let take = count.unwrap_or(self.entries.len());
        self.entries.iter().rev().take(take).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let mut history = CommandHistory::new(3);
        for i in 0..5 {
            history.add(format!("cmd {i}"), true);
        }
        assert_eq!(history.len(), 3);
        let recent = history.recent(None);
        assert_eq!(recent[0].0, "cmd 4");
        assert_eq!(recent[2].0, "cmd 2");
    }

    #[test]
    fn recent_respects_count() {
        let mut history = CommandHistory::new(10);
        history.add("a", true);
        history.add("b", false);
        let recent = history.recent(Some(1));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0], ("b".to_string(), false));
    }

    #[test]
    fn execution_history_keeps_records() {
        let mut history = ExecutionHistory::new(2);
        for i in 0..3 {
            history.add(ExecutionRecord {
                plan_id: format!("p{i}"),
                command: "x".into(),
                success: true,
                duration_ms: 5,
                error: None,
            });
        }
        let recent = history.recent(None);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].plan_id, "p2");
    }
}
