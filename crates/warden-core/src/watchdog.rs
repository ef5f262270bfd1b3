//! Session-scoped integrity watchdog.
//!
//! Purely event-driven counters plus anomaly detection: a rolling window
//! of malformed advisor outputs, escalation-loop detection over the last
//! three advisory intents, and a composite health status.

use crate::depth::ReasoningLevel;
use serde_json::{json, Value};
use std::collections::VecDeque;

const MALFORMED_WINDOW: usize = 10;

#[derive(Debug, Clone)]
struct TurnRecord {
    intent: String,
    success: bool,
    reasoning: ReasoningLevel,
}

/// Composite health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

/// Monitors internal system health and detects anomalies.
#[derive(Debug, Default)]
pub struct IntegrityWatchdog {
    pub total_commands_processed: u64,
    pub advisor_escalations: u64,
    pub compression_events: u64,
    pub malformed_advisor_outputs: u64,
    pub safety_violations: u64,
    pub execution_failures: u64,
    pub escalation_loops_detected: u64,
    shallow_count: u64,
    standard_count: u64,
    deep_count: u64,
    malformed_window: VecDeque<bool>,
    history: Vec<TurnRecord>,
}

impl IntegrityWatchdog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a new command entering the pipeline.
    pub fn record_command(&mut self) {
        self.total_commands_processed += 1;
        if self.malformed_window.len() == MALFORMED_WINDOW {
            self.malformed_window.pop_front();
        }
        self.malformed_window.push_back(false);
        self.history.push(TurnRecord {
            intent: "unknown".to_string(),
            success: false,
            reasoning: ReasoningLevel::Shallow,
        });
    }

    pub fn record_reasoning_level(&mut self, level: ReasoningLevel) {
        match level {
            ReasoningLevel::Shallow => self.shallow_count += 1,
            ReasoningLevel::Standard => self.standard_count += 1,
            ReasoningLevel::Deep => self.deep_count += 1,
        }
        if let Some(last) = self.history.last_mut() {
            last.reasoning = level;
        }
    }

    pub fn record_escalation(&mut self) {
        self.advisor_escalations += 1;
    }

    pub fn record_compression(&mut self) {
        self.compression_events += 1;
    }

    pub fn record_malformed_advisor_output(&mut self) {
        self.malformed_advisor_outputs += 1;
        if let Some(last) = self.malformed_window.back_mut() {
            *last = true;
        }
        tracing::warn!(
            total = self.malformed_advisor_outputs,
            "malformed advisor output detected"
        );
    }

    pub fn record_safety_violation(&mut self) {
        self.safety_violations += 1;
        tracing::warn!(total = self.safety_violations, "safety violation recorded");
    }

    pub fn record_execution_failure(&mut self) {
        self.execution_failures += 1;
        if let Some(last) = self.history.last_mut() {
            last.success = false;
        }
    }

    pub fn record_execution_success(&mut self, intent: &str) {
        if let Some(last) = self.history.last_mut() {
            last.intent = intent.to_string();
            last.success = true;
        }
    }

    /// Detect a repeating advisory recommendation that never succeeds.
    ///
    /// Rule: the last three advisor intents are identical, none executed
    /// successfully, and at least one turn ran above SHALLOW.
    pub fn detect_escalation_loop(&mut self, recommended_intent: &str) {
        if let Some(last) = self.history.last_mut() {
            last.intent = recommended_intent.to_string();
        }
        if self.history.len() < 3 {
            return;
        }
        let last_three = &self.history[self.history.len() - 3..];
        let all_same = last_three
            .iter()
            .all(|r| r.intent == recommended_intent && r.intent != "unknown");
        let none_succeeded = last_three.iter().all(|r| !r.success);
        let any_above_shallow = last_three
            .iter()
            .any(|r| r.reasoning != ReasoningLevel::Shallow);
        if all_same && none_succeeded && any_above_shallow {
            self.escalation_loops_detected += 1;
            tracing::error!(intent = recommended_intent, "escalation loop detected");
        }
    }

    #[must_use]
    pub fn malformed_in_window(&self) -> usize {
        self.malformed_window.iter().filter(|b| **b).count()
    }

    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        let window_rate = self.malformed_in_window();
        if self.safety_violations > 5 || self.malformed_advisor_outputs > 6 {
            HealthStatus::Critical
        } else if window_rate > 3
            || self.escalation_loops_detected > 0
            || self.execution_failures > 3
        {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// Full health report with anomalies.
    #[must_use]
    pub fn generate_health_report(&self) -> Value {
        let mut anomalies = Vec::new();
        if self.malformed_in_window() > 3 {
            anomalies.push("High malformed advisor rate (last 10 commands)".to_string());
        }
        if self.escalation_loops_detected > 0 {
            anomalies.push("Escalation loop detected".to_string());
        }
        if self.safety_violations > 0 {
            anomalies.push(format!(
                "Safety violations detected ({})",
                self.safety_violations
            ));
        }
        if self.execution_failures > 3 {
            anomalies.push("Excessive execution failures".to_string());
        }

        json!({
            "status": self.health_status().as_str(),
            "metrics": {
                "commands": self.total_commands_processed,
                "escalations": self.advisor_escalations,
                "compression_events": self.compression_events,
                "malformed_advisor_outputs": self.malformed_advisor_outputs,
                "safety_violations": self.safety_violations,
                "execution_failures": self.execution_failures,
                "reasoning_distribution": {
                    "shallow": self.shallow_count,
                    "standard": self.standard_count,
                    "deep": self.deep_count,
                },
                "escalation_loops": self.escalation_loops_detected,
            },
            "anomalies": anomalies,
        })
    }
}
