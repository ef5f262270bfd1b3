//! In-memory decision metrics.
//!
//! Counters, decision-source attribution, and running-average latencies
//! (`new_avg = (old_avg * n + sample) / (n + 1)`), O(1) space.

use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default)]
struct LatencyTracker {
    avg: f64,
    count: f64,
}

/// Lightweight in-memory metrics collector.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: BTreeMap<String, u64>,
    latencies: BTreeMap<String, LatencyTracker>,
    decision_sources: BTreeMap<String, u64>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        let mut collector = Self::default();
        for counter in [
            "total_commands",
            "semantic_calls",
            "embedding_calls",
            "refinement_calls",
            "clarification_triggers",
            "clarification_failures",
            "multi_intent_chains",
            "memory_resolutions",
            "normalization_applied",
            "conversation_adjustments",
            "tone_detected",
        ] {
            collector.counters.insert(counter.to_string(), 0);
        }
        for stage in ["semantic", "embedding", "total"] {
            collector
                .latencies
                .insert(stage.to_string(), LatencyTracker::default());
        }
        collector
    }

    pub fn increment(&mut self, counter: &str) {
        if let Some(value) = self.counters.get_mut(counter) {
            *value += 1;
        }
    }

    #[must_use]
    pub fn counter(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    pub fn increment_decision_source(&mut self, source: &str) {
        *self
            .decision_sources
            .entry(source.to_lowercase())
            .or_insert(0) += 1;
    }

    #[must_use]
    pub fn decision_source(&self, source: &str) -> u64 {
        self.decision_sources.get(source).copied().unwrap_or(0)
    }

    /// Fold one latency sample into the stage's running average.
    pub fn record_latency(&mut self, stage: &str, duration_ms: f64) {
        let Some(tracker) = self.latencies.get_mut(stage) else {
            return;
        };
        let new_count = tracker.count + 1.0;
        tracker.avg = (tracker.avg * tracker.count + duration_ms) / new_count;
        tracker.count = new_count;
    }

    #[must_use]
    pub fn average_latency(&self, stage: &str) -> f64 {
        self.latencies.get(stage).map_or(0.0, |t| t.avg)
    }

    /// Formatted report for the CLI's `metrics` command.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Internal Metrics:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for (name, value) in &self.counters {
            let _ = writeln!(out, "{name:<24} {value}");
        }
        let _ = writeln!(out, "{}", "-".repeat(30));
        for (stage, tracker) in &self.latencies {
            let _ = writeln!(out, "avg {stage} latency: {:.2} ms", tracker.avg);
        }
        let _ = writeln!(out, "{}", "-".repeat(30));
        let _ = writeln!(out, "Decision Sources:");
        if self.decision_sources.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (source, count) in &self.decision_sources {
            let _ = writeln!(out, "  {source}: {count}");
        }
        out
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_counters_are_ignored() {
        let mut metrics = MetricsCollector::new();
        metrics.increment("no_such_counter");
        assert_eq!(metrics.counter("no_such_counter"), 0);
    }

    #[test]
    fn running_average_matches_formula() {
        let mut metrics = MetricsCollector::new();
        metrics.record_latency("semantic", 10.0);
        metrics.record_latency("semantic", 20.0);
        metrics.record_latency("semantic", 30.0);
        assert!((metrics.average_latency("semantic") - 20.0).abs() < 1e-9);
    }

    #[test]
    fn decision_sources_accumulate() {
        let mut metrics = MetricsCollector::new();
        metrics.increment_decision_source("embedding");
        metrics.increment_decision_source("Embedding");
        metrics.increment_decision_source("semantic");
        assert_eq!(metrics.decision_source("embedding"), 2);
        assert_eq!(metrics.decision_source("semantic"), 1);
    }

    #[test]
    fn report_contains_counters_and_sources() {
        let mut metrics = MetricsCollector::new();
        metrics.increment("total_commands");
        metrics.increment_decision_source("regex");
        let report = metrics.report();
        assert!(report.contains("total_commands"));
        assert!(report.contains("regex: 1"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut metrics = MetricsCollector::new();
        metrics.increment("total_commands");
        metrics.record_latency("total", 5.0);
        metrics.reset();
        assert_eq!(metrics.counter("total_commands"), 0);
        assert_eq!(metrics.average_latency("total"), 0.0);
    }
}
