//! Pipeline orchestration.
//!
//! Wires the full governance flow: raw utterance → normalization →
//! conversational shaping → classification cascade → reasoning depth and
//! advisory escalation → planning → risk simulation → gated execution →
//! audit ledger. Failures at any stage short-circuit the remainder.

pub mod advisor;
pub mod config;
pub mod depth;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod watchdog;

pub use advisor::{Advisor, AdvisorReport, AdvisorRequest, AdvisorVerdict};
pub use config::WardenConfig;
pub use depth::{ReasoningDepthController, ReasoningLevel};
pub use metrics::MetricsCollector;
pub use orchestrator::{OrchestrationResult, TaskOrchestrator};
pub use pipeline::{Pipeline, PipelineResult};
pub use watchdog::IntegrityWatchdog;
