//! End-to-end pipeline scenarios: classification through execution and
//! audit, with deterministic advisor and embedding doubles.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use warden_core::advisor::{Advisor, AdvisorRequest, NullAdvisor};
use warden_core::{Pipeline, WardenConfig};
use warden_exec::{Confirmer, StaticConfirmer};
use warden_intent::embedding::{EmbeddingBackend, EmbeddingError};

/// Backend that embeds everything to the zero vector: the router always
/// reports unknown and the cascade falls through to the rule stages.
struct ZeroBackend;

#[async_trait]
impl EmbeddingBackend for ZeroBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    fn unload(&self) {}

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
    }
}

/// Deterministic bag-of-words backend over a fixed vocabulary; overlap
/// with the default intent phrases drives real similarity scores.
struct VocabBackend;

const VOCAB: &[&str] = &[
    "create", "file", "delete", "remove", "open", "url", "website", "launch", "app", "search",
    "web", "install", "read", "write", "google", "spotify", "new", "make", "a", "the",
];

#[async_trait]
impl EmbeddingBackend for VocabBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    fn unload(&self) {}

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let tokens: Vec<&str> = lower
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                    .collect();
                VOCAB
                    .iter()
                    .map(|word| if tokens.contains(word) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

/// Advisor scripted to recommend a complex goal and propose a plan.
struct GoalAdvisor;

#[async_trait]
impl Advisor for GoalAdvisor {
    async fn analyze(&self, _request: AdvisorRequest<'_>) -> Value {
        json!({
            "intent": "complex_goal",
            "confidence": 0.9,
            "needs_confirmation": false,
            "reasoning": "multi-step goal detected",
        })
    }

    async fn propose_plan(&self, _goal: &str) -> Option<Value> {
        Some(json!([
            {
                "step_id": 1,
                "intent": "create_file",
                "parameters": {"path": "report.txt"},
                "description": "Create a report file"
            },
            {
                "step_id": 2,
                "intent": "open_url",
                "parameters": {"url": "https://example.com"},
                "description": "Open the reference page"
            },
            {
                "step_id": 3,
                "intent": "delete_file",
                "parameters": {},
                "description": "Remove the scratch file"
            },
            {
                "step_id": 4,
                "intent": "launch_app",
                "parameters": {"app_name": "spotify"},
                "description": "Launch the player"
            }
        ]))
    }
}

fn test_config(dir: &tempfile::TempDir) -> WardenConfig {
    let mut config = WardenConfig::default();
    config.gateway.ledger_path = dir
        .path()
        .join("audit.jsonl")
        .to_string_lossy()
        .into_owned();
    // Tests load the fixture backends regardless of host memory.
    config.resource_monitor.warn_threshold_gb = 0.0;
    config
}

fn pipeline_with(
    dir: &tempfile::TempDir,
    advisor: Arc<dyn Advisor>,
    backend: Arc<dyn EmbeddingBackend>,
    confirmer: Arc<dyn Confirmer>,
) -> Pipeline {
    Pipeline::new(test_config(dir), advisor, backend, confirmer).unwrap()
}

fn default_pipeline(dir: &tempfile::TempDir) -> Pipeline {
    pipeline_with(
        dir,
        Arc::new(NullAdvisor),
        Arc::new(ZeroBackend),
        Arc::new(StaticConfirmer(true)),
    )
}

#[tokio::test]
async fn direct_low_risk_execution_via_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(
        &dir,
        Arc::new(NullAdvisor),
        Arc::new(VocabBackend),
        Arc::new(StaticConfirmer(true)),
    );

    let result = pipeline.process_command("open https://google.com", false).await;
    assert!(result.success, "output: {}", result.output);

    let entries = pipeline.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].final_state, "FINISHED");
    assert!(pipeline.ledger().validate_chain().unwrap().valid);

    // A URL is not an app.
    assert!(pipeline.session_memory().last_opened_app.is_none());
    assert_eq!(pipeline.metrics.decision_source("embedding"), 1);
}

#[tokio::test]
async fn destructive_near_miss_is_refused_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("deleet file notes.txt", false).await;
    assert!(!result.success);
    assert!(result
        .output
        .contains("Did you mean 'delete'? Destructive commands must be typed explicitly."));

    // No plan, no ledger entry, no counter movement.
    assert!(pipeline.ledger().entries().unwrap().is_empty());
    assert_eq!(pipeline.metrics.counter("normalization_applied"), 0);
    assert_eq!(pipeline.watchdog.safety_violations, 0);
}

#[tokio::test]
async fn destructive_synonym_is_rejected_not_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("nuke my downloads", false).await;
    assert!(!result.success);
    assert!(result.output.contains("The term 'nuke' is destructive"));
    assert!(pipeline.ledger().entries().unwrap().is_empty());
}

#[tokio::test]
async fn clarification_loop_resolves_with_capped_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("create file", false).await;
    assert!(!result.success);
    assert!(result.output.contains("What should I name the new file?"));
    assert_eq!(pipeline.metrics.counter("clarification_triggers"), 1);

    let result = pipeline.process_command("notes.txt", false).await;
    assert!(result.success, "output: {}", result.output);
    assert_eq!(
        pipeline.session_memory().last_created_file.as_deref(),
        Some("notes.txt")
    );
    assert_eq!(pipeline.metrics.decision_source("clarification"), 1);

    let entries = pipeline.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].final_state, "FINISHED");
}

#[tokio::test]
async fn three_invalid_clarification_answers_abort() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let _ = pipeline.process_command("create file", false).await;
    // Answers with forbidden characters stay invalid.
    let first = pipeline.process_command("bad|name", false).await;
    assert!(first.output.starts_with("Invalid input."));
    let _ = pipeline.process_command("x", false).await;
    let last = pipeline.process_command("???|", false).await;
    assert!(last
        .output
        .contains("Too many failed clarification attempts. Aborting."));
    assert_eq!(pipeline.metrics.counter("clarification_failures"), 1);
}

#[tokio::test]
async fn refinement_mutates_previous_intent() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("create file notes.txt", false).await;
    assert!(result.success, "output: {}", result.output);

    let result = pipeline.process_command("rename to draft.txt", false).await;
    assert!(result.success, "output: {}", result.output);
    assert_eq!(
        pipeline.session_memory().last_created_file.as_deref(),
        Some("draft.txt")
    );
    assert_eq!(pipeline.metrics.counter("refinement_calls"), 1);
    assert_eq!(pipeline.metrics.decision_source("refinement"), 1);
}

#[tokio::test]
async fn confirmation_denial_is_cancellation_with_audit() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(
        &dir,
        Arc::new(NullAdvisor),
        Arc::new(ZeroBackend),
        Arc::new(StaticConfirmer(false)),
    );

    let result = pipeline.process_command("delete file notes.txt", false).await;
    assert!(!result.success);
    assert!(result.cancelled);

    let entries = pipeline.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].final_state, "DENIED");
    // Denial is cancellation, not an execution failure.
    assert_eq!(pipeline.watchdog.execution_failures, 0);
}

#[tokio::test]
async fn orchestrated_goal_runs_each_step_through_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(
        &dir,
        Arc::new(GoalAdvisor),
        Arc::new(ZeroBackend),
        Arc::new(StaticConfirmer(true)),
    );

    let result = pipeline
        .process_command("organize my downloads folder", false)
        .await;
    assert!(result.success, "output: {}", result.output);
    assert!(result.output.contains("Autonomous Task Result: SUCCESS"));
    // Step 3 has no path and fails planning; the run continues.
    assert!(result.output.contains("Remove the scratch file: failed"));
    assert!(result.output.contains("steps_executed=3"));

    // Successful steps each produced one audit entry.
    let entries = pipeline.ledger().entries().unwrap();
    assert_eq!(entries.len(), 3);
    assert!(pipeline.ledger().validate_chain().unwrap().valid);
    assert!(pipeline.watchdog.advisor_escalations >= 1);
}

#[tokio::test]
async fn introspection_bypasses_counters() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("status", false).await;
    assert!(result.success);
    assert!(result.output.contains("Pending Clarification: No"));

    let result = pipeline.process_command("metrics", false).await;
    assert!(result.success);

    assert_eq!(pipeline.metrics.counter("total_commands"), 0);
    assert_eq!(pipeline.watchdog.total_commands_processed, 0);
}

#[tokio::test]
async fn unknown_gibberish_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.process_command("florble the wuzzle", false).await;
    assert!(!result.success);
    assert!(result.output.contains("Could not understand command"));
    assert!(pipeline.ledger().entries().unwrap().is_empty());
}

#[tokio::test]
async fn compound_commands_execute_in_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline
        .process_command("create file a.txt and then open https://example.com", false)
        .await;
    assert!(result.success, "output: {}", result.output);
    assert_eq!(pipeline.metrics.counter("multi_intent_chains"), 1);
    assert_eq!(pipeline.ledger().entries().unwrap().len(), 2);
}

#[tokio::test]
async fn simulate_is_a_dry_run_without_audit() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline.simulate_command("delete file notes.txt").await;
    assert!(result.success, "output: {}", result.output);
    assert!(result.output.contains("DRY RUN"));
    assert!(result.output.contains("IRREVERSIBLE"));
    assert!(pipeline.ledger().entries().unwrap().is_empty());
}

#[tokio::test]
async fn conversational_filler_is_stripped_before_classification() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = default_pipeline(&dir);

    let result = pipeline
        .process_command("can you create file plan.txt", false)
        .await;
    assert!(result.success, "output: {}", result.output);
    assert_eq!(pipeline.metrics.counter("conversation_adjustments"), 1);
    assert_eq!(
        pipeline.session_memory().last_created_file.as_deref(),
        Some("plan.txt")
    );
}
