//! The full governance pipeline.
//!
//! One utterance flows raw input → introspection → normalization →
//! conversational shaping → reference resolution → classification
//! cascade → depth selection and advisory escalation → feasibility →
//! planning → policy gate → gated execution → ledger. Failures at any
//! stage short-circuit the remainder; the destructive-token guard can
//! refuse before any counter moves.

use crate::advisor::{Advisor, AdvisorRequest, AdvisorVerdict};
use crate::config::WardenConfig;
use crate::depth::{DepthSignals, ReasoningDepthController, ReasoningLevel};
use crate::metrics::MetricsCollector;
use crate::orchestrator::{OrchestrationResult, StepOutcome, StepRunner, TaskOrchestrator};
use crate::watchdog::IntegrityWatchdog;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use warden_context::{
    CommandHistory, CompressionConfig, ContextCompressor, ExecutionHistory, ExecutionRecord,
    InteractionTurn, LanguageMirror, SessionMemory,
};
use warden_exec::{
    Confirmer, ExecutionEngine, ExecutionGateway, FinalState, KillSwitch, PermissionChecker,
    RiskSimulator,
};
use warden_intent::{
    clarify::ClarificationOutcome, extract, fallback, ClarificationManager, Command,
    ConversationLayer, DecisionSource, EmbeddingBackend, EmbeddingRouter, FeasibilityValidator,
    NormalizationEngine, PriorIntent, RefinementEngine, RouterConfig, SemanticEngine,
};
use warden_ledger::AuditLedger;
use warden_plan::{ExecutionPlanner, PlanDecision, PlanError};
use warden_policy::{CapabilityRegistry, PolicyEngine, SafetyPolicyRegistry};
use warden_tools::ToolRegistry;

/// Result of one pipeline turn.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    pub output: String,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl PipelineResult {
    fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            cancelled: false,
            error: None,
        }
    }

    fn fail(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            cancelled: false,
            error: Some(error.into()),
        }
    }

    fn cancel(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            cancelled: true,
            error: Some(error.into()),
        }
    }
}

/// Errors raised while constructing a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Policy(#[from] warden_policy::PolicyError),

    #[error(transparent)]
    Tool(#[from] warden_tools::ToolError),

    #[error(transparent)]
    Ledger(#[from] warden_ledger::LedgerError),
}

/// Full pipeline orchestrator. One instance per session.
pub struct Pipeline {
    config: WardenConfig,
    normalization: NormalizationEngine,
    conversation: ConversationLayer,
    semantic: SemanticEngine,
    embedding: EmbeddingRouter,
    clarification: ClarificationManager,
    refinement: RefinementEngine,
    feasibility: FeasibilityValidator,
    session_memory: SessionMemory,
    compressor: ContextCompressor,
    command_history: CommandHistory,
    execution_history: ExecutionHistory,
    planner: ExecutionPlanner,
    gateway: ExecutionGateway,
    policies: Arc<SafetyPolicyRegistry>,
    capabilities: Arc<CapabilityRegistry>,
    policy_engine: PolicyEngine,
    advisor: Arc<dyn Advisor>,
    confirmer: Arc<dyn Confirmer>,
    kill_switch: Option<KillSwitch>,
    pub watchdog: IntegrityWatchdog,
    pub metrics: MetricsCollector,
    last_intent: Option<PriorIntent>,
}

impl Pipeline {
    /// Wire every subsystem. Registries are populated and locked here;
    /// nothing mutates them afterwards.
    pub fn new(
        config: WardenConfig,
        advisor: Arc<dyn Advisor>,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Result<Self, PipelineError> {
        let tools = Arc::new(ToolRegistry::with_builtins()?);
        let policies = Arc::new(SafetyPolicyRegistry::with_defaults());
        let capabilities = Arc::new(CapabilityRegistry::with_defaults()?);
        let policy_engine = PolicyEngine::new(Arc::clone(&capabilities));

        let router_config = RouterConfig {
            model: config.embedding.model.clone(),
            lazy_load: config.embedding.lazy_load,
            confidence_threshold: config.embedding.confidence_threshold,
            mid_confidence_threshold: config.embedding.mid_confidence_threshold,
            unload_after_seconds: config.embedding.unload_after_seconds,
            device: config.embedding.device.clone(),
            warn_threshold_gb: config.resource_monitor.warn_threshold_gb,
        };

        let planner = ExecutionPlanner::new(Arc::clone(&tools));
        let engine = ExecutionEngine::new(Arc::clone(&tools), Arc::clone(&policies));
        let simulator = RiskSimulator::new(Arc::clone(&policies));
        let permissions = PermissionChecker::new(config.gateway.trust_score);
        let ledger = AuditLedger::open(&config.gateway.ledger_path)?;
        let gateway = ExecutionGateway::new(engine, simulator, permissions, ledger);

        let compressor = ContextCompressor::new(CompressionConfig {
            trigger_turns: config.compression.trigger_turns,
            preserve_recent: config.compression.preserve_recent,
        });

        tracing::info!("pipeline initialized");
        Ok(Self {
            normalization: NormalizationEngine::new(),
            conversation: ConversationLayer::new(),
            semantic: SemanticEngine::new(),
            embedding: EmbeddingRouter::new(embedding_backend, router_config),
            clarification: ClarificationManager::new(),
            refinement: RefinementEngine::new(),
            feasibility: FeasibilityValidator::new(),
            session_memory: SessionMemory::new(),
            compressor,
            command_history: CommandHistory::new(20),
            execution_history: ExecutionHistory::new(10),
            planner,
            gateway,
            policies,
            capabilities,
            policy_engine,
            advisor,
            confirmer,
            kill_switch: None,
            watchdog: IntegrityWatchdog::new(),
            metrics: MetricsCollector::new(),
            last_intent: None,
            config,
        })
    }

    /// Install the externally-asserted abort predicate.
    pub fn set_kill_switch(&mut self, kill_switch: KillSwitch) {
        self.kill_switch = Some(kill_switch);
    }

    #[must_use]
    pub fn ledger(&self) -> &AuditLedger {
        self.gateway.ledger()
    }

    #[must_use]
    pub fn history(&self, count: Option<usize>) -> Vec<(String, bool)> {
        self.command_history.recent(count)
    }

    #[must_use]
    pub fn logs(&self, count: Option<usize>) -> Vec<ExecutionRecord> {
        self.execution_history.recent(count)
    }

    #[must_use]
    pub fn session_memory(&self) -> &SessionMemory {
        &self.session_memory
    }

    /// Process one utterance through the full pipeline.
    pub async fn process_command(&mut self, user_input: &str, auto_confirm: bool) -> PipelineResult {
        // Introspection interceptors run before any counter moves.
        match user_input.trim().to_lowercase().as_str() {
            "status" => return self.handle_status(),
            "pending" => return self.handle_pending(),
            "last_intent" => return self.handle_last_intent(),
            "explain" => return self.handle_explain(),
            "metrics" => return PipelineResult::ok(self.metrics.report()),
            _ => {}
        }

        self.watchdog.record_command();
        self.session_memory
            .add_interaction(InteractionTurn::new("user", user_input));

        let detected_lang = LanguageMirror::detect_language(user_input);
        self.session_memory.update_language_preference(detected_lang);
        let language = if detected_lang == "en"
            && self.session_memory.preferred_language() != "en"
            && user_input.trim().len() < 10
        {
            self.session_memory.preferred_language().to_string()
        } else {
            detected_lang.to_string()
        };

        // Normalization, with the destructive-keyword guard.
        let norm = self.normalization.normalize(user_input);
        if let Some(keyword) = norm.dangerous_token_detected {
            tracing::warn!(keyword = %keyword, input = user_input, "destructive near-miss refused");
            return self.wrap(
                PipelineResult::fail(
                    format!(
                        "Did you mean '{keyword}'? Destructive commands must be typed explicitly."
                    ),
                    "Dangerous token detected",
                ),
                &language,
            );
        }
        let mut input = if norm.was_modified {
            tracing::info!(delta = %norm.delta, "input normalised");
            self.metrics.increment("normalization_applied");
            norm.normalized
        } else {
            user_input.to_string()
        };

        // Conversational shaping.
        let conv = self.conversation.process(&input);
        if conv.clarification_needed {
            let term = conv.dangerous_synonym.as_deref().unwrap_or("unknown");
            tracing::warn!(term, "destructive synonym refused");
            return self.wrap(
                PipelineResult::fail(
                    format!("The term '{term}' is destructive. Please use an explicit supported command."),
                    "Destructive synonym detected",
                ),
                &language,
            );
        }
        if conv.was_modified {
            input = conv.cleaned.clone();
        }
        if conv.filler_stripped || conv.synonym_mapped {
            self.metrics.increment("conversation_adjustments");
        }
        if conv.tone != warden_intent::conversation::Tone::Neutral {
            self.metrics.increment("tone_detected");
        }
        let confidence_modifier = conv.confidence_modifier;

        // Explicit reference resolution against session memory.
        let (resolved, resolved_any) = self.session_memory.resolve_reference(&input);
        if resolved_any {
            self.metrics.increment("memory_resolutions");
            input = resolved;
        }

        let turn_started = Instant::now();
        self.metrics.increment("total_commands");

        let mut commands: Vec<Command> = Vec::new();

        // Stage B: a pending clarification consumes this utterance.
        if self.clarification.has_pending() {
            match self.clarification.resolve(&input) {
                Some(ClarificationOutcome::Resolved(command)) => {
                    commands.push(command);
                }
                Some(ClarificationOutcome::Retry { question, .. }) => {
                    return self.wrap(
                        PipelineResult::fail(
                            format!("Invalid input. {question}"),
                            "Clarification Validation Failed",
                        ),
                        &language,
                    );
                }
                Some(ClarificationOutcome::Aborted) => {
                    self.metrics.increment("clarification_failures");
                    return self.wrap(
                        PipelineResult::fail(
                            "Too many failed clarification attempts. Aborting.",
                            "Clarification Aborted",
                        ),
                        &language,
                    );
                }
                None => {}
            }
        }

        // Stage C: refinement of the previous successful intent.
        if commands.is_empty() {
            if let Some(prior) = &self.last_intent {
                if let Some(refined) = self.refinement.refine(&input, prior) {
                    self.metrics.increment("refinement_calls");
                    commands.push(refined);
                }
            }
        }

        // Stage D: embedding router, authoritative when non-unknown.
        let mut embedding_confidence = 0.0;
        let mut embedding_escalation = false;
        if commands.is_empty() {
            let embed_started = Instant::now();
            let classification = self.embedding.classify(&input).await;
            self.metrics
                .record_latency("embedding", embed_started.elapsed().as_secs_f64() * 1000.0);
            self.metrics.increment("embedding_calls");
            embedding_confidence = classification.confidence;
            embedding_escalation = classification.requires_escalation;

            if classification.intent != "unknown" {
                tracing::info!(
                    intent = %classification.intent,
                    confidence = classification.confidence,
                    escalation = classification.requires_escalation,
                    "embedding router classified"
                );
                let entities = extract::extract_parameters(&classification.intent, &input);
                commands.push(Command::new(
                    input.clone(),
                    classification.intent,
                    entities,
                    classification.confidence * confidence_modifier,
                    DecisionSource::Embedding,
                ));
            }
        }

        // Reasoning depth for this turn.
        let has_planning = self.config.contains_planning_keywords(&input);
        let level = ReasoningDepthController::determine_level(&DepthSignals {
            embedding_confidence,
            ambiguity_score: 1.0 - embedding_confidence,
            conversation_turn_count: self.command_history.len(),
            contains_planning_keywords: has_planning,
            user_input: &input,
            emotion_state: conv.tone.as_str(),
            deep_ambiguity_threshold: self.config.reasoning.deep_ambiguity_threshold,
            shallow_ambiguity_threshold: self.config.reasoning.shallow_ambiguity_threshold,
            shallow_turn_floor: self.config.reasoning.shallow_turn_floor,
        });
        self.watchdog.record_reasoning_level(level);
        tracing::info!(level = %level, "reasoning depth selected");

        // Advisory escalation.
        let should_escalate = commands.is_empty()
            || commands.iter().all(|c| c.intent == "conversation")
            || has_planning
            || embedding_escalation;
        if should_escalate && level != ReasoningLevel::Shallow {
            if let Some(result) = self
                .escalate_to_advisor(&input, &mut commands, level, &language)
                .await
            {
                return self.wrap(result, &language);
            }
        }

        // Stage E: rule-based semantic engine.
        if commands.is_empty() {
            let semantic_started = Instant::now();
            let parsed = self.semantic.parse(&input);
            self.metrics
                .record_latency("semantic", semantic_started.elapsed().as_secs_f64() * 1000.0);
            self.metrics.increment("semantic_calls");

            if parsed.requires_clarification {
                for intent in &parsed.intents {
                    // Unknown segments have nothing to clarify; they fall
                    // through to the regex stage and the unknown reply.
                    if intent.requires_clarification && intent.intent != "unknown" {
                        let question = self.open_clarification(
                            &input,
                            &intent.intent,
                            intent.parameters.clone(),
                            intent.confidence,
                        );
                        self.metrics.increment("clarification_triggers");
                        return self.wrap(
                            PipelineResult::fail(question, "Requires Clarification"),
                            &language,
                        );
                    }
                }
            }

            for intent in parsed.intents {
                if intent.intent != "unknown" {
                    commands.push(Command::new(
                        input.clone(),
                        intent.intent,
                        intent.parameters,
                        intent.confidence * confidence_modifier,
                        DecisionSource::Semantic,
                    ));
                }
            }
        }

        // Stage F: regex fallback.
        if commands.is_empty() {
            if let Some(command) = fallback::detect(&input) {
                commands.push(command);
            }
        }

        if commands.is_empty() {
            return self.wrap(
                PipelineResult::fail("Could not understand command", "Unknown intent"),
                &language,
            );
        }

        // Feasibility validation for classifier-produced commands.
        for command in &mut commands {
            if !matches!(
                command.decision_source,
                DecisionSource::Embedding | DecisionSource::Semantic | DecisionSource::Regex
            ) {
                continue;
            }
            if command.entities.is_empty() {
                command.entities = extract::extract_parameters(&command.intent, &input);
            }
            let feasibility = self.feasibility.validate(&command.intent, &command.entities);
            if feasibility.requires_clarification {
                let question = feasibility
                    .clarification_question
                    .clone()
                    .unwrap_or_else(|| "More information is needed.".to_string());
                self.clarification.create_clarification(
                    &command.raw_input,
                    &command.intent,
                    command.entities.clone(),
                    command.confidence,
                    feasibility.missing_fields,
                    &question,
                );
                self.metrics.increment("clarification_triggers");
                return self.wrap(
                    PipelineResult::fail(question, "Requires Clarification"),
                    &language,
                );
            }
            if !feasibility.valid {
                let reason = feasibility.errors.join("; ");
                return self.wrap(
                    PipelineResult::fail(
                        format!("Cannot execute: {reason}"),
                        "Feasibility Validation Failed",
                    ),
                    &language,
                );
            }
        }

        // Execution loop over one or more commands.
        if commands.len() > 1 {
            self.metrics.increment("multi_intent_chains");
        }
        for command in &commands {
            self.metrics
                .increment_decision_source(&command.decision_source.to_string());
        }

        let mut outputs: Vec<String> = Vec::new();
        let mut previous_intent: Option<String> = None;
        for command in commands {
            if let Some(previous) = &previous_intent {
                if let Some(result) = self.check_chain_safety(previous, &command) {
                    return self.wrap(result, &language);
                }
            }

            let result = self.execute_command(&command, auto_confirm, level).await;
            outputs.push(result.output.clone());
            if !result.success {
                self.command_history.add(user_input, false);
                return self.wrap(
                    PipelineResult {
                        success: false,
                        output: outputs.join("\n---\n"),
                        cancelled: result.cancelled,
                        error: result.error,
                    },
                    &language,
                );
            }
            previous_intent = Some(command.intent.clone());
        }

        self.command_history.add(user_input, true);
        self.metrics
            .record_latency("total", turn_started.elapsed().as_secs_f64() * 1000.0);
        self.wrap(PipelineResult::ok(outputs.join("\n---\n")), &language)
    }

    /// Consult the advisor; may replace the working command set or hand
    /// the turn to the orchestrator (in which case the returned result
    /// ends the turn).
    async fn escalate_to_advisor(
        &mut self,
        input: &str,
        commands: &mut Vec<Command>,
        level: ReasoningLevel,
        language: &str,
    ) -> Option<PipelineResult> {
        // Compress long histories before shipping them to the advisor.
        let turn_count = self.session_memory.turn_count();
        if self.compressor.should_compress(turn_count) {
            tracing::info!(turns = turn_count, "compression triggered");
            self.watchdog.record_compression();
            let older_text = self
                .session_memory
                .interaction_history()
                .iter()
                .map(|t| format!("{}: {}", t.role, t.content))
                .collect::<Vec<_>>()
                .join("\n");
            let summary = self.advisor.generate_summary(&older_text).await;
            let compressed = self
                .compressor
                .compress(self.session_memory.interaction_history().to_vec(), summary);
            self.session_memory.set_interaction_history(compressed);
        }

        tracing::info!(depth = %level, "escalating to advisor");
        self.watchdog.record_escalation();
        let raw = self
            .advisor
            .analyze(AdvisorRequest {
                text: input,
                best_guess: commands.first(),
                language,
                reasoning_level: level.as_str(),
                history: self.session_memory.interaction_history(),
            })
            .await;

        let report = match AdvisorVerdict::parse(&raw) {
            AdvisorVerdict::Report(report) => report,
            AdvisorVerdict::Malformed => {
                self.watchdog.record_malformed_advisor_output();
                return None;
            }
        };
        if report.intent == "unknown" {
            tracing::info!("advisor confirmed unknown");
            return None;
        }

        self.watchdog.detect_escalation_loop(&report.intent);
        tracing::info!(intent = %report.intent, confidence = report.confidence, "advisor recommended");

        // The advisor only recommends intent; parameters are re-extracted.
        let entities = extract::extract_parameters(&report.intent, input);
        let mut command = Command::new(
            input,
            report.intent.clone(),
            entities,
            report.confidence,
            DecisionSource::Advisor,
        );
        command.requires_confirmation = report.needs_confirmation;
        *commands = vec![command];

        if level == ReasoningLevel::Deep
            && matches!(report.intent.as_str(), "complex_goal" | "autonomous_goal")
        {
            tracing::info!("deep reasoning with goal intent; starting orchestration");
            return Some(self.orchestrate(input).await);
        }
        None
    }

    /// Expand a complex goal into a bounded sequence of governed steps.
    async fn orchestrate(&mut self, goal: &str) -> PipelineResult {
        let orchestrator = TaskOrchestrator::new(self.config.orchestration.clone());
        let advisor = Arc::clone(&self.advisor);
        let capabilities = Arc::clone(&self.capabilities);
        let steps = orchestrator
            .generate_plan(goal, advisor.as_ref(), ReasoningLevel::Deep, &capabilities)
            .await;
        if steps.is_empty() {
            tracing::warn!("orchestration produced no viable plan");
            return PipelineResult::fail(
                "Could not derive a safe multi-step plan for that goal.",
                "Orchestration plan rejected",
            );
        }

        let mut runner = AutonomousRunner {
            pipeline: &mut *self,
        };
        let result = orchestrator.execute_plan(steps, &mut runner).await;
        let summary = render_orchestration(&result);
        self.session_memory.add_interaction(
            InteractionTurn::new(
                "assistant",
                format!("Autonomous plan completed: {}", result.status),
            )
            .with_meta("execution_log", Value::Bool(true)),
        );

        if result.status == "success" {
            PipelineResult::ok(summary)
        } else {
            PipelineResult::fail(summary, "Orchestration aborted")
        }
    }

    /// Plan, gate, and execute a single command.
    async fn execute_command(
        &mut self,
        command: &Command,
        auto_confirm: bool,
        level: ReasoningLevel,
    ) -> PipelineResult {
        tracing::info!(intent = %command.intent, source = %command.decision_source, "executing command");

        if command.intent == "conversation" {
            return PipelineResult::ok(
                "I can manage files, open URLs, and launch apps. Ask me for one of those.",
            );
        }

        let decision = match self.planner.create_plan(&command.intent, &command.entities) {
            Ok(decision) => decision,
            Err(PlanError::UnmappedIntent(intent)) => {
                return PipelineResult::fail(
                    "Could not create execution plan",
                    format!("No plan mapping for intent '{intent}'"),
                );
            }
            Err(error) => {
                return PipelineResult::fail("Could not create execution plan", error.to_string());
            }
        };
        let plan = match decision {
            PlanDecision::Plan(plan) => plan,
            PlanDecision::Orchestrate => {
                if level == ReasoningLevel::Deep {
                    return self.orchestrate(&command.raw_input).await;
                }
                return PipelineResult::fail(
                    "That looks like a multi-step goal; try rephrasing it as one action.",
                    "Goal requires DEEP reasoning",
                );
            }
        };

        if let Err(violation) = self.policy_engine.validate(&command.intent, plan.risk_level()) {
            self.watchdog.record_safety_violation();
            return PipelineResult::fail(violation.to_string(), "Policy Violation");
        }

        let outcome = match self
            .gateway
            .execute_plan(
                &plan,
                self.confirmer.as_ref(),
                auto_confirm,
                command.requires_confirmation,
                self.kill_switch.clone(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                self.watchdog.record_execution_failure();
                return PipelineResult::fail(error.to_string(), "Execution error");
            }
        };

        let duration_ms = outcome.report.as_ref().map_or(0, |r| r.duration_ms);
        self.execution_history.add(ExecutionRecord {
            plan_id: plan.plan_id().to_string(),
            command: command.raw_input.clone(),
            success: outcome.success(),
            duration_ms,
            error: outcome.message.clone(),
        });

        match outcome.final_state {
            FinalState::Finished => {
                self.watchdog.record_execution_success(&command.intent);
                self.last_intent = Some(PriorIntent {
                    intent: command.intent.clone(),
                    parameters: command.entities.clone(),
                    confidence: command.confidence,
                });
                self.session_memory.update_from_success(command);
                let steps = outcome.report.as_ref().map_or(0, |r| r.trace.len());
                PipelineResult::ok(format!(
                    "Completed {} ({} step(s), {} ms).",
                    command.intent, steps, duration_ms
                ))
            }
            FinalState::Denied => {
                self.last_intent = None;
                PipelineResult::cancel(
                    outcome
                        .message
                        .unwrap_or_else(|| "Execution cancelled.".to_string()),
                    "Cancelled",
                )
            }
            FinalState::Blocked => {
                self.watchdog.record_safety_violation();
                self.last_intent = None;
                PipelineResult::fail(
                    outcome
                        .message
                        .unwrap_or_else(|| "Execution blocked by safety gate.".to_string()),
                    "Execution Blocked",
                )
            }
            FinalState::Aborted | FinalState::Failed => {
                self.watchdog.record_execution_failure();
                self.last_intent = None;
                PipelineResult::fail(
                    format!(
                        "Execution {}: {}",
                        outcome.final_state.as_str().to_lowercase(),
                        outcome.message.as_deref().unwrap_or("no detail")
                    ),
                    outcome.message.unwrap_or_else(|| "Execution failed".to_string()),
                )
            }
        }
    }

    /// Refuse write/delete mixes within one utterance chain, and any
    /// wildcard delete target in a chain.
    fn check_chain_safety(&mut self, previous: &str, command: &Command) -> Option<PipelineResult> {
        let mixes = (previous == "write_file" && command.intent == "delete_file")
            || (previous == "delete_file" && command.intent == "write_file");
        if !mixes {
            return None;
        }
        if command.intent == "delete_file" {
            let path = command.entity("path").unwrap_or("").to_lowercase();
            if path.is_empty() || ["*", "all", "everything"].iter().any(|p| path.contains(p)) {
                self.watchdog.record_safety_violation();
                return Some(PipelineResult::fail(
                    "Safety Guard: Blocked ambiguous destructive chain (wildcard detected).",
                    "Safety Violation",
                ));
            }
        }
        self.watchdog.record_safety_violation();
        Some(PipelineResult::fail(
            "Safety Guard: Cannot mix write and delete operations in a single chain.",
            "Safety Violation",
        ))
    }

    fn open_clarification(
        &mut self,
        input: &str,
        intent: &str,
        parameters: serde_json::Map<String, Value>,
        confidence: f64,
    ) -> String {
        let feasibility = self.feasibility.validate(intent, &parameters);
        let question = feasibility.clarification_question.unwrap_or_else(|| {
            format!("I understood you want to {intent}, but I need more details. Can you be more specific?")
        });
        self.clarification.create_clarification(
            input,
            intent,
            parameters,
            confidence,
            feasibility.missing_fields,
            &question,
        );
        question
    }

    /// Dry-run: classify and simulate without executing or auditing.
    pub async fn simulate_command(&mut self, user_input: &str) -> PipelineResult {
        let parsed = self.semantic.parse(user_input);
        let intent = parsed
            .intents
            .iter()
            .find(|i| i.intent != "unknown")
            .cloned()
            .or_else(|| {
                fallback::detect(user_input).map(|c| warden_intent::SemanticIntent {
                    intent: c.intent,
                    parameters: c.entities,
                    confidence: c.confidence,
                    requires_clarification: false,
                })
            });
        let Some(intent) = intent else {
            return PipelineResult::fail("Could not understand command", "Unknown intent");
        };

        let plan = match self.planner.create_plan(&intent.intent, &intent.parameters) {
            Ok(PlanDecision::Plan(plan)) => plan,
            Ok(PlanDecision::Orchestrate) => {
                return PipelineResult::ok("Dry run: goal would be handed to the orchestrator.");
            }
            Err(error) => {
                return PipelineResult::fail("Could not create execution plan", error.to_string());
            }
        };

        let simulator = RiskSimulator::new(Arc::clone(&self.policies));
        match simulator.simulate_plan(&plan) {
            Ok(simulation) => {
                let mut lines = vec![format!(
                    "DRY RUN {}: risk={} confirmation={} sandbox={}",
                    plan.plan_id(),
                    simulation.cumulative_risk,
                    simulation.requires_confirmation,
                    simulation.requires_sandbox
                )];
                for factor in &simulation.risk_factors {
                    lines.push(format!("  - {factor}"));
                }
                PipelineResult::ok(lines.join("\n"))
            }
            Err(error) => PipelineResult::fail("Simulation refused the plan", error.to_string()),
        }
    }

    fn handle_status(&mut self) -> PipelineResult {
        let pending = if self.clarification.has_pending() { "Yes" } else { "No" };
        let confidence = self.last_intent.as_ref().map_or(0.0, |i| i.confidence);
        let health = self.watchdog.health_status().as_str();
        PipelineResult::ok(format!(
            "Status:\n- Pending Clarification: {pending}\n- Last Intent Confidence: {confidence:.2}\n- Context Active: {}\n- Health: {health}",
            if self.last_intent.is_some() { "Yes" } else { "No" }
        ))
    }

    fn handle_pending(&mut self) -> PipelineResult {
        if !self.clarification.has_pending() {
            return PipelineResult::ok("No pending clarification.");
        }
        PipelineResult::ok(format!(
            "Pending Clarification:\n- Attempt: {}/3\n- Missing Fields: {}\n- Last Question: {}",
            self.clarification.attempt_count(),
            self.clarification.missing_fields().join(", "),
            self.clarification.last_question()
        ))
    }

    fn handle_last_intent(&mut self) -> PipelineResult {
        match &self.last_intent {
            None => PipelineResult::ok("No intent in history."),
            Some(prior) => PipelineResult::ok(
                serde_json::to_string_pretty(&json!({
                    "intent": prior.intent,
                    "parameters": prior.parameters,
                    "confidence": prior.confidence,
                }))
                .unwrap_or_else(|_| "No intent in history.".to_string()),
            ),
        }
    }

    fn handle_explain(&mut self) -> PipelineResult {
        let pending = self.clarification.has_pending();
        PipelineResult::ok(format!(
            "Decision State:\n- Clarification Mode: {}\n- Last Confidence: {:.2}\n- Execution Allowed: {}",
            if pending { "Active" } else { "Inactive" },
            self.last_intent.as_ref().map_or(0.0, |i| i.confidence),
            if pending { "No (Pending)" } else { "Yes" }
        ))
    }

    /// Mirror the output language and append the assistant turn.
    fn wrap(&mut self, mut result: PipelineResult, language: &str) -> PipelineResult {
        result.output = LanguageMirror::mirror_response(&result.output, language);
        self.session_memory
            .add_interaction(InteractionTurn::new("assistant", &result.output));
        result
    }
}

fn render_orchestration(result: &OrchestrationResult) -> String {
    let mut lines = vec![format!(
        "Autonomous Task Result: {}",
        result.status.to_uppercase()
    )];
    for entry in &result.audit_log {
        let description = entry["description"].as_str().unwrap_or("step");
        let mark = if entry["success"].as_bool().unwrap_or(false) {
            "ok"
        } else {
            "failed"
        };
        lines.push(format!("- {description}: {mark}"));
    }
    lines.push(format!(
        "steps_executed={} total_time_ms={}",
        result.steps_executed, result.total_time_ms
    ));
    lines.join("\n")
}

/// Governed pathway the orchestrator feeds steps through: safety gate,
/// policy engine, and watchdog still apply; only classification is
/// bypassed.
struct AutonomousRunner<'a> {
    pipeline: &'a mut Pipeline,
}

#[async_trait]
impl StepRunner for AutonomousRunner<'_> {
    async fn run_step(&mut self, command: Command) -> StepOutcome {
        let pipeline = &mut *self.pipeline;
        pipeline.watchdog.record_command();
        pipeline.watchdog.record_reasoning_level(ReasoningLevel::Deep);

        let result = pipeline
            .execute_command(&command, true, ReasoningLevel::Deep)
            .await;
        StepOutcome {
            success: result.success,
            output: result.output,
            error: result.error,
        }
    }
}
