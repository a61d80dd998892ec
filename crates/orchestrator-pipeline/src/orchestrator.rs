//! The turn orchestrator.

use crate::config::OrchestratorConfig;
use crate::redispatch::ExecutorRedispatcher;
use crate::synthesis::{self, FALLBACK_REPLY};
use chrono::Utc;
use orchestrator_canary::{AdmissionDecision, CanaryController, CanaryStore, InMemoryCanaryStore};
use orchestrator_core::{
    ChatRequest, FeatureRequirements, GenerationClient, HealthService, ModelCatalog,
    ModelResolutionDetails, OrchestratorError, ProviderRegistry, ProviderRequest, RoutePlan,
    ToolDefinition, TurnRequest,
};
use orchestrator_critic::{
    CriticContext, CriticIterationRecord, CriticLoop, DraftEvaluator, ModelEvaluator,
};
use orchestrator_graph::{
    AgentGraph, BlackboardState, ExecutionEvent, ExecutionReport, GraphBuilder, GraphExecutor,
    NodeRunRecord, TaskResult, TaskStatus,
};
use orchestrator_resolve::{ModelResolver, ResolutionRequest};
use orchestrator_telemetry::{TelemetryEmitter, TelemetryEvent, TracingTelemetryEmitter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument, warn};

/// Everything a handled turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Trace id of the turn.
    pub trace_id: String,
    /// The reply to send.
    pub reply: String,
    /// Model that produced (or was resolved for) the reply.
    pub model: String,
    /// The canary gate's verdict.
    pub admission: AdmissionDecision,
    /// The model-resolution decision trail.
    pub resolution: ModelResolutionDetails,
    /// The turn's blackboard, as left by execution.
    pub blackboard: BlackboardState,
    /// Per-task records and the event log.
    pub execution: ExecutionReport,
    /// Critic loop records, possibly empty.
    pub critic_iterations: Vec<CriticIterationRecord>,
    /// Whether the reply is the generic fallback.
    pub degraded: bool,
}

/// The orchestration control plane for one process.
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<ProviderRegistry>,
    generation: Arc<dyn GenerationClient>,
    executor: Arc<GraphExecutor>,
    resolver: ModelResolver,
    canary: CanaryController,
    critic: CriticLoop,
    telemetry: Arc<dyn TelemetryEmitter>,
    tools: Vec<ToolDefinition>,
}

impl TurnOrchestrator {
    /// Create a new orchestrator builder.
    #[must_use]
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::new()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The canary gate, for snapshot reads.
    #[must_use]
    pub fn canary(&self) -> &CanaryController {
        &self.canary
    }

    /// Handle one turn end to end.
    ///
    /// This never returns an error: every subsystem fails soft, and a hard
    /// synthesis failure degrades to the generic fallback reply.
    #[instrument(skip(self, turn, plan), fields(trace_id = %turn.trace_id, route = %plan.kind))]
    pub async fn handle_turn(&self, turn: &TurnRequest, plan: &RoutePlan) -> TurnOutcome {
        let admission = self.canary.evaluate(plan.kind, &turn.trace_id);
        self.emit(TelemetryEvent::CanaryDecision {
            trace_id: turn.trace_id.clone(),
            route: plan.kind,
            allowed: admission.allowed,
            reason: admission.reason.clone(),
            timestamp: Utc::now(),
        })
        .await;

        let mut pipeline_attempted = false;
        let mut graph_failed = false;
        let mut failure_codes: Vec<String> = Vec::new();

        let (board, execution) = if admission.allowed {
            pipeline_attempted = true;
            let graph = self.build_graph(turn, plan);
            self.emit(TelemetryEvent::GraphBuilt {
                trace_id: turn.trace_id.clone(),
                route: plan.kind,
                node_count: graph.nodes.len(),
                edge_count: graph.edges.len(),
                fan_out: graph.is_fan_out(),
                timestamp: Utc::now(),
            })
            .await;

            let mut board =
                BlackboardState::create(&turn.trace_id, &turn.user_text, graph.clone());
            match self.executor.execute(&graph, &mut board).await {
                Ok(report) => {
                    for node_id in report.failed_node_ids() {
                        failure_codes.push(format!("node_failed:{node_id}"));
                    }
                    (board, report)
                }
                Err(graph_error) => {
                    warn!(
                        error = %graph_error,
                        "graph execution failed, falling back to direct provider path"
                    );
                    graph_failed = true;
                    failure_codes.push("graph_failure".to_string());
                    self.run_legacy(turn, plan).await
                }
            }
        } else {
            self.run_legacy(turn, plan).await
        };

        for record in &execution.records {
            self.emit(TelemetryEvent::NodeRun {
                trace_id: turn.trace_id.clone(),
                node_id: record.node_id.clone(),
                agent: record.agent.clone(),
                status: record.status.to_string(),
                attempts: record.attempts,
                latency_ms: record.latency_ms,
                error: record.error_text.clone(),
                timestamp: Utc::now(),
            })
            .await;
        }

        // Model resolution: never fails.
        let tools = self.config.tool_policy.permitted(&self.tools);
        let mut requirements = FeatureRequirements::infer(turn, plan);
        if tools.is_some() {
            requirements = requirements.with_tools();
        }
        let messages = synthesis::build_messages(turn, plan, &board);
        let mut resolution_request = ResolutionRequest::new(plan.kind, requirements)
            .with_prompt_chars(synthesis::prompt_chars(&messages))
            .with_link_aware(FeatureRequirements::wants_link_aware(plan));
        if let Some(allow_list) = &self.config.model_allow_list {
            resolution_request = resolution_request.with_allow_list(allow_list.clone());
        }
        let resolution = self.resolver.resolve(&resolution_request).await;
        self.emit(TelemetryEvent::ModelResolved {
            trace_id: turn.trace_id.clone(),
            details: resolution.clone(),
            timestamp: Utc::now(),
        })
        .await;

        // Synthesis: the one call whose hard failure reaches the user.
        let mut chat = ChatRequest::new(&resolution.model, messages, plan.temperature)
            .with_timeout(self.config.synthesis_timeout);
        if let Some(tools) = tools {
            chat = chat.with_tools(tools);
        }
        let draft = match self.generation.chat(&chat).await {
            Ok(completion) => completion.content,
            Err(synthesis_error) => {
                error!(error = %synthesis_error, "synthesis failed, sending fallback reply");
                if pipeline_attempted {
                    failure_codes.push("synthesis_failure".to_string());
                    self.canary.record_outcome(false, failure_codes);
                }
                let outcome = TurnOutcome {
                    trace_id: turn.trace_id.clone(),
                    reply: FALLBACK_REPLY.to_string(),
                    model: resolution.model.clone(),
                    admission,
                    resolution,
                    blackboard: board,
                    execution,
                    critic_iterations: Vec::new(),
                    degraded: true,
                };
                self.emit_completion(plan, &outcome).await;
                return outcome;
            }
        };

        if pipeline_attempted {
            self.canary.record_outcome(!graph_failed, failure_codes);
        }

        // Critic loop: may re-enter the executor for targeted providers.
        let critic_context = CriticContext {
            route: plan.kind,
            trace_id: turn.trace_id.clone(),
            user_text: turn.user_text.clone(),
            draft,
            model: resolution.model.clone(),
            temperature: plan.temperature,
            context_digest: synthesis::context_digest(&board),
            voice_narration: plan.voice_narration,
            binary_output: synthesis::has_binary_output(&board),
        };
        let redispatcher = ExecutorRedispatcher::new(
            Arc::clone(&self.executor),
            plan.kind,
            &turn.trace_id,
            &turn.user_text,
            &turn.user_id,
        );
        let critic_outcome = self.critic.refine(critic_context, &redispatcher).await;

        for iteration in &critic_outcome.iterations {
            self.emit(TelemetryEvent::CriticIteration {
                trace_id: turn.trace_id.clone(),
                iteration: iteration.iteration,
                score: iteration.score,
                verdict: iteration.verdict.map(|v| format!("{v:?}").to_lowercase()),
                redispatched: iteration
                    .redispatched
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
                regenerated: iteration.regenerated,
                timestamp: Utc::now(),
            })
            .await;
        }

        let outcome = TurnOutcome {
            trace_id: turn.trace_id.clone(),
            reply: critic_outcome.final_draft,
            model: resolution.model.clone(),
            admission,
            resolution,
            blackboard: board,
            execution,
            critic_iterations: critic_outcome.iterations,
            degraded: false,
        };
        self.emit_completion(plan, &outcome).await;
        outcome
    }

    /// Build the turn's graph from the route plan and config flags.
    fn build_graph(&self, turn: &TurnRequest, plan: &RoutePlan) -> AgentGraph {
        let mut builder = GraphBuilder::new(plan.kind)
            .providers(plan.effective_providers())
            .parallel(self.config.parallel_retrieval)
            .user_text(&turn.user_text)
            .user_id(&turn.user_id);
        for skipped in &self.config.skipped_providers {
            builder = builder.skip(*skipped);
        }
        builder.build()
    }

    /// The legacy non-graph path: run providers directly, one at a time,
    /// single attempt each. Used when the canary denies the pipeline or the
    /// graph itself fails.
    async fn run_legacy(
        &self,
        turn: &TurnRequest,
        plan: &RoutePlan,
    ) -> (BlackboardState, ExecutionReport) {
        let graph = self.build_graph(turn, plan);
        let mut board = BlackboardState::create(&turn.trace_id, &turn.user_text, graph.clone());
        let mut report = ExecutionReport::default();

        for node in &graph.nodes {
            let Some(handler) = self.registry.get(node.provider) else {
                report.events.push(ExecutionEvent::NodeSkipped {
                    node_id: node.id.clone(),
                    agent: node.provider.as_str().to_string(),
                    reason: "no handler registered".to_string(),
                    timestamp: Utc::now(),
                });
                let record = NodeRunRecord {
                    node_id: node.id.clone(),
                    agent: node.provider.as_str().to_string(),
                    status: TaskStatus::Skipped,
                    attempts: 0,
                    started_at: None,
                    finished_at: Some(Utc::now()),
                    latency_ms: 0,
                    error_text: None,
                };
                board.record_task_result(TaskResult {
                    node_id: node.id.clone(),
                    agent: record.agent.clone(),
                    status: TaskStatus::Skipped,
                    attempts: 0,
                    started_at: None,
                    finished_at: record.finished_at,
                    error_text: None,
                    artifacts: Vec::new(),
                });
                report.records.push(record);
                continue;
            };

            board.mark_task_started(&node.id);
            report.events.push(ExecutionEvent::NodeStarted {
                node_id: node.id.clone(),
                agent: node.provider.as_str().to_string(),
                timestamp: Utc::now(),
            });

            let request = ProviderRequest {
                trace_id: turn.trace_id.clone(),
                objective: node.objective.clone(),
                input_text: turn.user_text.clone(),
                user_id: turn.user_id.clone(),
                upstream: Vec::new(),
            };

            let started_at = Utc::now();
            let start = Instant::now();
            let result = tokio::time::timeout(node.budget.latency(), handler.retrieve(&request))
                .await
                .map_err(|_| OrchestratorError::timeout(node.budget.latency()))
                .and_then(|inner| inner);
            let finished_at = Utc::now();
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    let artifact = output.into_artifact(&node.id, node.provider);
                    report.events.push(ExecutionEvent::NodeCompleted {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        attempts: 1,
                        latency_ms,
                        timestamp: finished_at,
                    });
                    let record = NodeRunRecord {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        status: TaskStatus::Ok,
                        attempts: 1,
                        started_at: Some(started_at),
                        finished_at: Some(finished_at),
                        latency_ms,
                        error_text: None,
                    };
                    board.record_task_result(TaskResult {
                        node_id: node.id.clone(),
                        agent: record.agent.clone(),
                        status: TaskStatus::Ok,
                        attempts: 1,
                        started_at: Some(started_at),
                        finished_at: Some(finished_at),
                        error_text: None,
                        artifacts: vec![artifact],
                    });
                    report.records.push(record);
                }
                Err(provider_error) => {
                    let error_text = provider_error.to_string();
                    report.events.push(ExecutionEvent::NodeFailed {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        attempts: 1,
                        error: error_text.clone(),
                        timestamp: finished_at,
                    });
                    let record = NodeRunRecord {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        status: TaskStatus::Error,
                        attempts: 1,
                        started_at: Some(started_at),
                        finished_at: Some(finished_at),
                        latency_ms,
                        error_text: Some(error_text.clone()),
                    };
                    board.record_task_result(TaskResult {
                        node_id: node.id.clone(),
                        agent: record.agent.clone(),
                        status: TaskStatus::Error,
                        attempts: 1,
                        started_at: Some(started_at),
                        finished_at: Some(finished_at),
                        error_text: Some(error_text),
                        artifacts: Vec::new(),
                    });
                    report.records.push(record);
                }
            }
        }

        (board, report)
    }

    /// Emit a telemetry event, best-effort.
    async fn emit(&self, event: TelemetryEvent) {
        self.telemetry.emit(event).await;
    }

    async fn emit_completion(&self, plan: &RoutePlan, outcome: &TurnOutcome) {
        self.emit(TelemetryEvent::TurnCompleted {
            trace_id: outcome.trace_id.clone(),
            route: plan.kind,
            model: Some(outcome.model.clone()),
            reply_chars: outcome.reply.len(),
            completed_tasks: outcome.blackboard.counters.completed_tasks,
            failed_tasks: outcome.blackboard.counters.failed_tasks,
            estimated_tokens: outcome.blackboard.counters.total_estimated_tokens,
            critic_iterations: outcome.critic_iterations.len() as u32,
            degraded: outcome.degraded,
            timestamp: Utc::now(),
        })
        .await;
    }
}

/// Builder for [`TurnOrchestrator`].
pub struct TurnOrchestratorBuilder {
    config: OrchestratorConfig,
    registry: Option<Arc<ProviderRegistry>>,
    generation: Option<Arc<dyn GenerationClient>>,
    catalog: Option<Arc<dyn ModelCatalog>>,
    health: Option<Arc<dyn HealthService>>,
    telemetry: Option<Arc<dyn TelemetryEmitter>>,
    canary_store: Option<Arc<dyn CanaryStore>>,
    evaluator: Option<Arc<dyn DraftEvaluator>>,
    tools: Vec<ToolDefinition>,
}

impl TurnOrchestratorBuilder {
    /// Create a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            registry: None,
            generation: None,
            catalog: None,
            health: None,
            telemetry: None,
            canary_store: None,
            evaluator: None,
            tools: Vec::new(),
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the provider registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the generation client.
    #[must_use]
    pub fn generation(mut self, generation: Arc<dyn GenerationClient>) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Set the model catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the health service.
    #[must_use]
    pub fn health(mut self, health: Arc<dyn HealthService>) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the telemetry sink.
    #[must_use]
    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetryEmitter>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the canary state store. Tests inject isolated instances here.
    #[must_use]
    pub fn canary_store(mut self, store: Arc<dyn CanaryStore>) -> Self {
        self.canary_store = Some(store);
        self
    }

    /// Set the draft evaluator.
    #[must_use]
    pub fn evaluator(mut self, evaluator: Arc<dyn DraftEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Set the tools offered to synthesis, subject to the tool policy.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    /// Returns an error when a required collaborator is missing.
    pub fn build(self) -> Result<TurnOrchestrator, OrchestratorError> {
        let registry = self
            .registry
            .ok_or_else(|| OrchestratorError::internal("orchestrator requires a provider registry"))?;
        let generation = self
            .generation
            .ok_or_else(|| OrchestratorError::internal("orchestrator requires a generation client"))?;
        let catalog = self
            .catalog
            .ok_or_else(|| OrchestratorError::internal("orchestrator requires a model catalog"))?;
        let health = self
            .health
            .ok_or_else(|| OrchestratorError::internal("orchestrator requires a health service"))?;

        let telemetry = self
            .telemetry
            .unwrap_or_else(|| Arc::new(TracingTelemetryEmitter::new("orchestrator")));
        let canary_store = self
            .canary_store
            .unwrap_or_else(|| Arc::new(InMemoryCanaryStore::new()));
        let evaluator = self.evaluator.unwrap_or_else(|| {
            Arc::new(ModelEvaluator::new(
                Arc::clone(&generation),
                &self.config.evaluator_model,
            ))
        });

        let executor = Arc::new(GraphExecutor::new(
            Arc::clone(&registry),
            self.config.executor.clone(),
        ));
        let resolver = ModelResolver::new(catalog, health);
        let canary = CanaryController::new(self.config.canary.clone(), canary_store);
        let critic = CriticLoop::new(
            self.config.critic.clone(),
            evaluator,
            Arc::clone(&generation),
        );

        Ok(TurnOrchestrator {
            config: self.config,
            registry,
            generation,
            executor,
            resolver,
            canary,
            critic,
            telemetry,
            tools: self.tools,
        })
    }
}

impl Default for TurnOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
