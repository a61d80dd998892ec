//! # Turn Orchestrator
//!
//! Agentic orchestration control plane for conversational turns.
//!
//! This binary wires the orchestrator with built-in demo collaborators and
//! runs a single turn from the command line, which is handy for smoke-testing
//! the pipeline wiring without a chat platform attached:
//!
//! ```bash
//! turn-orchestrator "what did we talk about yesterday?"
//! RUST_LOG=debug turn-orchestrator "hello there"
//! ```

use async_trait::async_trait;
use orchestrator_core::{
    ChatCompletion, ChatRequest, ContextProvider, GenerationClient, OrchestratorError,
    ProviderKind, ProviderOutput, ProviderRegistry, ProviderRequest, RouteKind, RoutePlan,
    TurnRequest,
};
use orchestrator_pipeline::{OrchestratorConfig, TurnOrchestrator};
use orchestrator_resolve::{StaticHealthService, StaticModelCatalog};
use orchestrator_telemetry::{init_logging, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::info;

/// Demo provider returning canned context for its kind.
struct DemoProvider {
    kind: ProviderKind,
    content: &'static str,
}

#[async_trait]
impl ContextProvider for DemoProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn retrieve(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, OrchestratorError> {
        Ok(ProviderOutput::text(format!(
            "{} (for: {})",
            self.content, request.input_text
        ))
        .with_confidence(0.7))
    }
}

/// Demo generation client that echoes a summary of what it was asked.
struct DemoGeneration;

#[async_trait]
impl GenerationClient for DemoGeneration {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, OrchestratorError> {
        let user = request
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, orchestrator_core::MessageRole::User))
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        // The critic evaluator also lands here; answer it in its JSON shape.
        if request.messages.first().is_some_and(|m| m.content.contains("quality critic")) {
            return Ok(ChatCompletion {
                content: r#"{"score": 0.9, "verdict": "pass", "issues": []}"#.to_string(),
                model: Some(request.model.clone()),
            });
        }
        Ok(ChatCompletion {
            content: format!("[{}] You said: {user}", request.model),
            model: Some(request.model.clone()),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::new())?;

    let user_text = env::args().skip(1).collect::<Vec<_>>().join(" ");
    let user_text = if user_text.trim().is_empty() {
        "hello there".to_string()
    } else {
        user_text
    };

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(DemoProvider {
        kind: ProviderKind::Memory,
        content: "Recent memory: the user was debugging a flaky integration test",
    }));
    registry.register(Arc::new(DemoProvider {
        kind: ProviderKind::SocialGraph,
        content: "Relationship: long-time regular, prefers a casual tone",
    }));
    registry.register(Arc::new(DemoProvider {
        kind: ProviderKind::Knowledge,
        content: "Knowledge base: no curated entries matched",
    }));

    let config = OrchestratorConfig {
        canary: orchestrator_canary::CanaryConfig {
            rollout_percent: 100,
            ..Default::default()
        },
        ..Default::default()
    };

    let orchestrator = TurnOrchestrator::builder()
        .config(config)
        .registry(Arc::new(registry))
        .generation(Arc::new(DemoGeneration))
        .catalog(Arc::new(StaticModelCatalog::builtin()))
        .health(Arc::new(StaticHealthService::new().with_score("gpt-4o", 0.95)))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build orchestrator: {e}"))?;

    let turn = TurnRequest::builder()
        .user_id("demo-user")
        .channel_id("demo-channel")
        .user_text(&user_text)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid turn: {e}"))?;
    let plan = RoutePlan::for_route(RouteKind::Chat);

    let outcome = orchestrator.handle_turn(&turn, &plan).await;

    info!(
        trace_id = %outcome.trace_id,
        model = %outcome.model,
        admitted = outcome.admission.allowed,
        completed_tasks = outcome.blackboard.counters.completed_tasks,
        failed_tasks = outcome.blackboard.counters.failed_tasks,
        "turn handled"
    );
    println!("{}", outcome.reply);

    Ok(())
}
