//! Test fixtures for integration tests.

use crate::mocks::{CannedProvider, ScriptedEvaluator, ScriptedGeneration};
use orchestrator_canary::{CanaryConfig, CanaryStore, InMemoryCanaryStore};
use orchestrator_core::{
    ContextProvider, GenerationClient, ProviderKind, ProviderRegistry, RouteKind, RoutePlan,
    TurnRequest,
};
use orchestrator_critic::DraftEvaluator;
use orchestrator_pipeline::{OrchestratorConfig, TurnOrchestrator};
use orchestrator_resolve::{StaticHealthService, StaticModelCatalog};
use orchestrator_telemetry::TelemetryEmitter;
use std::sync::Arc;
use uuid::Uuid;

/// A simple chat turn with a fresh trace id.
pub fn chat_turn(text: &str) -> TurnRequest {
    TurnRequest::builder()
        .trace_id(Uuid::new_v4().to_string())
        .user_id("user-1")
        .channel_id("channel-1")
        .user_text(text)
        .build()
        .expect("fixture turn must be valid")
}

/// The standard chat plan: memory and social-graph providers in parallel.
pub fn chat_plan() -> RoutePlan {
    RoutePlan::for_route(RouteKind::Chat)
        .with_providers(vec![ProviderKind::Memory, ProviderKind::SocialGraph])
        .with_temperature(0.7)
}

/// Canary config that admits every trace, for tests that want the pipeline.
pub fn open_canary() -> CanaryConfig {
    CanaryConfig {
        rollout_percent: 100,
        ..Default::default()
    }
}

/// Registry with canned memory and social-graph providers.
pub fn canned_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(CannedProvider::new(
        ProviderKind::Memory,
        "Recent memory: user mentioned moving to Lisbon",
    )));
    registry.register(Arc::new(CannedProvider::new(
        ProviderKind::SocialGraph,
        "Relationship: close friend of the assistant, jokes often",
    )));
    registry
}

/// Everything an orchestrator test usually wants to swap.
pub struct OrchestratorFixture {
    /// The orchestrator under test.
    pub orchestrator: TurnOrchestrator,
    /// The scripted generation client backing it.
    pub generation: Arc<ScriptedGeneration>,
    /// The scripted evaluator backing the critic.
    pub evaluator: Arc<ScriptedEvaluator>,
    /// The canary store, shared for cross-turn assertions.
    pub canary_store: Arc<InMemoryCanaryStore>,
}

/// Build an orchestrator with canned providers, a passing critic, and a
/// scripted generation client.
pub fn orchestrator_fixture(
    config: OrchestratorConfig,
    providers: Vec<Arc<dyn ContextProvider>>,
    generation: Arc<ScriptedGeneration>,
    evaluator: Arc<ScriptedEvaluator>,
    telemetry: Option<Arc<dyn TelemetryEmitter>>,
) -> OrchestratorFixture {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }

    let canary_store = Arc::new(InMemoryCanaryStore::new());

    let mut builder = TurnOrchestrator::builder()
        .config(config)
        .registry(Arc::new(registry))
        .generation(Arc::clone(&generation) as Arc<dyn GenerationClient>)
        .catalog(Arc::new(StaticModelCatalog::builtin()))
        .health(Arc::new(
            StaticHealthService::new()
                .with_score("gpt-4o", 0.9)
                .with_score("gpt-4o-mini", 0.9),
        ))
        .canary_store(Arc::clone(&canary_store) as Arc<dyn CanaryStore>)
        .evaluator(Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>);
    if let Some(telemetry) = telemetry {
        builder = builder.telemetry(telemetry);
    }

    OrchestratorFixture {
        orchestrator: builder.build().expect("fixture orchestrator must build"),
        generation,
        evaluator,
        canary_store,
    }
}

/// Shorthand: canned providers, passing critic, fixed reply, open canary.
pub fn default_fixture() -> OrchestratorFixture {
    let providers: Vec<Arc<dyn ContextProvider>> = vec![
        Arc::new(CannedProvider::new(
            ProviderKind::Memory,
            "Recent memory: user mentioned moving to Lisbon",
        )),
        Arc::new(CannedProvider::new(
            ProviderKind::SocialGraph,
            "Relationship: close friend of the assistant, jokes often",
        )),
    ];
    orchestrator_fixture(
        OrchestratorConfig {
            canary: open_canary(),
            ..Default::default()
        },
        providers,
        Arc::new(ScriptedGeneration::always("hey! good to see you again")),
        Arc::new(ScriptedEvaluator::passing()),
        None,
    )
}
