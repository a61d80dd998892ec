//! End-to-end turn flows through the full pipeline.

use crate::fixtures::*;
use crate::mocks::*;
use orchestrator_core::{ContextProvider, ProviderKind, RouteKind, RoutePlan};
use orchestrator_critic::{CriticAssessment, CriticVerdict};
use orchestrator_pipeline::OrchestratorConfig;
use orchestrator_telemetry::{TelemetryEmitter, TelemetryEvent};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_chat_turn_fans_out_two_providers() {
    let fixture = default_fixture();
    let turn = chat_turn("how was my week?");
    let plan = chat_plan();

    let outcome = fixture.orchestrator.handle_turn(&turn, &plan).await;

    // Fan-out shape: two nodes, zero edges, no dependencies.
    assert_eq!(outcome.blackboard.graph.nodes.len(), 2);
    assert_eq!(outcome.blackboard.graph.edges.len(), 0);
    assert!(outcome
        .blackboard
        .graph
        .nodes
        .iter()
        .all(|n| n.depends_on.is_empty()));

    // Both tasks completed and both artifacts landed.
    assert_eq!(outcome.blackboard.counters.completed_tasks, 2);
    assert_eq!(outcome.blackboard.counters.failed_tasks, 0);
    assert_eq!(outcome.blackboard.artifacts.len(), 2);

    assert!(outcome.admission.allowed);
    assert!(!outcome.degraded);
    assert_eq!(outcome.reply, "hey! good to see you again");
}

#[tokio::test]
async fn test_synthesis_prompt_carries_retrieved_context() {
    let fixture = default_fixture();
    let turn = chat_turn("how was my week?");
    let outcome = fixture.orchestrator.handle_turn(&turn, &chat_plan()).await;
    assert!(!outcome.degraded);

    let requests = fixture.generation.requests();
    assert_eq!(requests.len(), 1);
    let system = &requests[0].messages[0].content;
    assert!(system.contains("moving to Lisbon"));
    assert!(system.contains("close friend"));
}

#[tokio::test]
async fn test_passing_critic_means_one_evaluation_no_regeneration() {
    let fixture = default_fixture();
    let turn = chat_turn("hello");
    let outcome = fixture.orchestrator.handle_turn(&turn, &chat_plan()).await;

    assert_eq!(fixture.evaluator.calls(), 1);
    // One synthesis call, zero revision calls.
    assert_eq!(fixture.generation.call_count(), 1);
    assert_eq!(outcome.critic_iterations.len(), 1);
    assert!(!outcome.critic_iterations[0].regenerated);
}

#[tokio::test]
async fn test_revising_critic_regenerates_with_fresh_context() {
    let providers: Vec<Arc<dyn ContextProvider>> = vec![
        Arc::new(CannedProvider::new(ProviderKind::Memory, "memory context")),
        Arc::new(CannedProvider::new(
            ProviderKind::SocialGraph,
            "social context",
        )),
        Arc::new(CannedProvider::new(
            ProviderKind::Knowledge,
            "knowledge: the fact in question is confirmed",
        )),
    ];
    let evaluator = Arc::new(ScriptedEvaluator::new(vec![
        Ok(CriticAssessment {
            score: 0.4,
            verdict: CriticVerdict::Revise,
            issues: vec!["second paragraph looks factually incorrect".to_string()],
            rewrite_prompt: Some("fix the second paragraph".to_string()),
            model: "mock-critic".to_string(),
        }),
        Ok(CriticAssessment {
            score: 0.9,
            verdict: CriticVerdict::Pass,
            issues: Vec::new(),
            rewrite_prompt: None,
            model: "mock-critic".to_string(),
        }),
    ]));
    let generation = Arc::new(ScriptedGeneration::always("draft reply"));
    let fixture = orchestrator_fixture(
        OrchestratorConfig {
            canary: open_canary(),
            ..Default::default()
        },
        providers,
        generation,
        evaluator,
        None,
    );

    let turn = chat_turn("tell me about that fact");
    let outcome = fixture.orchestrator.handle_turn(&turn, &chat_plan()).await;

    assert_eq!(fixture.evaluator.calls(), 2);
    // Synthesis plus one revision.
    assert_eq!(fixture.generation.call_count(), 2);
    assert_eq!(outcome.critic_iterations.len(), 2);
    assert_eq!(
        outcome.critic_iterations[0].redispatched,
        vec![ProviderKind::Knowledge]
    );
    assert!(outcome.critic_iterations[0].regenerated);

    // The revision prompt folded the redispatched provider's fresh output in.
    let revision_request = &fixture.generation.requests()[1];
    assert!(revision_request.messages[0]
        .content
        .contains("the fact in question is confirmed"));
    // And ran cooler than the original synthesis.
    assert!(revision_request.temperature < 0.7);
}

#[tokio::test]
async fn test_voice_narration_turn_skips_critic() {
    let fixture = default_fixture();
    let turn = chat_turn("read this aloud");
    let plan = chat_plan().with_voice_narration(true);

    let outcome = fixture.orchestrator.handle_turn(&turn, &plan).await;

    assert_eq!(fixture.evaluator.calls(), 0);
    assert!(outcome.critic_iterations.is_empty());
    assert!(!outcome.degraded);
}

#[tokio::test]
async fn test_telemetry_event_sequence() {
    let telemetry = CapturingTelemetry::new();
    let providers: Vec<Arc<dyn ContextProvider>> = vec![Arc::new(CannedProvider::new(
        ProviderKind::Memory,
        "memory context",
    ))];
    let fixture = orchestrator_fixture(
        OrchestratorConfig {
            canary: open_canary(),
            ..Default::default()
        },
        providers,
        Arc::new(ScriptedGeneration::always("reply")),
        Arc::new(ScriptedEvaluator::passing()),
        Some(Arc::clone(&telemetry) as Arc<dyn TelemetryEmitter>),
    );

    let turn = chat_turn("hello");
    let plan = RoutePlan::for_route(RouteKind::Chat).with_providers(vec![ProviderKind::Memory]);
    fixture.orchestrator.handle_turn(&turn, &plan).await;

    let types = telemetry.event_types();
    assert_eq!(
        types,
        vec![
            "canary_decision",
            "graph_built",
            "node_run",
            "model_resolved",
            "critic_iteration",
            "turn_completed",
        ]
    );

    // The resolution event carries the full decision trail.
    let events = telemetry.events();
    let resolved = events
        .iter()
        .find_map(|e| match e {
            TelemetryEvent::ModelResolved { details, .. } => Some(details.clone()),
            _ => None,
        })
        .expect("model resolution event");
    assert!(!resolved.decisions.is_empty());
    assert!(resolved.winning_decision().is_some());
}

#[tokio::test]
async fn test_single_provider_plan_builds_single_node() {
    let fixture = default_fixture();
    let turn = chat_turn("hello");
    let plan = RoutePlan::for_route(RouteKind::Chat).with_providers(vec![ProviderKind::Memory]);

    let outcome = fixture.orchestrator.handle_turn(&turn, &plan).await;

    assert_eq!(outcome.blackboard.graph.nodes.len(), 1);
    assert_eq!(outcome.blackboard.graph.nodes[0].id, "memory-1");
    assert_eq!(outcome.blackboard.counters.completed_tasks, 1);
}

#[tokio::test]
async fn test_duplicate_providers_collapse_in_full_flow() {
    let fixture = default_fixture();
    let turn = chat_turn("hello");
    let plan = RoutePlan::for_route(RouteKind::Chat).with_providers(vec![
        ProviderKind::Memory,
        ProviderKind::Memory,
        ProviderKind::SocialGraph,
        ProviderKind::Memory,
    ]);

    let outcome = fixture.orchestrator.handle_turn(&turn, &plan).await;

    assert_eq!(outcome.blackboard.graph.nodes.len(), 2);
    let kinds: Vec<ProviderKind> = outcome
        .blackboard
        .graph
        .nodes
        .iter()
        .map(|n| n.provider)
        .collect();
    assert_eq!(kinds, vec![ProviderKind::Memory, ProviderKind::SocialGraph]);
}

#[tokio::test]
async fn test_sequential_plan_builds_linear_chain() {
    let providers: Vec<Arc<dyn ContextProvider>> = vec![
        Arc::new(CannedProvider::new(ProviderKind::Memory, "memory context")),
        Arc::new(CannedProvider::new(
            ProviderKind::SocialGraph,
            "social context",
        )),
    ];
    let fixture = orchestrator_fixture(
        OrchestratorConfig {
            parallel_retrieval: false,
            canary: open_canary(),
            ..Default::default()
        },
        providers,
        Arc::new(ScriptedGeneration::always("reply")),
        Arc::new(ScriptedEvaluator::passing()),
        None,
    );

    let turn = chat_turn("hello");
    let outcome = fixture.orchestrator.handle_turn(&turn, &chat_plan()).await;

    assert_eq!(outcome.blackboard.graph.edges.len(), 1);
    assert_eq!(
        outcome.blackboard.graph.nodes[1].depends_on,
        vec!["memory-1".to_string()]
    );
    assert_eq!(outcome.blackboard.counters.completed_tasks, 2);
}
