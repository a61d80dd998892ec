//! Targeted provider re-execution for the critic loop.

use async_trait::async_trait;
use orchestrator_core::{BlackboardArtifact, ProviderKind, RouteKind};
use orchestrator_critic::ProviderRedispatcher;
use orchestrator_graph::{BlackboardState, GraphBuilder, GraphExecutor};
use std::sync::Arc;
use tracing::warn;

/// Re-runs a provider subset through the graph executor as a small fan-out,
/// on a throwaway blackboard, returning whatever fresh artifacts come back.
pub struct ExecutorRedispatcher {
    executor: Arc<GraphExecutor>,
    route: RouteKind,
    trace_id: String,
    user_text: String,
    user_id: String,
}

impl ExecutorRedispatcher {
    /// Create a redispatcher for one turn.
    #[must_use]
    pub fn new(
        executor: Arc<GraphExecutor>,
        route: RouteKind,
        trace_id: impl Into<String>,
        user_text: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            route,
            trace_id: trace_id.into(),
            user_text: user_text.into(),
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl ProviderRedispatcher for ExecutorRedispatcher {
    async fn redispatch(&self, providers: &[ProviderKind]) -> Vec<BlackboardArtifact> {
        let graph = GraphBuilder::new(self.route)
            .providers(providers.to_vec())
            .parallel(true)
            .user_text(&self.user_text)
            .user_id(&self.user_id)
            .build();

        let mut board = BlackboardState::create(
            format!("{}-redispatch", self.trace_id),
            &self.user_text,
            graph.clone(),
        );

        match self.executor.execute(&graph, &mut board).await {
            Ok(_) => board.artifacts,
            Err(error) => {
                // Redispatch is best-effort; the critic revises without
                // fresh context.
                warn!(%error, trace_id = %self.trace_id, "critic redispatch failed");
                Vec::new()
            }
        }
    }
}
