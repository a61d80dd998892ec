//! Task graph construction.
//!
//! The builder turns a route and a provider set into either a linear chain
//! (each task reads the previous task's output) or an independent fan-out
//! (every task reads the raw user input, no edges). Which shape it produces
//! depends only on the parallel flag and the provider count.

use crate::graph::{AgentGraph, AgentTaskNode, GraphEdge};
use chrono::Utc;
use orchestrator_core::{ProviderKind, RouteKind, TaskBudget};
use std::collections::{HashMap, HashSet};

/// Builder for [`AgentGraph`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    route: RouteKind,
    providers: Vec<ProviderKind>,
    skipped: HashSet<ProviderKind>,
    parallel: bool,
    user_text: String,
    user_id: Option<String>,
}

impl GraphBuilder {
    /// Create a builder for a route, seeded with the route's default
    /// provider set and parallel execution enabled.
    #[must_use]
    pub fn new(route: RouteKind) -> Self {
        Self {
            route,
            providers: route.default_providers().to_vec(),
            skipped: HashSet::new(),
            parallel: true,
            user_text: String::new(),
            user_id: None,
        }
    }

    /// Replace the provider set with an explicit list.
    #[must_use]
    pub fn providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = providers;
        self
    }

    /// Drop a provider from the set before building.
    #[must_use]
    pub fn skip(mut self, provider: ProviderKind) -> Self {
        self.skipped.insert(provider);
        self
    }

    /// Enable or disable parallel fan-out.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Set the raw user input the graph's entry tasks read.
    #[must_use]
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.user_text = text.into();
        self
    }

    /// Annotate nodes with the turn's author, for per-user provider lookups.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Build the graph.
    ///
    /// An empty provider set (after skips and dedup) yields an empty graph.
    /// With one provider, the linear and fan-out shapes are identical.
    #[must_use]
    pub fn build(self) -> AgentGraph {
        let providers = dedup_preserving_order(
            self.providers
                .into_iter()
                .filter(|p| !self.skipped.contains(p)),
        );

        let fan_out = self.parallel && providers.len() > 1;
        let mut nodes = Vec::with_capacity(providers.len());
        let mut edges = Vec::new();

        for (index, provider) in providers.iter().copied().enumerate() {
            let id = format!("{}-{}", provider.as_str(), index + 1);
            let depends_on = if fan_out || index == 0 {
                Vec::new()
            } else {
                vec![nodes
                    .last()
                    .map(|prev: &AgentTaskNode| prev.id.clone())
                    .unwrap_or_default()]
            };

            // Chain nodes past the head leave `inputs` empty: the executor
            // substitutes the dependency's output at dispatch time.
            let inputs = if fan_out || index == 0 {
                self.user_text.clone()
            } else {
                String::new()
            };

            if let Some(dep) = depends_on.first() {
                edges.push(GraphEdge {
                    from: dep.clone(),
                    to: id.clone(),
                });
            }

            let mut metadata = HashMap::new();
            if let Some(user_id) = &self.user_id {
                metadata.insert(
                    "user_id".to_string(),
                    serde_json::Value::String(user_id.clone()),
                );
            }

            nodes.push(AgentTaskNode {
                id,
                provider,
                objective: provider.default_objective().to_string(),
                inputs,
                success_criteria: format!(
                    "Concise {} context relevant to the user's message",
                    provider.as_str()
                ),
                budget: TaskBudget::for_provider(provider),
                depends_on,
                metadata,
            });
        }

        AgentGraph {
            nodes,
            edges,
            route: self.route,
            created_at: Utc::now(),
        }
    }
}

fn dedup_preserving_order(providers: impl Iterator<Item = ProviderKind>) -> Vec<ProviderKind> {
    let mut seen = HashSet::new();
    providers.filter(|p| seen.insert(*p)).collect()
}
