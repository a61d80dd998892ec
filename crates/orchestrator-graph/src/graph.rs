//! The per-turn task graph.

use chrono::{DateTime, Utc};
use orchestrator_core::{OrchestratorError, ProviderKind, RouteKind, TaskBudget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One provider task in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskNode {
    /// Node id, `{provider}-{1-based index}`; unique per graph.
    pub id: String,

    /// Which provider executes the task.
    pub provider: ProviderKind,

    /// What the task is meant to accomplish.
    pub objective: String,

    /// The text the provider reads: the raw user input for fan-out nodes,
    /// the prior node's output for chain nodes.
    pub inputs: String,

    /// What a good result looks like, for telemetry and prompts.
    pub success_criteria: String,

    /// Resource bounds for the task.
    pub budget: TaskBudget,

    /// Node ids that must reach a terminal state before this task starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Free-form annotations carried into telemetry.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// A directed edge between two task nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
}

/// The per-turn DAG of provider tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGraph {
    /// Task nodes, in build order.
    pub nodes: Vec<AgentTaskNode>,
    /// Directed edges.
    pub edges: Vec<GraphEdge>,
    /// Route the graph was built for.
    pub route: RouteKind,
    /// When the graph was built.
    pub created_at: DateTime<Utc>,
}

impl AgentGraph {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&AgentTaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether the graph has no dependency edges.
    #[must_use]
    pub fn is_fan_out(&self) -> bool {
        self.edges.is_empty() && self.nodes.iter().all(|n| n.depends_on.is_empty())
    }

    /// Validate the structural invariants: unique node ids, resolvable
    /// dependencies, and acyclicity.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidGraph`] naming the violated
    /// invariant.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(OrchestratorError::invalid_graph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        for node in &self.nodes {
            for dep in &node.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(OrchestratorError::invalid_graph(format!(
                        "node '{}' depends on unknown node '{}'",
                        node.id, dep
                    )));
                }
            }
        }

        self.check_acyclic()
    }

    /// Kahn's algorithm: if a topological order cannot consume every node,
    /// the remainder forms a cycle.
    fn check_acyclic(&self) -> Result<(), OrchestratorError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.depends_on.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            for dep in &node.depends_on {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(node.id.as_str());
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut consumed = 0usize;

        while let Some(id) = ready.pop() {
            consumed += 1;
            if let Some(next) = dependents.get(id) {
                for dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(dependent);
                        }
                    }
                }
            }
        }

        if consumed == self.nodes.len() {
            Ok(())
        } else {
            Err(OrchestratorError::invalid_graph(
                "dependency cycle detected",
            ))
        }
    }
}
