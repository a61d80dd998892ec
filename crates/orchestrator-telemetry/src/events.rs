//! Telemetry event types.

use chrono::{DateTime, Utc};
use orchestrator_core::{ModelResolutionDetails, RouteKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// The canary gate ruled on a turn.
    CanaryDecision {
        /// Trace id of the turn.
        trace_id: String,
        /// Route the turn was classified as.
        route: RouteKind,
        /// Whether the graph pipeline was admitted.
        allowed: bool,
        /// Stable reason string.
        reason: String,
        /// When the decision was made.
        timestamp: DateTime<Utc>,
    },
    /// A task graph was built for a turn.
    GraphBuilt {
        /// Trace id of the turn.
        trace_id: String,
        /// Route the graph was built for.
        route: RouteKind,
        /// Number of task nodes.
        node_count: usize,
        /// Number of dependency edges.
        edge_count: usize,
        /// Whether the graph is an independent fan-out.
        fan_out: bool,
        /// When the graph was built.
        timestamp: DateTime<Utc>,
    },
    /// One graph task finished.
    NodeRun {
        /// Trace id of the turn.
        trace_id: String,
        /// Node id.
        node_id: String,
        /// Provider identity string.
        agent: String,
        /// Terminal status string.
        status: String,
        /// Attempts consumed.
        attempts: u32,
        /// Wall-clock duration of the task.
        latency_ms: u64,
        /// Failure description, for failed tasks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// When the task finished.
        timestamp: DateTime<Utc>,
    },
    /// A model was resolved for synthesis.
    ModelResolved {
        /// Trace id of the turn.
        trace_id: String,
        /// The full decision trail.
        details: ModelResolutionDetails,
        /// When resolution finished.
        timestamp: DateTime<Utc>,
    },
    /// One critic iteration ran.
    CriticIteration {
        /// Trace id of the turn.
        trace_id: String,
        /// 1-based iteration index.
        iteration: u32,
        /// Score the evaluator returned, when it succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
        /// Verdict string, when the evaluator succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verdict: Option<String>,
        /// Providers re-run for the iteration.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        redispatched: Vec<String>,
        /// Whether a revision was generated.
        regenerated: bool,
        /// When the iteration finished.
        timestamp: DateTime<Utc>,
    },
    /// A turn finished end to end.
    TurnCompleted {
        /// Trace id of the turn.
        trace_id: String,
        /// Route the turn was classified as.
        route: RouteKind,
        /// Model that produced the final reply, when synthesis ran.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Length of the final reply, in characters.
        reply_chars: usize,
        /// Tasks that ended ok or skipped.
        completed_tasks: u32,
        /// Tasks that ended in error.
        failed_tasks: u32,
        /// Token estimate across stored artifacts.
        estimated_tokens: u64,
        /// Critic iterations that ran.
        critic_iterations: u32,
        /// Whether the turn fell back to the degraded reply path.
        degraded: bool,
        /// When the turn finished.
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    /// The event type as a stable string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CanaryDecision { .. } => "canary_decision",
            Self::GraphBuilt { .. } => "graph_built",
            Self::NodeRun { .. } => "node_run",
            Self::ModelResolved { .. } => "model_resolved",
            Self::CriticIteration { .. } => "critic_iteration",
            Self::TurnCompleted { .. } => "turn_completed",
        }
    }

    /// The trace id the event belongs to.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        match self {
            Self::CanaryDecision { trace_id, .. }
            | Self::GraphBuilt { trace_id, .. }
            | Self::NodeRun { trace_id, .. }
            | Self::ModelResolved { trace_id, .. }
            | Self::CriticIteration { trace_id, .. }
            | Self::TurnCompleted { trace_id, .. } => trace_id,
        }
    }

    /// Serialize for the sink boundary. Internal consumers keep the typed
    /// form; only sinks see this shape.
    #[must_use]
    pub fn to_payload(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}
