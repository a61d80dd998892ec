//! The per-turn blackboard.
//!
//! One blackboard aggregates everything a turn's task graph produces: task
//! snapshots, artifacts, unresolved questions, and counters. It has a single
//! writer (the executor driver); tasks never mutate it concurrently.

use crate::graph::AgentGraph;
use chrono::{DateTime, Utc};
use orchestrator_core::{BlackboardArtifact, RouteKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Lifecycle state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Dispatched, awaiting a terminal result.
    Running,
    /// Finished successfully.
    Ok,
    /// Intentionally not executed (e.g. no handler registered).
    Skipped,
    /// Failed after exhausting its retry budget.
    Error,
}

impl TaskStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Skipped | Self::Error)
    }

    /// Whether the status counts as completed (ok or skipped).
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Ok | Self::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Snapshot of one task's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Dispatch attempts so far, including retries.
    pub attempts: u32,
    /// When the task first started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure description, for error results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskSnapshot {
    fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// Monotonic per-turn counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TurnCounters {
    /// Tasks that ended ok or skipped.
    pub completed_tasks: u32,
    /// Tasks that ended in error.
    pub failed_tasks: u32,
    /// Length-heuristic token estimate across stored artifacts.
    pub total_estimated_tokens: u64,
}

/// A terminal result for one task, as recorded by the executor.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Node the result belongs to.
    pub node_id: String,
    /// Provider identity string.
    pub agent: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// Attempts consumed.
    pub attempts: u32,
    /// Dispatch time.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure description, for error results.
    pub error_text: Option<String>,
    /// Artifacts the task produced.
    pub artifacts: Vec<BlackboardArtifact>,
}

/// The single-writer aggregate for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardState {
    /// Trace id of the owning turn.
    pub trace_id: String,
    /// Route the turn was classified as.
    pub route: RouteKind,
    /// The user's message text.
    pub user_text: String,
    /// When the blackboard was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed by every mutation.
    pub updated_at: DateTime<Utc>,
    /// The graph this blackboard tracks.
    pub graph: AgentGraph,
    /// Stored artifacts, in completion order.
    pub artifacts: Vec<BlackboardArtifact>,
    /// Task snapshots keyed by node id.
    pub tasks: HashMap<String, TaskSnapshot>,
    /// Deduplicated questions no provider could answer.
    pub unresolved_questions: Vec<String>,
    /// Monotonic counters.
    pub counters: TurnCounters,
}

impl BlackboardState {
    /// Initialize a blackboard with one pending snapshot per graph node.
    #[must_use]
    pub fn create(
        trace_id: impl Into<String>,
        user_text: impl Into<String>,
        graph: AgentGraph,
    ) -> Self {
        let now = Utc::now();
        let tasks = graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), TaskSnapshot::pending()))
            .collect();
        Self {
            trace_id: trace_id.into(),
            route: graph.route,
            user_text: user_text.into(),
            created_at: now,
            updated_at: now,
            graph,
            artifacts: Vec::new(),
            tasks,
            unresolved_questions: Vec::new(),
            counters: TurnCounters::default(),
        }
    }

    /// Mark a task as running and count the dispatch attempt.
    pub fn mark_task_started(&mut self, node_id: &str) {
        if let Some(snapshot) = self.tasks.get_mut(node_id) {
            snapshot.status = TaskStatus::Running;
            snapshot.attempts += 1;
            if snapshot.started_at.is_none() {
                snapshot.started_at = Some(Utc::now());
            }
        } else {
            warn!(node_id = %node_id, "mark_task_started for unknown task");
        }
        self.touch();
    }

    /// Store artifacts, deduplicating by id.
    ///
    /// Confidence is clamped into [0, 1] (NaN becomes 0) and the token
    /// estimate grows only for artifacts actually inserted; re-appending a
    /// seen id changes nothing.
    pub fn append_artifacts(&mut self, artifacts: Vec<BlackboardArtifact>) {
        for mut artifact in artifacts {
            if self.artifacts.iter().any(|a| a.id == artifact.id) {
                continue;
            }
            artifact.confidence = clamp_confidence(artifact.confidence);
            self.counters.total_estimated_tokens += estimate_tokens(&artifact.content);
            self.artifacts.push(artifact);
        }
        self.touch();
    }

    /// Record a terminal result for a task: update its snapshot, bump the
    /// counters exactly once, then store the result's artifacts.
    pub fn record_task_result(&mut self, result: TaskResult) {
        if !result.status.is_terminal() {
            warn!(
                node_id = %result.node_id,
                status = %result.status,
                "ignoring non-terminal task result"
            );
            return;
        }

        let Some(snapshot) = self.tasks.get_mut(&result.node_id) else {
            warn!(node_id = %result.node_id, "result for unknown task");
            return;
        };
        if snapshot.status.is_terminal() {
            warn!(node_id = %result.node_id, "duplicate terminal result ignored");
            return;
        }

        snapshot.status = result.status;
        snapshot.attempts = snapshot.attempts.max(result.attempts);
        snapshot.started_at = snapshot.started_at.or(result.started_at);
        snapshot.finished_at = result.finished_at.or_else(|| Some(Utc::now()));
        snapshot.error = result.error_text;

        if result.status.is_completed() {
            self.counters.completed_tasks += 1;
        } else {
            self.counters.failed_tasks += 1;
        }

        self.append_artifacts(result.artifacts);
    }

    /// Surface a question no provider could answer; trimmed, exact-text
    /// deduplicated.
    pub fn add_unresolved_question(&mut self, question: &str) {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return;
        }
        if !self.unresolved_questions.iter().any(|q| q == trimmed) {
            self.unresolved_questions.push(trimmed.to_string());
        }
        self.touch();
    }

    /// Look up an artifact by id.
    #[must_use]
    pub fn artifact(&self, id: &str) -> Option<&BlackboardArtifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Number of tasks with a recorded terminal result.
    #[must_use]
    pub fn terminal_task_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|s| s.status.is_terminal())
            .count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Length heuristic: roughly four characters per token, rounded up.
fn estimate_tokens(content: &str) -> u64 {
    (content.len() as u64 + 3) / 4
}
