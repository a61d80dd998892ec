//! Dependency-ordered graph execution.
//!
//! The executor runs a graph's tasks under a parallelism ceiling. A task
//! starts only once all of its dependencies are terminal; independent tasks
//! run concurrently. Each provider call is bounded by the task's own latency
//! budget and retried on transient failure; an exhausted task is marked
//! failed while its siblings continue. The executor is the blackboard's
//! single writer: results are applied in completion order as tasks join.

use crate::blackboard::{BlackboardState, TaskResult, TaskStatus};
use crate::graph::{AgentGraph, AgentTaskNode};
use chrono::{DateTime, Utc};
use orchestrator_core::{
    BlackboardArtifact, ContextProvider, OrchestratorError, ProviderRegistry, ProviderRequest,
    TaskBudget,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum tasks in flight at once; clamped to at least 1.
    pub max_parallelism: usize,
    /// Base delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Upper bound on any retry delay.
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
    /// Jitter factor applied to retry delays (0.0 - 1.0).
    pub retry_jitter: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 4,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(2),
            retry_jitter: 0.25,
        }
    }
}

/// Structured record of one task's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRunRecord {
    /// Node id.
    pub node_id: String,
    /// Provider identity string.
    pub agent: String,
    /// Terminal status the task reached.
    pub status: TaskStatus,
    /// Attempts consumed, including retries.
    pub attempts: u32,
    /// Dispatch time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration of the task, across all attempts.
    pub latency_ms: u64,
    /// Failure description, for failed tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// One entry in the ordered execution event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A task was dispatched.
    NodeStarted {
        /// Node id.
        node_id: String,
        /// Provider identity string.
        agent: String,
        /// When the task was dispatched.
        timestamp: DateTime<Utc>,
    },
    /// A task finished successfully.
    NodeCompleted {
        /// Node id.
        node_id: String,
        /// Provider identity string.
        agent: String,
        /// Attempts consumed.
        attempts: u32,
        /// Wall-clock duration.
        latency_ms: u64,
        /// When the task completed.
        timestamp: DateTime<Utc>,
    },
    /// A task failed after exhausting its retry budget.
    NodeFailed {
        /// Node id.
        node_id: String,
        /// Provider identity string.
        agent: String,
        /// Attempts consumed.
        attempts: u32,
        /// Failure description.
        error: String,
        /// When the task failed.
        timestamp: DateTime<Utc>,
    },
    /// A task was not executed.
    NodeSkipped {
        /// Node id.
        node_id: String,
        /// Provider identity string.
        agent: String,
        /// Why the task was skipped.
        reason: String,
        /// When the skip was recorded.
        timestamp: DateTime<Utc>,
    },
}

/// Everything a graph run produced, beyond the blackboard mutations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Per-task run records, in completion order.
    pub records: Vec<NodeRunRecord>,
    /// Ordered event log.
    pub events: Vec<ExecutionEvent>,
}

impl ExecutionReport {
    /// Node ids of failed tasks.
    #[must_use]
    pub fn failed_node_ids(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == TaskStatus::Error)
            .map(|r| r.node_id.as_str())
            .collect()
    }

    /// Number of tasks that ended ok.
    #[must_use]
    pub fn ok_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == TaskStatus::Ok)
            .count()
    }

    /// Number of tasks that ended in error.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == TaskStatus::Error)
            .count()
    }
}

/// Outcome of one task's run, joined back on the driver.
struct NodeOutcome {
    node_id: String,
    agent: String,
    status: TaskStatus,
    attempts: u32,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    latency_ms: u64,
    error_text: Option<String>,
    content: Option<String>,
    artifacts: Vec<BlackboardArtifact>,
    unresolved_questions: Vec<String>,
}

/// Runs task graphs against the provider registry.
pub struct GraphExecutor {
    registry: Arc<ProviderRegistry>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    /// Create an executor over a provider registry.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(registry: Arc<ProviderRegistry>) -> Self {
        Self::new(registry, ExecutorConfig::default())
    }

    /// Execute a graph, applying every result to the blackboard in
    /// completion order.
    ///
    /// Per-task failures are isolated; they never abort the run. The only
    /// errors surfaced here are graph-level: a structurally invalid graph.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidGraph`] when validation fails.
    #[instrument(skip(self, graph, board), fields(trace_id = %board.trace_id, nodes = graph.nodes.len()))]
    pub async fn execute(
        &self,
        graph: &AgentGraph,
        board: &mut BlackboardState,
    ) -> Result<ExecutionReport, OrchestratorError> {
        graph.validate()?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallelism.max(1)));
        let mut report = ExecutionReport::default();
        let mut terminal: HashMap<String, TaskStatus> = HashMap::new();
        let mut node_content: HashMap<String, String> = HashMap::new();
        let mut node_artifacts: HashMap<String, Vec<BlackboardArtifact>> = HashMap::new();
        let mut launched: HashSet<String> = HashSet::new();
        let mut in_flight: JoinSet<NodeOutcome> = JoinSet::new();

        loop {
            self.launch_ready(
                graph,
                board,
                &semaphore,
                &mut terminal,
                &node_content,
                &node_artifacts,
                &mut launched,
                &mut in_flight,
                &mut report,
            );

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok(outcome) => {
                    terminal.insert(outcome.node_id.clone(), outcome.status);
                    if let Some(content) = &outcome.content {
                        node_content.insert(outcome.node_id.clone(), content.clone());
                    }
                    node_artifacts.insert(outcome.node_id.clone(), outcome.artifacts.clone());
                    apply_outcome(board, &mut report, outcome);
                }
                Err(join_error) => {
                    // A panicked task loses its identity; the final sweep
                    // below records the orphaned node as failed.
                    warn!(error = %join_error, "executor task aborted");
                }
            }
        }

        // Any node still non-terminal (aborted task, unreachable after an
        // aborted dependency) is closed out as failed so the blackboard
        // invariants hold.
        for node in &graph.nodes {
            if !terminal.contains_key(&node.id) && launched.contains(&node.id) {
                let now = Utc::now();
                apply_outcome(
                    board,
                    &mut report,
                    NodeOutcome {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        status: TaskStatus::Error,
                        attempts: 1,
                        started_at: now,
                        finished_at: now,
                        latency_ms: 0,
                        error_text: Some("executor task aborted".to_string()),
                        content: None,
                        artifacts: Vec::new(),
                        unresolved_questions: Vec::new(),
                    },
                );
            }
        }

        Ok(report)
    }

    /// Dispatch every task whose dependencies are all terminal. Repeats
    /// until a pass launches nothing, since a skip can unblock dependents
    /// without a join.
    #[allow(clippy::too_many_arguments)]
    fn launch_ready(
        &self,
        graph: &AgentGraph,
        board: &mut BlackboardState,
        semaphore: &Arc<Semaphore>,
        terminal: &mut HashMap<String, TaskStatus>,
        node_content: &HashMap<String, String>,
        node_artifacts: &HashMap<String, Vec<BlackboardArtifact>>,
        launched: &mut HashSet<String>,
        in_flight: &mut JoinSet<NodeOutcome>,
        report: &mut ExecutionReport,
    ) {
        loop {
            let mut progressed = false;

            for node in &graph.nodes {
                if launched.contains(&node.id) {
                    continue;
                }
                if !node.depends_on.iter().all(|d| terminal.contains_key(d)) {
                    continue;
                }
                launched.insert(node.id.clone());
                progressed = true;

                let Some(handler) = self.registry.get(node.provider) else {
                    debug!(node_id = %node.id, agent = %node.provider, "no handler registered, skipping task");
                    let now = Utc::now();
                    report.events.push(ExecutionEvent::NodeSkipped {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        reason: "no handler registered".to_string(),
                        timestamp: now,
                    });
                    terminal.insert(node.id.clone(), TaskStatus::Skipped);
                    let record = NodeRunRecord {
                        node_id: node.id.clone(),
                        agent: node.provider.as_str().to_string(),
                        status: TaskStatus::Skipped,
                        attempts: 0,
                        started_at: None,
                        finished_at: Some(now),
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

                let request = build_request(board, node, node_content, node_artifacts);
                let budget = node.budget;
                let retry = self.config.clone();
                let node_id = node.id.clone();
                let agent = node.provider.as_str().to_string();
                let permit_source = Arc::clone(semaphore);

                in_flight.spawn(async move {
                    let _permit = permit_source.acquire_owned().await;
                    run_node(handler, request, budget, &retry, node_id, agent).await
                });
            }

            if !progressed {
                break;
            }
        }
    }
}

/// Assemble the provider request for a task. Chain nodes with empty inputs
/// read their dependencies' outputs; when those are missing (a failed
/// upstream) the raw user text stands in, as degraded but usable context.
fn build_request(
    board: &BlackboardState,
    node: &AgentTaskNode,
    node_content: &HashMap<String, String>,
    node_artifacts: &HashMap<String, Vec<BlackboardArtifact>>,
) -> ProviderRequest {
    let input_text = if node.inputs.is_empty() {
        let upstream_text: Vec<String> = node
            .depends_on
            .iter()
            .filter_map(|dep| node_content.get(dep))
            .cloned()
            .collect();
        if upstream_text.is_empty() {
            board.user_text.clone()
        } else {
            upstream_text.join("\n\n")
        }
    } else {
        node.inputs.clone()
    };

    let upstream = node
        .depends_on
        .iter()
        .filter_map(|dep| node_artifacts.get(dep))
        .flatten()
        .cloned()
        .collect();

    let user_id = node
        .metadata
        .get("user_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    ProviderRequest {
        trace_id: board.trace_id.clone(),
        objective: node.objective.clone(),
        input_text,
        user_id,
        upstream,
    }
}

/// Run one task: timeout per attempt, retry transient failures with
/// exponential backoff and jitter, and wrap the provider output into an
/// artifact on success.
async fn run_node(
    handler: Arc<dyn ContextProvider>,
    request: ProviderRequest,
    budget: TaskBudget,
    config: &ExecutorConfig,
    node_id: String,
    agent: String,
) -> NodeOutcome {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_error: Option<OrchestratorError> = None;

    while attempts <= budget.max_retries {
        attempts += 1;
        match tokio::time::timeout(budget.latency(), handler.retrieve(&request)).await {
            Ok(Ok(output)) => {
                let content = output.content.clone();
                let unresolved_questions = output.unresolved_questions.clone();
                let artifact = output.into_artifact(&node_id, handler.kind());

                let finished_at = Utc::now();
                return NodeOutcome {
                    node_id,
                    agent,
                    status: TaskStatus::Ok,
                    attempts,
                    started_at,
                    finished_at,
                    latency_ms: start.elapsed().as_millis() as u64,
                    error_text: None,
                    content: Some(content),
                    artifacts: vec![artifact],
                    unresolved_questions,
                };
            }
            Ok(Err(error)) => {
                let retryable = error.is_retryable();
                debug!(
                    node_id = %node_id,
                    attempt = attempts,
                    error = %error,
                    retryable,
                    "task attempt failed"
                );
                last_error = Some(error);
                if !retryable {
                    break;
                }
            }
            Err(_) => {
                debug!(node_id = %node_id, attempt = attempts, "task attempt timed out");
                last_error = Some(OrchestratorError::timeout(budget.latency()));
            }
        }

        if attempts <= budget.max_retries {
            tokio::time::sleep(delay_for_attempt(config, attempts - 1)).await;
        }
    }

    let finished_at = Utc::now();
    NodeOutcome {
        node_id,
        agent,
        status: TaskStatus::Error,
        attempts,
        started_at,
        finished_at,
        latency_ms: start.elapsed().as_millis() as u64,
        error_text: Some(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown task failure".to_string()),
        ),
        content: None,
        artifacts: Vec::new(),
        unresolved_questions: Vec::new(),
    }
}

/// Exponential backoff with jitter, 0-indexed over completed attempts.
fn delay_for_attempt(config: &ExecutorConfig, attempt: u32) -> Duration {
    let base = config.retry_base_delay.as_millis() as f64;
    let delay = (base * 2f64.powi(attempt as i32)).min(config.retry_max_delay.as_millis() as f64);
    let jitter_range = delay * config.retry_jitter;
    let jitter = if jitter_range > 0.0 {
        rand::thread_rng().gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };
    Duration::from_millis((delay + jitter).max(0.0) as u64)
}

/// Fold one completed task back into the blackboard and the report.
fn apply_outcome(board: &mut BlackboardState, report: &mut ExecutionReport, outcome: NodeOutcome) {
    let record = NodeRunRecord {
        node_id: outcome.node_id.clone(),
        agent: outcome.agent.clone(),
        status: outcome.status,
        attempts: outcome.attempts,
        started_at: Some(outcome.started_at),
        finished_at: Some(outcome.finished_at),
        latency_ms: outcome.latency_ms,
        error_text: outcome.error_text.clone(),
    };

    report.events.push(match outcome.status {
        TaskStatus::Error => ExecutionEvent::NodeFailed {
            node_id: outcome.node_id.clone(),
            agent: outcome.agent.clone(),
            attempts: outcome.attempts,
            error: outcome.error_text.clone().unwrap_or_default(),
            timestamp: outcome.finished_at,
        },
        _ => ExecutionEvent::NodeCompleted {
            node_id: outcome.node_id.clone(),
            agent: outcome.agent.clone(),
            attempts: outcome.attempts,
            latency_ms: outcome.latency_ms,
            timestamp: outcome.finished_at,
        },
    });

    board.record_task_result(TaskResult {
        node_id: outcome.node_id,
        agent: outcome.agent,
        status: outcome.status,
        attempts: outcome.attempts,
        started_at: Some(outcome.started_at),
        finished_at: Some(outcome.finished_at),
        error_text: outcome.error_text,
        artifacts: outcome.artifacts,
    });
    for question in outcome.unresolved_questions {
        board.add_unresolved_question(&question);
    }

    report.records.push(record);
}
