//! Telemetry emission.

use crate::events::TelemetryEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Telemetry sink interface.
///
/// Emission is infallible at the call site: implementations log their own
/// failures and never propagate them into the turn.
#[async_trait]
pub trait TelemetryEmitter: Send + Sync + std::fmt::Debug {
    /// Emit one event, best-effort.
    async fn emit(&self, event: TelemetryEvent);

    /// Flush any buffered events, best-effort.
    async fn flush(&self);
}

/// Default emitter that logs events via tracing.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetryEmitter {
    namespace: String,
}

impl TracingTelemetryEmitter {
    /// Create an emitter with a namespace tag.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl TelemetryEmitter for TracingTelemetryEmitter {
    async fn emit(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::CanaryDecision {
                trace_id,
                route,
                allowed,
                reason,
                ..
            } => {
                info!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    route = %route,
                    allowed = %allowed,
                    reason = %reason,
                    "Canary decision"
                );
            }
            TelemetryEvent::GraphBuilt {
                trace_id,
                route,
                node_count,
                edge_count,
                fan_out,
                ..
            } => {
                info!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    route = %route,
                    node_count = %node_count,
                    edge_count = %edge_count,
                    fan_out = %fan_out,
                    "Task graph built"
                );
            }
            TelemetryEvent::NodeRun {
                trace_id,
                node_id,
                agent,
                status,
                attempts,
                latency_ms,
                error,
                ..
            } => {
                debug!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    node_id = %node_id,
                    agent = %agent,
                    status = %status,
                    attempts = %attempts,
                    latency_ms = %latency_ms,
                    error = ?error,
                    "Graph task finished"
                );
            }
            TelemetryEvent::ModelResolved {
                trace_id, details, ..
            } => {
                info!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    model = %details.model,
                    route = %details.route,
                    candidates = details.candidates.len(),
                    decisions = details.decisions.len(),
                    allowlist_applied = %details.allowlist_applied,
                    "Model resolved"
                );
            }
            TelemetryEvent::CriticIteration {
                trace_id,
                iteration,
                score,
                verdict,
                regenerated,
                ..
            } => {
                info!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    iteration = %iteration,
                    score = ?score,
                    verdict = ?verdict,
                    regenerated = %regenerated,
                    "Critic iteration"
                );
            }
            TelemetryEvent::TurnCompleted {
                trace_id,
                route,
                model,
                reply_chars,
                completed_tasks,
                failed_tasks,
                degraded,
                ..
            } => {
                info!(
                    namespace = %self.namespace,
                    trace_id = %trace_id,
                    route = %route,
                    model = ?model,
                    reply_chars = %reply_chars,
                    completed_tasks = %completed_tasks,
                    failed_tasks = %failed_tasks,
                    degraded = %degraded,
                    "Turn completed"
                );
            }
        }
    }

    async fn flush(&self) {
        // Tracing emitter doesn't buffer.
    }
}

/// Fans events out to multiple sinks.
#[derive(Debug)]
pub struct CompositeTelemetryEmitter {
    emitters: Vec<Arc<dyn TelemetryEmitter>>,
}

impl CompositeTelemetryEmitter {
    /// Create a composite over the given sinks.
    #[must_use]
    pub fn new(emitters: Vec<Arc<dyn TelemetryEmitter>>) -> Self {
        Self { emitters }
    }

    /// Add a sink.
    pub fn add(&mut self, emitter: Arc<dyn TelemetryEmitter>) {
        self.emitters.push(emitter);
    }
}

#[async_trait]
impl TelemetryEmitter for CompositeTelemetryEmitter {
    async fn emit(&self, event: TelemetryEvent) {
        for emitter in &self.emitters {
            emitter.emit(event.clone()).await;
        }
    }

    async fn flush(&self) {
        for emitter in &self.emitters {
            emitter.flush().await;
        }
    }
}

/// Discards everything; for tests and disabled telemetry.
#[derive(Debug, Clone, Default)]
pub struct NoOpTelemetryEmitter;

#[async_trait]
impl TelemetryEmitter for NoOpTelemetryEmitter {
    async fn emit(&self, _event: TelemetryEvent) {}

    async fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchestrator_core::RouteKind;

    fn sample_event() -> TelemetryEvent {
        TelemetryEvent::CanaryDecision {
            trace_id: "t-1".to_string(),
            route: RouteKind::Chat,
            allowed: false,
            reason: "out_of_rollout_sample".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tracing_emitter_does_not_panic() {
        let emitter = TracingTelemetryEmitter::new("test");
        emitter.emit(sample_event()).await;
        emitter.flush().await;
    }

    #[tokio::test]
    async fn test_composite_fans_out() {
        let mut composite = CompositeTelemetryEmitter::new(vec![Arc::new(NoOpTelemetryEmitter)]);
        composite.add(Arc::new(TracingTelemetryEmitter::new("test")));
        composite.emit(sample_event()).await;
        composite.flush().await;
    }
}
