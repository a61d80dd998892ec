//! The admission controller.

use crate::store::{CanaryOutcome, CanaryStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orchestrator_core::RouteKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decision reason strings, stable for telemetry.
pub mod reasons {
    /// The gate itself is disabled; turns pass through.
    pub const DISABLED: &str = "disabled";
    /// The route is not allow-listed for the graph pipeline.
    pub const ROUTE_NOT_ALLOWLISTED: &str = "route_not_allowlisted";
    /// The error budget tripped and the cooldown has not elapsed.
    pub const ERROR_BUDGET_COOLDOWN: &str = "error_budget_cooldown";
    /// The trace hashed outside the rollout sample.
    pub const OUT_OF_ROLLOUT_SAMPLE: &str = "out_of_rollout_sample";
    /// The trace hashed inside the rollout sample.
    pub const IN_ROLLOUT_SAMPLE: &str = "in_rollout_sample";
}

/// Canary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryConfig {
    /// Whether the gate is active at all. A disabled gate admits every turn.
    pub enabled: bool,
    /// Percentage of traces admitted to the graph pipeline (0-100).
    pub rollout_percent: u8,
    /// Routes eligible for the graph pipeline.
    pub allowed_routes: Vec<RouteKind>,
    /// Failure rate at or above which the gate trips.
    pub max_failure_rate: f64,
    /// Minimum window occupancy before the failure rate is considered.
    pub min_samples: usize,
    /// Rolling window capacity.
    pub window_size: usize,
    /// How long the gate stays closed after tripping.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rollout_percent: 10,
            allowed_routes: RouteKind::ALL.to_vec(),
            max_failure_rate: 0.5,
            min_samples: 8,
            window_size: 50,
            cooldown: Duration::from_secs(600),
        }
    }
}

/// The gate's verdict for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// Whether the graph pipeline may run.
    pub allowed: bool,
    /// Why, as a stable reason string.
    pub reason: String,
}

impl AdmissionDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

/// Read-only view of the canary's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanarySnapshot {
    /// Outcomes currently in the window.
    pub total_samples: usize,
    /// Failures currently in the window.
    pub total_failures: usize,
    /// Observed failure rate.
    pub failure_rate: f64,
    /// Whether the gate is currently in cooldown.
    pub tripped: bool,
    /// Counts of failure reason codes across the window.
    pub recent_failure_reasons: HashMap<String, usize>,
    /// The most recently recorded outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<CanaryOutcome>,
}

/// Gates the experimental graph pipeline and records its outcomes.
pub struct CanaryController {
    config: CanaryConfig,
    store: Arc<dyn CanaryStore>,
}

impl CanaryController {
    /// Create a controller over a state store.
    #[must_use]
    pub fn new(config: CanaryConfig, store: Arc<dyn CanaryStore>) -> Self {
        Self { config, store }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CanaryConfig {
        &self.config
    }

    /// Decide whether the graph pipeline runs this turn.
    ///
    /// First match wins: disabled gate, route allow-list, cooldown, rollout
    /// sample. Sampling is a pure function of the trace id and config, so
    /// re-evaluating the same trace always lands the same way.
    #[must_use]
    pub fn evaluate(&self, route: RouteKind, trace_id: &str) -> AdmissionDecision {
        self.evaluate_at(route, trace_id, Utc::now())
    }

    /// [`Self::evaluate`] against an explicit clock, for tests.
    #[must_use]
    pub fn evaluate_at(
        &self,
        route: RouteKind,
        trace_id: &str,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        if !self.config.enabled {
            return AdmissionDecision::allow(reasons::DISABLED);
        }

        if !self.config.allowed_routes.contains(&route) {
            return AdmissionDecision::deny(reasons::ROUTE_NOT_ALLOWLISTED);
        }

        if let Some(cooldown_until) = self.store.get().cooldown_until {
            if now < cooldown_until {
                debug!(
                    %trace_id,
                    %cooldown_until,
                    "graph pipeline denied during error-budget cooldown"
                );
                return AdmissionDecision::deny(reasons::ERROR_BUDGET_COOLDOWN);
            }
        }

        let bucket = rollout_bucket(trace_id);
        if u16::from(bucket) < u16::from(self.config.rollout_percent.min(100)) {
            AdmissionDecision::allow(reasons::IN_ROLLOUT_SAMPLE)
        } else {
            AdmissionDecision::deny(reasons::OUT_OF_ROLLOUT_SAMPLE)
        }
    }

    /// Record a pipeline attempt's outcome; trips the cooldown when the
    /// window holds enough samples and the failure rate reaches the budget.
    pub fn record_outcome(&self, success: bool, reason_codes: Vec<String>) {
        self.record_outcome_at(success, reason_codes, Utc::now());
    }

    /// [`Self::record_outcome`] against an explicit clock, for tests.
    pub fn record_outcome_at(
        &self,
        success: bool,
        reason_codes: Vec<String>,
        now: DateTime<Utc>,
    ) {
        let outcome = if success {
            CanaryOutcome::success()
        } else {
            CanaryOutcome::failure(reason_codes)
        };

        let state = self.store.append(outcome, self.config.window_size);

        if state.window.len() >= self.config.min_samples.max(1)
            && state.failure_rate() >= self.config.max_failure_rate
        {
            let until = now
                + ChronoDuration::from_std(self.config.cooldown)
                    .unwrap_or_else(|_| ChronoDuration::seconds(600));
            warn!(
                failure_rate = state.failure_rate(),
                samples = state.window.len(),
                cooldown_until = %until,
                "canary error budget exhausted, graph pipeline disabled"
            );
            self.store.set_cooldown(until);
        }
    }

    /// Read-only snapshot of the gate's state.
    #[must_use]
    pub fn snapshot(&self) -> CanarySnapshot {
        self.snapshot_at(Utc::now())
    }

    /// [`Self::snapshot`] against an explicit clock, for tests.
    #[must_use]
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> CanarySnapshot {
        let state = self.store.get();
        let mut recent_failure_reasons: HashMap<String, usize> = HashMap::new();
        for outcome in state.window.iter().filter(|o| !o.success) {
            for code in &outcome.reason_codes {
                *recent_failure_reasons.entry(code.clone()).or_default() += 1;
            }
        }

        CanarySnapshot {
            total_samples: state.window.len(),
            total_failures: state.failures(),
            failure_rate: state.failure_rate(),
            tripped: state.cooldown_until.is_some_and(|until| now < until),
            recent_failure_reasons,
            last_outcome: state.window.back().cloned(),
        }
    }
}

/// Deterministic rollout bucket in [0, 100) for a trace id.
fn rollout_bucket(trace_id: &str) -> u8 {
    let digest = Sha256::digest(trace_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}
