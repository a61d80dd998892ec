//! Canary state and its injectable store.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// One recorded pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryOutcome {
    /// Whether the pipeline attempt succeeded.
    pub success: bool,
    /// Failure reason codes, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reason_codes: Vec<String>,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
}

impl CanaryOutcome {
    /// Create a success outcome.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            reason_codes: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a failure outcome with reason codes.
    #[must_use]
    pub fn failure(reason_codes: Vec<String>) -> Self {
        Self {
            success: false,
            reason_codes,
            timestamp: Utc::now(),
        }
    }
}

/// The rolling window plus cooldown timestamp.
///
/// This is the durable shape: it serializes for best-effort snapshotting,
/// and a snapshot that no longer parses is treated as absent state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanaryState {
    /// Recorded outcomes, oldest first, bounded by the window size.
    pub window: VecDeque<CanaryOutcome>,
    /// When the gate reopens after an error-budget trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl CanaryState {
    /// Deserialize a durable snapshot, falling back to defaults when the
    /// payload does not match the current schema.
    #[must_use]
    pub fn from_snapshot(payload: &str) -> Self {
        match serde_json::from_str(payload) {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "canary snapshot schema mismatch, starting from defaults");
                Self::default()
            }
        }
    }

    /// Serialize for durable snapshotting, best-effort.
    #[must_use]
    pub fn to_snapshot(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(payload) => Some(payload),
            Err(error) => {
                warn!(%error, "canary snapshot serialization failed");
                None
            }
        }
    }

    /// Failure count across the window.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.window.iter().filter(|o| !o.success).count()
    }

    /// Observed failure rate across the window; 0 for an empty window.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.window.len() as f64
        }
    }
}

/// Injectable state interface for the canary controller.
///
/// Concurrent turns may race on this state; bounded staleness of the
/// computed failure rate is an accepted tradeoff for its role as coarse
/// self-protection.
pub trait CanaryStore: Send + Sync {
    /// Current state, cloned.
    fn get(&self) -> CanaryState;

    /// Append an outcome, evicting the oldest entry past `capacity`, and
    /// return the state after the append.
    fn append(&self, outcome: CanaryOutcome, capacity: usize) -> CanaryState;

    /// Set the cooldown deadline.
    fn set_cooldown(&self, until: DateTime<Utc>);

    /// Clear all state.
    fn reset(&self);
}

/// Process-local canary store.
#[derive(Debug, Default)]
pub struct InMemoryCanaryStore {
    state: Mutex<CanaryState>,
}

impl InMemoryCanaryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded from a durable snapshot.
    #[must_use]
    pub fn from_snapshot(payload: &str) -> Self {
        Self {
            state: Mutex::new(CanaryState::from_snapshot(payload)),
        }
    }
}

impl CanaryStore for InMemoryCanaryStore {
    fn get(&self) -> CanaryState {
        self.state.lock().clone()
    }

    fn append(&self, outcome: CanaryOutcome, capacity: usize) -> CanaryState {
        let mut state = self.state.lock();
        state.window.push_back(outcome);
        while state.window.len() > capacity.max(1) {
            state.window.pop_front();
        }
        state.clone()
    }

    fn set_cooldown(&self, until: DateTime<Utc>) {
        self.state.lock().cooldown_until = Some(until);
    }

    fn reset(&self) {
        *self.state.lock() = CanaryState::default();
    }
}
