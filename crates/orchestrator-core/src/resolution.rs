//! Model-resolution audit records.
//!
//! Resolution never fails; it always lands on a model id and leaves behind an
//! ordered accept/reject trail explaining how it got there.

use crate::capability::FeatureRequirements;
use crate::route::RouteKind;
use serde::{Deserialize, Serialize};

/// One accept/reject entry in the resolution trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionDecision {
    /// The model the entry is about.
    pub model: String,
    /// Whether the model was accepted at this step.
    pub accepted: bool,
    /// Why, e.g. `selected`, `capability_mismatch`, `not_allowlisted`.
    pub reason: String,
    /// The model's health score at decision time, when it was consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
}

impl ResolutionDecision {
    /// Create a decision entry.
    #[must_use]
    pub fn new(model: impl Into<String>, accepted: bool, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            accepted,
            reason: reason.into(),
            health_score: None,
        }
    }

    /// Attach the health score consulted for this entry.
    #[must_use]
    pub fn with_health(mut self, score: f64) -> Self {
        self.health_score = Some(score);
        self
    }
}

/// The full outcome of a model resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResolutionDetails {
    /// The chosen model id.
    pub model: String,
    /// Route the resolution ran for.
    pub route: RouteKind,
    /// Requirements the turn placed on the model.
    pub requirements: FeatureRequirements,
    /// Whether an allow-list constrained the candidate chain.
    pub allowlist_applied: bool,
    /// Ranked candidate chain the capability walk ran over.
    pub candidates: Vec<String>,
    /// Ordered audit trail; the last accepted entry is the chosen model.
    pub decisions: Vec<ResolutionDecision>,
}

impl ModelResolutionDetails {
    /// The last accepted decision, which names the chosen model.
    #[must_use]
    pub fn winning_decision(&self) -> Option<&ResolutionDecision> {
        self.decisions.iter().rev().find(|d| d.accepted)
    }
}
