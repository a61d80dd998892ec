//! Blackboard artifacts.
//!
//! An artifact is one unit of retrieved context, produced by a provider task
//! and aggregated on the turn's blackboard.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardArtifact {
    /// Unique artifact id; insertion on the blackboard is idempotent by id.
    pub id: String,

    /// Artifact kind, e.g. `memory`, `social`, `search_result`.
    pub kind: String,

    /// Short human-readable label.
    pub label: String,

    /// The artifact body handed to synthesis.
    pub content: String,

    /// Structured form of the content, when the provider produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,

    /// Provider's confidence in the artifact, clamped to [0, 1] on insert.
    pub confidence: f64,

    /// The provider that produced the artifact.
    pub source_agent: String,

    /// Where the content came from (urls, record ids).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<String>,
}

impl BlackboardArtifact {
    /// Create an artifact with a default mid confidence.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        label: impl Into<String>,
        content: impl Into<String>,
        source_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            content: content.into(),
            structured: None,
            confidence: 0.5,
            source_agent: source_agent.into(),
            provenance: Vec::new(),
        }
    }

    /// Set the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured = Some(structured);
        self
    }

    /// Add a provenance entry.
    #[must_use]
    pub fn with_provenance(mut self, source: impl Into<String>) -> Self {
        self.provenance.push(source.into());
        self
    }
}
