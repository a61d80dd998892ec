//! Static catalog and health implementations.
//!
//! Production deployments wire the catalog and health traits to live
//! services; these static implementations back tests, demos, and cold-start
//! defaults.

use async_trait::async_trait;
use orchestrator_core::{HealthService, ModelCapabilities, ModelCatalog};
use std::collections::HashMap;

/// In-memory model catalog with normalized id lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticModelCatalog {
    models: HashMap<String, ModelCapabilities>,
}

impl StaticModelCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog entries for the stock preference chains.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_model(
                "gpt-4o",
                ModelCapabilities {
                    vision: true,
                    tools: true,
                    reasoning: true,
                    max_context_tokens: Some(128_000),
                    ..Default::default()
                },
            )
            .with_model(
                "gpt-4o-mini",
                ModelCapabilities {
                    vision: true,
                    tools: true,
                    max_context_tokens: Some(128_000),
                    ..Default::default()
                },
            )
            .with_model(
                "gpt-4o-audio",
                ModelCapabilities {
                    audio_input: true,
                    audio_output: true,
                    tools: true,
                    max_context_tokens: Some(128_000),
                    ..Default::default()
                },
            )
            .with_model(
                "claude-3-opus",
                ModelCapabilities {
                    vision: true,
                    tools: true,
                    reasoning: true,
                    max_context_tokens: Some(200_000),
                    ..Default::default()
                },
            )
            .with_model(
                "claude-3-sonnet",
                ModelCapabilities {
                    vision: true,
                    tools: true,
                    reasoning: true,
                    max_context_tokens: Some(200_000),
                    ..Default::default()
                },
            )
            .with_model(
                "sonar-pro",
                ModelCapabilities {
                    search: true,
                    max_context_tokens: Some(127_000),
                    ..Default::default()
                },
            )
    }

    /// Add or replace a model entry.
    #[must_use]
    pub fn with_model(mut self, id: impl Into<String>, caps: ModelCapabilities) -> Self {
        self.models.insert(normalize(&id.into()), caps);
        self
    }

    /// Number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelCatalog for StaticModelCatalog {
    fn find_model(&self, id: &str) -> Option<ModelCapabilities> {
        self.models.get(&normalize(id)).copied()
    }
}

/// In-memory health service returning fixed scores.
#[derive(Debug, Clone, Default)]
pub struct StaticHealthService {
    scores: HashMap<String, f64>,
}

impl StaticHealthService {
    /// Create a health service with no scores; every model reads as
    /// unreported.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a model's score.
    #[must_use]
    pub fn with_score(mut self, id: impl Into<String>, score: f64) -> Self {
        self.scores.insert(id.into(), score);
        self
    }
}

#[async_trait]
impl HealthService for StaticHealthService {
    async fn health_scores(&self, ids: &[String]) -> HashMap<String, f64> {
        ids.iter()
            .filter_map(|id| self.scores.get(id).map(|score| (id.clone(), *score)))
            .collect()
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
