//! Model capability descriptors and the catalog/health collaborator traits.

use crate::route::{RouteKind, RoutePlan, SearchMode};
use crate::turn::TurnRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Feature requirements a turn places on the generation model.
///
/// Each flag is a strict requirement: a model that cannot satisfy a set flag
/// is not eligible for selection (modulo the unknown-alias escape hatch in
/// the resolver).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequirements {
    /// The model must accept image input.
    pub vision: bool,
    /// The model must accept audio input.
    pub audio_in: bool,
    /// The model must produce audio output.
    pub audio_out: bool,
    /// The model must support tool/function calling.
    pub tools: bool,
    /// The model must support grounded web search.
    pub search: bool,
    /// The model must support extended reasoning.
    pub reasoning: bool,
    /// The model must support code execution.
    pub code_exec: bool,
}

impl FeatureRequirements {
    /// Whether any strict requirement is set.
    #[must_use]
    pub fn any_strict(&self) -> bool {
        self.vision
            || self.audio_in
            || self.audio_out
            || self.tools
            || self.search
            || self.reasoning
            || self.code_exec
    }

    /// Infer requirements from a turn and its route plan.
    #[must_use]
    pub fn infer(turn: &TurnRequest, plan: &RoutePlan) -> Self {
        Self {
            vision: !turn.image_urls.is_empty(),
            audio_in: turn.has_audio,
            audio_out: plan.voice_narration,
            tools: false,
            search: plan.kind == RouteKind::Search,
            reasoning: plan.kind == RouteKind::Coding,
            code_exec: false,
        }
    }

    /// Require tool calling in addition to the inferred set.
    #[must_use]
    pub fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    /// Whether this is a search-and-scrape turn, which prefers a link-aware
    /// model.
    #[must_use]
    pub fn wants_link_aware(plan: &RoutePlan) -> bool {
        plan.kind == RouteKind::Search && plan.search_mode == Some(SearchMode::Scrape)
    }
}

/// Capability metadata for one catalog model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Accepts image input.
    pub vision: bool,
    /// Accepts audio input.
    pub audio_input: bool,
    /// Produces audio output.
    pub audio_output: bool,
    /// Supports tool/function calling.
    pub tools: bool,
    /// Supports grounded web search.
    pub search: bool,
    /// Supports extended reasoning.
    pub reasoning: bool,
    /// Supports code execution.
    pub code_execution: bool,
    /// Context window, when known.
    pub max_context_tokens: Option<u32>,
}

impl ModelCapabilities {
    /// Whether this model satisfies every set requirement.
    #[must_use]
    pub fn satisfies(&self, requirements: &FeatureRequirements) -> bool {
        (!requirements.vision || self.vision)
            && (!requirements.audio_in || self.audio_input)
            && (!requirements.audio_out || self.audio_output)
            && (!requirements.tools || self.tools)
            && (!requirements.search || self.search)
            && (!requirements.reasoning || self.reasoning)
            && (!requirements.code_exec || self.code_execution)
    }
}

/// Catalog lookup collaborator.
///
/// A miss is not an error: the resolver treats unknown ids as plausible
/// aliases unless strict requirements are in play.
pub trait ModelCatalog: Send + Sync {
    /// Look up capability metadata for a model id.
    fn find_model(&self, id: &str) -> Option<ModelCapabilities>;
}

/// Live model-health collaborator.
///
/// Scores are in [0, 1]; models missing from the returned map are treated as
/// neutral by the resolver.
#[async_trait::async_trait]
pub trait HealthService: Send + Sync {
    /// Fetch health scores for the given model ids.
    async fn health_scores(&self, ids: &[String]) -> HashMap<String, f64>;
}
