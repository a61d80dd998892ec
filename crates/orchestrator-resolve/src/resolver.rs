//! The model resolution algorithm.

use orchestrator_core::{
    FeatureRequirements, HealthService, ModelCatalog, ModelResolutionDetails, ResolutionDecision,
    RouteKind,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Final catch-all appended to every chain.
pub const GLOBAL_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Prepended for prompts past the long-prompt threshold.
const LONG_FORM_MODEL: &str = "claude-3-opus";

/// Prepended when the turn requires audio in or out.
const AUDIO_MODEL: &str = "gpt-4o-audio";

/// Prepended for search-and-scrape turns.
const LINK_AWARE_MODEL: &str = "sonar-pro";

/// Prompt length, in characters, past which the long-form model is preferred.
const LONG_PROMPT_THRESHOLD_CHARS: usize = 6_000;

/// Weight of live health in the candidate score.
const HEALTH_WEIGHT: f64 = 0.85;

/// Weight of chain position in the candidate score.
const PRIORITY_WEIGHT: f64 = 0.15;

/// Health assumed for models the health service does not report.
const NEUTRAL_HEALTH: f64 = 0.5;

/// The route's ordered default preference chain.
fn route_chain(route: RouteKind) -> &'static [&'static str] {
    match route {
        RouteKind::Chat => &["gpt-4o", "gpt-4o-mini"],
        RouteKind::Coding => &["claude-3-opus", "gpt-4o"],
        RouteKind::Search => &["sonar-pro", "gpt-4o"],
        RouteKind::Creative => &["claude-3-opus", "claude-3-sonnet"],
    }
}

/// Everything a resolution depends on besides the catalog and health
/// collaborators.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// Route the turn was classified as.
    pub route: RouteKind,
    /// Feature requirements the turn places on the model.
    pub requirements: FeatureRequirements,
    /// Length of the assembled prompt, in characters.
    pub prompt_chars: usize,
    /// Whether the turn is search-and-scrape and prefers a link-aware model.
    pub link_aware: bool,
    /// Optional policy allow-list constraining the chain.
    pub allow_list: Option<Vec<String>>,
}

impl ResolutionRequest {
    /// Create a request with no situational adjustments.
    #[must_use]
    pub fn new(route: RouteKind, requirements: FeatureRequirements) -> Self {
        Self {
            route,
            requirements,
            prompt_chars: 0,
            link_aware: false,
            allow_list: None,
        }
    }

    /// Set the assembled prompt length.
    #[must_use]
    pub fn with_prompt_chars(mut self, chars: usize) -> Self {
        self.prompt_chars = chars;
        self
    }

    /// Prefer a link-aware model.
    #[must_use]
    pub fn with_link_aware(mut self, link_aware: bool) -> Self {
        self.link_aware = link_aware;
        self
    }

    /// Constrain candidates to an allow-list.
    #[must_use]
    pub fn with_allow_list(mut self, allow_list: Vec<String>) -> Self {
        self.allow_list = Some(allow_list);
        self
    }
}

/// Resolves one model id per turn against the catalog and health
/// collaborators.
pub struct ModelResolver {
    catalog: Arc<dyn ModelCatalog>,
    health: Arc<dyn HealthService>,
}

impl ModelResolver {
    /// Create a resolver over the catalog and health collaborators.
    #[must_use]
    pub fn new(catalog: Arc<dyn ModelCatalog>, health: Arc<dyn HealthService>) -> Self {
        Self { catalog, health }
    }

    /// Resolve one model id.
    ///
    /// This function never fails; when nothing survives the capability walk
    /// the fallback ladder lands on the most route-preferred surviving
    /// candidate, the first remaining candidate, or the global default.
    #[instrument(skip(self, request), fields(route = %request.route))]
    pub async fn resolve(&self, request: &ResolutionRequest) -> ModelResolutionDetails {
        let mut decisions: Vec<ResolutionDecision> = Vec::new();

        // Step 1: base chain with situational reordering, global catch-all,
        // and normalized dedup.
        let base_chain = self.build_chain(request);

        // Step 2: allow-list filter.
        let (chain, allowlist_applied) =
            apply_allow_list(&base_chain, request.allow_list.as_deref(), &mut decisions);

        // Step 3: weighted re-rank over live health.
        let scores = self.health.health_scores(&chain).await;
        let total = chain.len();
        let mut ranked: Vec<Candidate> = chain
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let health = scores
                    .get(id)
                    .copied()
                    .unwrap_or(NEUTRAL_HEALTH)
                    .clamp(0.0, 1.0);
                let priority = if total <= 1 {
                    1.0
                } else {
                    1.0 - index as f64 / (total - 1) as f64
                };
                let score = HEALTH_WEIGHT * health + PRIORITY_WEIGHT * priority;
                debug!(model = %id, health, score, "candidate scored");
                Candidate {
                    id: id.clone(),
                    health,
                    score,
                }
            })
            .collect();
        // Stable sort: ties keep chain order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let candidates: Vec<String> = ranked.iter().map(|c| c.id.clone()).collect();

        // Step 4: capability walk down the ranked chain.
        let mut selected: Option<String> = None;
        for candidate in &ranked {
            match self.catalog.find_model(&candidate.id) {
                Some(caps) => {
                    if caps.satisfies(&request.requirements) {
                        decisions.push(
                            ResolutionDecision::new(&candidate.id, true, "selected")
                                .with_health(candidate.health),
                        );
                        selected = Some(candidate.id.clone());
                        break;
                    }
                    decisions.push(
                        ResolutionDecision::new(&candidate.id, false, "capability_mismatch")
                            .with_health(candidate.health),
                    );
                }
                None if request.requirements.any_strict() => {
                    // An unknown entry cannot prove it satisfies a strict
                    // requirement.
                    decisions.push(
                        ResolutionDecision::new(&candidate.id, false, "capability_mismatch")
                            .with_health(candidate.health),
                    );
                }
                None => {
                    // No strict requirements: an unknown id is a plausible
                    // alias the catalog has not caught up with.
                    decisions.push(
                        ResolutionDecision::new(&candidate.id, true, "alias_accepted")
                            .with_health(candidate.health),
                    );
                    selected = Some(candidate.id.clone());
                    break;
                }
            }
        }

        // Step 5: fallback ladder. Always lands somewhere.
        let model = selected.unwrap_or_else(|| {
            fallback_candidate(&base_chain, &chain, &mut decisions)
        });

        ModelResolutionDetails {
            model,
            route: request.route,
            requirements: request.requirements,
            allowlist_applied,
            candidates,
            decisions,
        }
    }

    /// Step 1: the route default with situational prepends, the global
    /// default appended, deduplicated case/whitespace-insensitively
    /// preserving first occurrence.
    fn build_chain(&self, request: &ResolutionRequest) -> Vec<String> {
        let mut chain: Vec<String> = route_chain(request.route)
            .iter()
            .map(ToString::to_string)
            .collect();

        if request.prompt_chars > LONG_PROMPT_THRESHOLD_CHARS {
            chain.insert(0, LONG_FORM_MODEL.to_string());
        }
        if request.requirements.audio_in || request.requirements.audio_out {
            chain.insert(0, AUDIO_MODEL.to_string());
        }
        if request.link_aware {
            chain.insert(0, LINK_AWARE_MODEL.to_string());
        }

        chain.push(GLOBAL_DEFAULT_MODEL.to_string());
        dedup_normalized(chain)
    }
}

/// One scored candidate in the ranked chain.
struct Candidate {
    id: String,
    health: f64,
    score: f64,
}

/// Case/whitespace-insensitive normal form for model id comparison.
fn normalize(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

fn dedup_normalized(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(normalize(id)))
        .collect()
}

/// Step 2: filter to allow-listed entries, appending allow-listed ids the
/// chain was missing. Filtering everything away degenerates to the
/// allow-list itself.
fn apply_allow_list(
    chain: &[String],
    allow_list: Option<&[String]>,
    decisions: &mut Vec<ResolutionDecision>,
) -> (Vec<String>, bool) {
    let Some(allow) = allow_list.filter(|a| !a.is_empty()) else {
        return (chain.to_vec(), false);
    };

    let allowed: HashSet<String> = allow.iter().map(|id| normalize(id)).collect();
    let mut filtered: Vec<String> = Vec::new();
    for id in chain {
        if allowed.contains(&normalize(id)) {
            filtered.push(id.clone());
        } else {
            decisions.push(ResolutionDecision::new(id, false, "not_allowlisted"));
        }
    }

    let present: HashSet<String> = filtered.iter().map(|id| normalize(id)).collect();
    for id in allow {
        if !present.contains(&normalize(id)) {
            filtered.push(id.clone());
        }
    }

    (dedup_normalized(filtered), true)
}

/// Step 5: most route-preferred candidate surviving the filter, else the
/// first remaining candidate, else the global default.
fn fallback_candidate(
    base_chain: &[String],
    chain: &[String],
    decisions: &mut Vec<ResolutionDecision>,
) -> String {
    let surviving: HashSet<String> = chain.iter().map(|id| normalize(id)).collect();

    if let Some(preferred) = base_chain.iter().find(|id| surviving.contains(&normalize(id))) {
        decisions.push(ResolutionDecision::new(
            preferred,
            true,
            "fallback_route_preferred",
        ));
        return preferred.clone();
    }
    if let Some(first) = chain.first() {
        decisions.push(ResolutionDecision::new(
            first,
            true,
            "fallback_first_candidate",
        ));
        return first.clone();
    }
    decisions.push(ResolutionDecision::new(
        GLOBAL_DEFAULT_MODEL,
        true,
        "fallback_global_default",
    ));
    GLOBAL_DEFAULT_MODEL.to_string()
}
