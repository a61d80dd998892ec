//! Route classification types.
//!
//! A route is the coarse task category chosen for a turn by the external
//! route classifier. The orchestrator consumes the classifier's output as a
//! [`RoutePlan`]; it never classifies turns itself.

use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};

/// The coarse task category for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Conversational small talk and general chat.
    Chat,
    /// Programming questions and code generation.
    Coding,
    /// Questions that need live information from the web.
    Search,
    /// Long-form creative writing.
    Creative,
}

impl RouteKind {
    /// All route kinds, in canonical order.
    pub const ALL: [Self; 4] = [Self::Chat, Self::Coding, Self::Search, Self::Creative];

    /// Stable string form used in telemetry and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Coding => "coding",
            Self::Search => "search",
            Self::Creative => "creative",
        }
    }

    /// Default provider set dispatched for this route when the classifier
    /// does not name providers explicitly.
    #[must_use]
    pub fn default_providers(self) -> &'static [ProviderKind] {
        match self {
            Self::Chat => &[ProviderKind::Memory, ProviderKind::SocialGraph],
            Self::Coding => &[ProviderKind::Memory, ProviderKind::Knowledge],
            Self::Search => &[ProviderKind::WebSearch, ProviderKind::Memory],
            Self::Creative => &[
                ProviderKind::Memory,
                ProviderKind::SocialGraph,
                ProviderKind::VoiceAnalytics,
            ],
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a search-routed turn should gather its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Search-result snippets only.
    Quick,
    /// Search plus full-page scraping of the top results.
    Scrape,
}

/// The route classifier's output for one turn.
///
/// Produced by an external collaborator; consumed verbatim by the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    /// The classified route kind.
    pub kind: RouteKind,

    /// Search strategy, when the route is search-like.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,

    /// Sampling temperature the classifier recommends for synthesis.
    pub temperature: f32,

    /// Explicit provider set; empty means use the route default.
    #[serde(default)]
    pub providers: Vec<ProviderKind>,

    /// Whether the reply will be narrated as voice audio.
    #[serde(default)]
    pub voice_narration: bool,
}

impl RoutePlan {
    /// Create a plan for a route with its default providers and temperature.
    #[must_use]
    pub fn for_route(kind: RouteKind) -> Self {
        Self {
            kind,
            search_mode: None,
            temperature: 0.7,
            providers: Vec::new(),
            voice_narration: false,
        }
    }

    /// Set an explicit provider set.
    #[must_use]
    pub fn with_providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = providers;
        self
    }

    /// Set the synthesis temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the search mode.
    #[must_use]
    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = Some(mode);
        self
    }

    /// Mark the reply as voice-narrated.
    #[must_use]
    pub fn with_voice_narration(mut self, narrated: bool) -> Self {
        self.voice_narration = narrated;
        self
    }

    /// The effective provider set: explicit if given, route default otherwise.
    #[must_use]
    pub fn effective_providers(&self) -> Vec<ProviderKind> {
        if self.providers.is_empty() {
            self.kind.default_providers().to_vec()
        } else {
            self.providers.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_display() {
        assert_eq!(RouteKind::Chat.to_string(), "chat");
        assert_eq!(RouteKind::Coding.to_string(), "coding");
    }

    #[test]
    fn test_default_providers_nonempty() {
        for kind in RouteKind::ALL {
            assert!(!kind.default_providers().is_empty());
        }
    }

    #[test]
    fn test_effective_providers_prefers_explicit() {
        let plan = RoutePlan::for_route(RouteKind::Chat)
            .with_providers(vec![ProviderKind::Knowledge]);
        assert_eq!(plan.effective_providers(), vec![ProviderKind::Knowledge]);

        let plan = RoutePlan::for_route(RouteKind::Chat);
        assert_eq!(
            plan.effective_providers(),
            RouteKind::Chat.default_providers().to_vec()
        );
    }
}
