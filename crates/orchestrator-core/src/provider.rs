//! Context providers.
//!
//! A provider is a bounded, isolated context-retrieval unit invoked as a
//! graph task. The set of providers is a closed enum so dispatch stays
//! exhaustiveness-checked at compile time; handlers implement a shared
//! capability trait and register in a [`ProviderRegistry`].

use crate::artifact::BlackboardArtifact;
use crate::error::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The closed set of context-provider identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Long-term conversational memory.
    Memory,
    /// Relationship graph and social signals for the author.
    SocialGraph,
    /// Voice-channel analytics (speaking patterns, recent calls).
    VoiceAnalytics,
    /// Curated knowledge base lookups.
    Knowledge,
    /// Live web search.
    WebSearch,
}

impl ProviderKind {
    /// All provider kinds, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Memory,
        Self::SocialGraph,
        Self::VoiceAnalytics,
        Self::Knowledge,
        Self::WebSearch,
    ];

    /// Stable string form used in node ids, logs, and telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::SocialGraph => "social-graph",
            Self::VoiceAnalytics => "voice-analytics",
            Self::Knowledge => "knowledge",
            Self::WebSearch => "web-search",
        }
    }

    /// What the provider is asked to accomplish, used as the default task
    /// objective in graph nodes.
    #[must_use]
    pub fn default_objective(self) -> &'static str {
        match self {
            Self::Memory => "Recall conversation history and user facts relevant to the message",
            Self::SocialGraph => "Summarize the author's relationship signals and familiarity",
            Self::VoiceAnalytics => "Surface recent voice-channel activity relevant to the message",
            Self::Knowledge => "Look up curated knowledge entries relevant to the message",
            Self::WebSearch => "Search the web for current information relevant to the message",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request handed to a provider for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Trace id of the owning turn.
    pub trace_id: String,

    /// The task's objective, from the graph node.
    pub objective: String,

    /// The text the provider should retrieve context for. In a linear chain
    /// this is the prior node's output; in a fan-out it is the raw user text.
    pub input_text: String,

    /// Author of the turn, for per-user lookups.
    pub user_id: String,

    /// Artifacts produced by upstream tasks, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<BlackboardArtifact>,
}

/// What a provider returns for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Free-text context suitable for prompt assembly.
    pub content: String,

    /// Structured form of the same context, when the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,

    /// Provider's confidence in the retrieved context.
    pub confidence: f64,

    /// Questions the provider could not resolve, surfaced on the blackboard.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_questions: Vec<String>,
}

impl ProviderOutput {
    /// Create an output with plain content and a default mid confidence.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            structured: None,
            confidence: 0.5,
            unresolved_questions: Vec::new(),
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured = Some(structured);
        self
    }

    /// Set the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Add an unresolved question.
    #[must_use]
    pub fn with_unresolved_question(mut self, question: impl Into<String>) -> Self {
        self.unresolved_questions.push(question.into());
        self
    }

    /// Wrap this output into the blackboard artifact for its task.
    #[must_use]
    pub fn into_artifact(self, node_id: &str, provider: ProviderKind) -> BlackboardArtifact {
        let agent = provider.as_str();
        let artifact = BlackboardArtifact::new(
            format!("artifact-{node_id}"),
            agent,
            format!("{agent} context"),
            self.content,
            agent,
        )
        .with_confidence(self.confidence);
        match self.structured {
            Some(structured) => artifact.with_structured(structured),
            None => artifact,
        }
    }
}

/// The capability interface every provider handler implements.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Which provider identity this handler serves.
    fn kind(&self) -> ProviderKind;

    /// Retrieve context for one task.
    ///
    /// # Errors
    /// Returns a provider error; the executor decides whether to retry based
    /// on [`OrchestratorError::is_retryable`].
    async fn retrieve(&self, request: &ProviderRequest)
        -> Result<ProviderOutput, OrchestratorError>;
}

/// Registry mapping provider identities to their handlers.
#[derive(Default)]
pub struct ProviderRegistry {
    handlers: HashMap<ProviderKind, Arc<dyn ContextProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own kind, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ContextProvider>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Look up the handler for a provider identity.
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ContextProvider>> {
        self.handlers.get(&kind).cloned()
    }

    /// Registered provider identities.
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
