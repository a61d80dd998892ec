//! Draft evaluation.
//!
//! The evaluator scores a drafted reply against a route-specific rubric and
//! returns a structured assessment. The default implementation prompts the
//! generation client for strict JSON; anything that does not parse is an
//! evaluator failure, which the loop treats as a signal to stop, not to
//! block.

use async_trait::async_trait;
use orchestrator_core::{
    ChatMessage, ChatRequest, GenerationClient, OrchestratorError, ProviderKind, RouteKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maximum providers a single redispatch may target.
const MAX_REDISPATCH_PROVIDERS: usize = 2;

/// The critic's verdict on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticVerdict {
    /// The draft is good enough to send.
    Pass,
    /// The draft needs another pass.
    Revise,
}

/// A structured quality assessment of one draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticAssessment {
    /// Overall quality score in [0, 1].
    pub score: f64,
    /// Pass or revise.
    pub verdict: CriticVerdict,
    /// Specific problems found, freeform text.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Instruction for the rewrite, when the critic suggests one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_prompt: Option<String>,
    /// Model that produced the assessment.
    #[serde(default)]
    pub model: String,
}

/// What the evaluator sees.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Route the turn was classified as; selects the rubric.
    pub route: RouteKind,
    /// The user's message.
    pub user_text: String,
    /// The drafted reply under evaluation.
    pub draft: String,
    /// Digest of the context artifacts the draft was grounded on.
    pub context_digest: String,
}

/// Evaluates drafts; injectable so tests can script verdicts.
#[async_trait]
pub trait DraftEvaluator: Send + Sync {
    /// Assess one draft.
    ///
    /// # Errors
    /// Returns an evaluator error; the critic loop aborts and keeps the last
    /// draft (fail-open).
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<CriticAssessment, OrchestratorError>;
}

/// The route-specific evaluation rubric.
fn rubric(route: RouteKind) -> &'static str {
    match route {
        RouteKind::Chat => {
            "Judge the reply's tone and conversational flow: does it sound \
             natural, match the user's register, and keep the thread moving?"
        }
        RouteKind::Coding => {
            "Judge the reply's correctness and completeness: does the code \
             compile conceptually, handle the stated cases, and answer every \
             part of the question?"
        }
        RouteKind::Search => {
            "Judge the reply's freshness and grounding: are claims supported \
             by the retrieved context, current, and attributed where it \
             matters?"
        }
        RouteKind::Creative => {
            "Judge the reply's voice and cohesion: does it sustain a \
             consistent style and deliver what the prompt asked for?"
        }
    }
}

/// Default evaluator that prompts the generation client for strict JSON.
pub struct ModelEvaluator {
    generation: Arc<dyn GenerationClient>,
    model: String,
    timeout: Duration,
}

impl ModelEvaluator {
    /// Create an evaluator over the generation client.
    #[must_use]
    pub fn new(generation: Arc<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self {
            generation,
            model: model.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the evaluation call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Wire shape the evaluator model must return.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    score: f64,
    verdict: CriticVerdict,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    rewrite_prompt: Option<String>,
}

#[async_trait]
impl DraftEvaluator for ModelEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<CriticAssessment, OrchestratorError> {
        let system = format!(
            "You are a strict quality critic for an assistant's replies. {}\n\
             Respond with JSON only: {{\"score\": <0..1>, \"verdict\": \
             \"pass\"|\"revise\", \"issues\": [<strings>], \
             \"rewrite_prompt\": <string or null>}}",
            rubric(request.route)
        );
        let user = format!(
            "User message:\n{}\n\nRetrieved context digest:\n{}\n\nDraft reply:\n{}",
            request.user_text, request.context_digest, request.draft
        );

        let chat = ChatRequest::new(
            &self.model,
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            0.0,
        )
        .with_timeout(self.timeout);

        let completion = self.generation.chat(&chat).await.map_err(|e| {
            OrchestratorError::evaluator(format!("evaluation call failed: {e}"))
        })?;

        let raw = parse_assessment(&completion.content)?;
        debug!(
            score = raw.score,
            verdict = ?raw.verdict,
            issues = raw.issues.len(),
            "draft evaluated"
        );

        Ok(CriticAssessment {
            score: raw.score.clamp(0.0, 1.0),
            verdict: raw.verdict,
            issues: raw.issues,
            rewrite_prompt: raw.rewrite_prompt,
            model: self.model.clone(),
        })
    }
}

/// Extract the JSON object from the model output, tolerating prose or code
/// fences around it.
fn parse_assessment(content: &str) -> Result<RawAssessment, OrchestratorError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => {
            return Err(OrchestratorError::evaluator(
                "assessment response contained no JSON object",
            ))
        }
    };
    serde_json::from_str(json)
        .map_err(|e| OrchestratorError::evaluator(format!("malformed assessment: {e}")))
}

/// Map the critic's issue text onto the providers worth re-running.
///
/// Keyword heuristic over freeform issue strings: factuality signals target
/// the knowledge provider, freshness signals target web search, tone signals
/// target the relationship/social provider, lost-context signals target
/// memory. Capped to a small set, first signal wins order.
#[must_use]
pub fn redispatch_targets(issues: &[String]) -> Vec<ProviderKind> {
    const SIGNALS: &[(&[&str], ProviderKind)] = &[
        (
            &[
                "fact", "incorrect", "inaccurate", "wrong", "unsupported", "unverified",
                "citation", "source",
            ],
            ProviderKind::Knowledge,
        ),
        (
            &["outdated", "stale", "current", "recent", "fresh"],
            ProviderKind::WebSearch,
        ),
        (
            &[
                "tone", "cold", "impersonal", "harsh", "robotic", "relationship", "familiar",
            ],
            ProviderKind::SocialGraph,
        ),
        (
            &["context", "memory", "forgot", "earlier", "previous", "history"],
            ProviderKind::Memory,
        ),
    ];

    let mut targets = Vec::new();
    for issue in issues {
        let lowered = issue.to_lowercase();
        for (keywords, provider) in SIGNALS {
            if keywords.iter().any(|k| lowered.contains(k)) && !targets.contains(provider) {
                targets.push(*provider);
            }
        }
    }
    targets.truncate(MAX_REDISPATCH_PROVIDERS);
    targets
}
