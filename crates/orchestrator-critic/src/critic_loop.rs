//! The bounded evaluate-redispatch-revise loop.

use crate::evaluator::{
    redispatch_targets, CriticVerdict, DraftEvaluator, EvaluationRequest,
};
use async_trait::async_trait;
use orchestrator_core::{
    BlackboardArtifact, ChatMessage, ChatRequest, GenerationClient, ProviderKind, RouteKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Critic policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticConfig {
    /// Whether the loop runs at all.
    pub enabled: bool,
    /// Maximum evaluate-revise iterations per turn.
    pub max_loops: u32,
    /// Score at or above which a draft is accepted without a pass verdict.
    pub min_score: f64,
    /// How much the sampling temperature drops per revision.
    pub temperature_backoff: f32,
    /// Floor for the revision temperature.
    pub min_temperature: f32,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_loops: 2,
            min_score: 0.75,
            temperature_backoff: 0.15,
            min_temperature: 0.2,
        }
    }
}

/// Re-runs a targeted provider subset mid-loop.
///
/// Implemented by the pipeline over the graph executor; injected here so the
/// critic stays decoupled from graph execution.
#[async_trait]
pub trait ProviderRedispatcher: Send + Sync {
    /// Re-execute the given providers and return their fresh artifacts.
    async fn redispatch(&self, providers: &[ProviderKind]) -> Vec<BlackboardArtifact>;
}

/// Everything the loop needs about the turn and its draft.
#[derive(Debug, Clone)]
pub struct CriticContext {
    /// Route the turn was classified as.
    pub route: RouteKind,
    /// Trace id of the owning turn.
    pub trace_id: String,
    /// The user's message.
    pub user_text: String,
    /// The synthesized draft entering the loop.
    pub draft: String,
    /// Model used for regeneration.
    pub model: String,
    /// Temperature the draft was generated at.
    pub temperature: f32,
    /// Digest of the context artifacts the draft was grounded on.
    pub context_digest: String,
    /// Whether the reply will be narrated as voice audio.
    pub voice_narration: bool,
    /// Whether the turn produced binary attachments.
    pub binary_output: bool,
}

/// Telemetry record for one loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticIterationRecord {
    /// 1-based iteration index.
    pub iteration: u32,
    /// Score the evaluator returned, absent when the evaluator failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Verdict the evaluator returned, absent when the evaluator failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<CriticVerdict>,
    /// Issues the evaluator reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    /// Providers re-run for this iteration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redispatched: Vec<ProviderKind>,
    /// Whether a revision was generated.
    pub regenerated: bool,
    /// Whether the evaluator call itself failed.
    pub evaluator_failed: bool,
}

/// What the loop produced.
#[derive(Debug, Clone)]
pub struct CriticOutcome {
    /// The draft to send: the last accepted or last revised version.
    pub final_draft: String,
    /// Per-iteration records for telemetry.
    pub iterations: Vec<CriticIterationRecord>,
    /// Whether the loop ran at all (policy and gate conditions).
    pub ran: bool,
}

/// Runs the critic loop for one turn.
pub struct CriticLoop {
    config: CriticConfig,
    evaluator: Arc<dyn DraftEvaluator>,
    generation: Arc<dyn GenerationClient>,
}

impl CriticLoop {
    /// Create a loop over an evaluator and the generation client.
    #[must_use]
    pub fn new(
        config: CriticConfig,
        evaluator: Arc<dyn DraftEvaluator>,
        generation: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            config,
            evaluator,
            generation,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CriticConfig {
        &self.config
    }

    /// Gate conditions: policy-enabled, not a voice-narration turn, and no
    /// binary attachments in the output.
    #[must_use]
    pub fn should_run(&self, context: &CriticContext) -> bool {
        self.config.enabled && !context.voice_narration && !context.binary_output
    }

    /// Run the loop. Never returns an error: an evaluator failure aborts the
    /// loop and the last draft stands.
    #[instrument(skip(self, context, redispatcher), fields(trace_id = %context.trace_id, route = %context.route))]
    pub async fn refine(
        &self,
        context: CriticContext,
        redispatcher: &dyn ProviderRedispatcher,
    ) -> CriticOutcome {
        if !self.should_run(&context) {
            return CriticOutcome {
                final_draft: context.draft,
                iterations: Vec::new(),
                ran: false,
            };
        }

        let mut draft = context.draft.clone();
        let mut temperature = context.temperature;
        let mut iterations = Vec::new();

        for iteration in 1..=self.config.max_loops {
            let request = EvaluationRequest {
                route: context.route,
                user_text: context.user_text.clone(),
                draft: draft.clone(),
                context_digest: context.context_digest.clone(),
            };

            let assessment = match self.evaluator.evaluate(&request).await {
                Ok(assessment) => assessment,
                Err(error) => {
                    // Fail open: the user gets the current draft.
                    warn!(%error, iteration, "evaluator failed, keeping current draft");
                    iterations.push(CriticIterationRecord {
                        iteration,
                        score: None,
                        verdict: None,
                        issues: Vec::new(),
                        redispatched: Vec::new(),
                        regenerated: false,
                        evaluator_failed: true,
                    });
                    break;
                }
            };

            let accepted = assessment.verdict == CriticVerdict::Pass
                || assessment.score >= self.config.min_score;
            if accepted {
                debug!(iteration, score = assessment.score, "draft accepted");
                iterations.push(CriticIterationRecord {
                    iteration,
                    score: Some(assessment.score),
                    verdict: Some(assessment.verdict),
                    issues: assessment.issues,
                    redispatched: Vec::new(),
                    regenerated: false,
                    evaluator_failed: false,
                });
                break;
            }

            let targets = redispatch_targets(&assessment.issues);
            let fresh_artifacts = if targets.is_empty() {
                Vec::new()
            } else {
                debug!(?targets, iteration, "redispatching providers for revision");
                redispatcher.redispatch(&targets).await
            };

            temperature = (temperature - self.config.temperature_backoff)
                .max(self.config.min_temperature);

            let regenerated = match self
                .regenerate(&context, &draft, &assessment.rewrite_prompt, &fresh_artifacts, temperature)
                .await
            {
                Ok(revision) => {
                    draft = revision;
                    true
                }
                Err(error) => {
                    warn!(%error, iteration, "revision generation failed, keeping current draft");
                    false
                }
            };

            iterations.push(CriticIterationRecord {
                iteration,
                score: Some(assessment.score),
                verdict: Some(assessment.verdict),
                issues: assessment.issues,
                redispatched: targets,
                regenerated,
                evaluator_failed: false,
            });

            if !regenerated {
                break;
            }
        }

        CriticOutcome {
            final_draft: draft,
            iterations,
            ran: true,
        }
    }

    /// Fold the critic's instruction, the fresh context, and the prior draft
    /// into one revision prompt and regenerate at the lowered temperature.
    async fn regenerate(
        &self,
        context: &CriticContext,
        prior_draft: &str,
        rewrite_prompt: &Option<String>,
        fresh_artifacts: &[BlackboardArtifact],
        temperature: f32,
    ) -> Result<String, orchestrator_core::OrchestratorError> {
        let mut system = String::from(
            "Revise the assistant's draft reply. Keep what works, fix what the \
             critique names, and do not mention the critique itself.",
        );
        if let Some(instruction) = rewrite_prompt {
            system.push_str("\nCritique: ");
            system.push_str(instruction);
        }
        if !fresh_artifacts.is_empty() {
            system.push_str("\nFresh context:\n");
            for artifact in fresh_artifacts {
                system.push_str(&format!("- [{}] {}\n", artifact.source_agent, artifact.content));
            }
        }

        let user = format!(
            "User message:\n{}\n\nPrior draft:\n{}",
            context.user_text, prior_draft
        );

        let request = ChatRequest::new(
            &context.model,
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
        );
        let completion = self.generation.chat(&request).await?;
        Ok(completion.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CriticAssessment;
    use orchestrator_core::{ChatCompletion, OrchestratorError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedEvaluator {
        script: Mutex<VecDeque<Result<CriticAssessment, OrchestratorError>>>,
        calls: AtomicU32,
    }

    impl ScriptedEvaluator {
        fn new(script: Vec<Result<CriticAssessment, OrchestratorError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DraftEvaluator for ScriptedEvaluator {
        async fn evaluate(
            &self,
            _request: &EvaluationRequest,
        ) -> Result<CriticAssessment, OrchestratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(OrchestratorError::evaluator("script exhausted")))
        }
    }

    #[derive(Default)]
    struct RecordingGeneration {
        requests: Mutex<Vec<ChatRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationClient for RecordingGeneration {
        async fn chat(
            &self,
            request: &ChatRequest,
        ) -> Result<ChatCompletion, OrchestratorError> {
            self.requests.lock().push(request.clone());
            if self.fail {
                return Err(OrchestratorError::generation("upstream down", false));
            }
            Ok(ChatCompletion {
                content: "revised draft".to_string(),
                model: Some(request.model.clone()),
            })
        }
    }

    #[derive(Default)]
    struct RecordingRedispatcher {
        calls: Mutex<Vec<Vec<ProviderKind>>>,
    }

    #[async_trait]
    impl ProviderRedispatcher for RecordingRedispatcher {
        async fn redispatch(&self, providers: &[ProviderKind]) -> Vec<BlackboardArtifact> {
            self.calls.lock().push(providers.to_vec());
            providers
                .iter()
                .map(|p| {
                    BlackboardArtifact::new(
                        format!("fresh-{p}"),
                        p.as_str(),
                        "fresh context",
                        "fresh content",
                        p.as_str(),
                    )
                })
                .collect()
        }
    }

    fn assessment(score: f64, verdict: CriticVerdict, issues: Vec<&str>) -> CriticAssessment {
        CriticAssessment {
            score,
            verdict,
            issues: issues.into_iter().map(ToString::to_string).collect(),
            rewrite_prompt: Some("tighten the second paragraph".to_string()),
            model: "critic-model".to_string(),
        }
    }

    fn context() -> CriticContext {
        CriticContext {
            route: RouteKind::Chat,
            trace_id: "trace-1".to_string(),
            user_text: "hello".to_string(),
            draft: "initial draft".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            context_digest: "digest".to_string(),
            voice_narration: false,
            binary_output: false,
        }
    }

    #[tokio::test]
    async fn test_pass_on_first_iteration_skips_regeneration() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Ok(assessment(
            0.9,
            CriticVerdict::Pass,
            vec![],
        ))]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig::default(),
            Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>,
            Arc::clone(&generation) as Arc<dyn GenerationClient>,
        );

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;

        assert!(outcome.ran);
        assert_eq!(outcome.final_draft, "initial draft");
        assert_eq!(evaluator.calls(), 1);
        assert!(generation.requests.lock().is_empty());
        assert_eq!(outcome.iterations.len(), 1);
        assert!(!outcome.iterations[0].regenerated);
    }

    #[tokio::test]
    async fn test_high_score_accepts_without_pass_verdict() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Ok(assessment(
            0.8,
            CriticVerdict::Revise,
            vec!["minor nit"],
        ))]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig {
                min_score: 0.75,
                ..Default::default()
            },
            evaluator,
            generation.clone() as Arc<dyn GenerationClient>,
        );

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;
        assert_eq!(outcome.final_draft, "initial draft");
        assert!(generation.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_revise_redispatches_and_regenerates() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![
            Ok(assessment(
                0.4,
                CriticVerdict::Revise,
                vec!["claims look incorrect"],
            )),
            Ok(assessment(0.9, CriticVerdict::Pass, vec![])),
        ]));
        let generation = Arc::new(RecordingGeneration::default());
        let redispatcher = RecordingRedispatcher::default();
        let critic = CriticLoop::new(
            CriticConfig::default(),
            Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>,
            Arc::clone(&generation) as Arc<dyn GenerationClient>,
        );

        let outcome = critic.refine(context(), &redispatcher).await;

        assert_eq!(outcome.final_draft, "revised draft");
        assert_eq!(evaluator.calls(), 2);
        assert_eq!(
            redispatcher.calls.lock().as_slice(),
            &[vec![ProviderKind::Knowledge]]
        );
        let requests = generation.requests.lock();
        assert_eq!(requests.len(), 1);
        // Revision runs at a lowered temperature.
        assert!(requests[0].temperature < 0.7);
        // Fresh context and the critique are folded into the prompt.
        let system = &requests[0].messages[0].content;
        assert!(system.contains("tighten the second paragraph"));
        assert!(system.contains("fresh content"));
    }

    #[tokio::test]
    async fn test_loop_bounded_by_max_loops() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![
            Ok(assessment(0.3, CriticVerdict::Revise, vec!["wrong"])),
            Ok(assessment(0.3, CriticVerdict::Revise, vec!["still wrong"])),
            Ok(assessment(0.3, CriticVerdict::Revise, vec!["forever wrong"])),
        ]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig {
                max_loops: 2,
                ..Default::default()
            },
            Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>,
            Arc::clone(&generation) as Arc<dyn GenerationClient>,
        );

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;

        assert_eq!(evaluator.calls(), 2);
        assert_eq!(generation.requests.lock().len(), 2);
        assert_eq!(outcome.iterations.len(), 2);
    }

    #[tokio::test]
    async fn test_evaluator_failure_fails_open() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Err(
            OrchestratorError::evaluator("upstream 500"),
        )]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig::default(),
            evaluator,
            Arc::clone(&generation) as Arc<dyn GenerationClient>,
        );

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;

        assert_eq!(outcome.final_draft, "initial draft");
        assert!(generation.requests.lock().is_empty());
        assert_eq!(outcome.iterations.len(), 1);
        assert!(outcome.iterations[0].evaluator_failed);
    }

    #[tokio::test]
    async fn test_revision_generation_failure_keeps_draft() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Ok(assessment(
            0.3,
            CriticVerdict::Revise,
            vec!["wrong"],
        ))]));
        let generation = Arc::new(RecordingGeneration {
            fail: true,
            ..Default::default()
        });
        let critic = CriticLoop::new(CriticConfig::default(), evaluator, generation);

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;

        assert_eq!(outcome.final_draft, "initial draft");
        assert!(!outcome.iterations[0].regenerated);
    }

    #[tokio::test]
    async fn test_voice_narration_skips_loop() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig::default(),
            Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>,
            generation,
        );

        let mut narrated = context();
        narrated.voice_narration = true;
        let outcome = critic
            .refine(narrated, &RecordingRedispatcher::default())
            .await;

        assert!(!outcome.ran);
        assert_eq!(evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_config_skips_loop() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![]));
        let generation = Arc::new(RecordingGeneration::default());
        let critic = CriticLoop::new(
            CriticConfig {
                enabled: false,
                ..Default::default()
            },
            Arc::clone(&evaluator) as Arc<dyn DraftEvaluator>,
            generation,
        );

        let outcome = critic
            .refine(context(), &RecordingRedispatcher::default())
            .await;
        assert!(!outcome.ran);
        assert_eq!(evaluator.calls(), 0);
    }
}
