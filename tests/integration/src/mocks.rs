//! Mock collaborators for integration tests.

use async_trait::async_trait;
use orchestrator_core::{
    ChatCompletion, ChatRequest, ContextProvider, GenerationClient, OrchestratorError,
    ProviderKind, ProviderOutput, ProviderRequest,
};
use orchestrator_critic::{CriticAssessment, CriticVerdict, DraftEvaluator, EvaluationRequest};
use orchestrator_telemetry::{TelemetryEmitter, TelemetryEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider that returns canned content for its kind.
pub struct CannedProvider {
    kind: ProviderKind,
    content: String,
    confidence: f64,
}

impl CannedProvider {
    /// Canned content with a fixed confidence.
    pub fn new(kind: ProviderKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            confidence: 0.8,
        }
    }

    /// Override the confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[async_trait]
impl ContextProvider for CannedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn retrieve(
        &self,
        _request: &ProviderRequest,
    ) -> Result<ProviderOutput, OrchestratorError> {
        Ok(ProviderOutput::text(self.content.clone()).with_confidence(self.confidence))
    }
}

/// Provider that always fails, optionally marked transient.
pub struct FailingProvider {
    kind: ProviderKind,
    retryable: bool,
    calls: AtomicU32,
}

impl FailingProvider {
    /// A provider whose failures are never worth retrying.
    pub fn terminal(kind: ProviderKind) -> Self {
        Self {
            kind,
            retryable: false,
            calls: AtomicU32::new(0),
        }
    }

    /// A provider whose failures look transient.
    pub fn transient(kind: ProviderKind) -> Self {
        Self {
            kind,
            retryable: true,
            calls: AtomicU32::new(0),
        }
    }

    /// How many times the provider was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextProvider for FailingProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn retrieve(
        &self,
        _request: &ProviderRequest,
    ) -> Result<ProviderOutput, OrchestratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OrchestratorError::provider(
            self.kind.as_str(),
            "mock failure",
            self.retryable,
        ))
    }
}

/// Provider that sleeps past any reasonable budget.
pub struct SlowProvider {
    kind: ProviderKind,
    delay: Duration,
}

impl SlowProvider {
    /// A provider that takes `delay` to answer.
    pub fn new(kind: ProviderKind, delay: Duration) -> Self {
        Self { kind, delay }
    }
}

#[async_trait]
impl ContextProvider for SlowProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn retrieve(
        &self,
        _request: &ProviderRequest,
    ) -> Result<ProviderOutput, OrchestratorError> {
        tokio::time::sleep(self.delay).await;
        Ok(ProviderOutput::text("too late"))
    }
}

/// Generation client that records requests and replies from a script.
///
/// An empty script answers every call with a fixed reply.
pub struct ScriptedGeneration {
    script: Mutex<VecDeque<Result<String, OrchestratorError>>>,
    default_reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedGeneration {
    /// Client answering everything with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Client that fails every call.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: String::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Push a scripted response ahead of the default.
    pub fn push(&self, response: Result<String, OrchestratorError>) {
        self.script.lock().push_back(response);
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGeneration {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, OrchestratorError> {
        self.requests.lock().push(request.clone());
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted.map(|content| ChatCompletion {
                content,
                model: Some(request.model.clone()),
            });
        }
        if self.default_reply.is_empty() {
            return Err(OrchestratorError::generation("mock generation down", false));
        }
        Ok(ChatCompletion {
            content: self.default_reply.clone(),
            model: Some(request.model.clone()),
        })
    }
}

/// Evaluator that replays a script of assessments.
pub struct ScriptedEvaluator {
    script: Mutex<VecDeque<Result<CriticAssessment, OrchestratorError>>>,
    calls: AtomicU32,
}

impl ScriptedEvaluator {
    /// Evaluator replaying `script` in order; exhaustion fails the call.
    pub fn new(script: Vec<Result<CriticAssessment, OrchestratorError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Evaluator that passes everything on the first look.
    pub fn passing() -> Self {
        Self::new(vec![Ok(CriticAssessment {
            score: 0.95,
            verdict: CriticVerdict::Pass,
            issues: Vec::new(),
            rewrite_prompt: None,
            model: "mock-critic".to_string(),
        })])
    }

    /// Number of evaluations performed.
    pub fn calls(&self) -> u32 {
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

/// Telemetry sink that captures every event for assertions.
#[derive(Debug, Default)]
pub struct CapturingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl CapturingTelemetry {
    /// Create an empty capture buffer.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything captured so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Event type strings in emission order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(TelemetryEvent::event_type).collect()
    }
}

#[async_trait]
impl TelemetryEmitter for CapturingTelemetry {
    async fn emit(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }

    async fn flush(&self) {}
}
