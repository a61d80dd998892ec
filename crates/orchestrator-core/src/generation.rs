//! Generation client collaborator types.
//!
//! The orchestrator never talks to a model API directly; it hands a
//! [`ChatRequest`] to the injected [`GenerationClient`].

use crate::error::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction.
    System,
    /// End-user message.
    User,
    /// Assistant reply.
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool the model may call during generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the tool parameters.
    pub parameters: Value,
}

/// A request to the generation client.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Target model id.
    pub model: String,
    /// Conversation messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap, when bounded.
    pub max_tokens: Option<u32>,
    /// Wall-clock bound for the call.
    pub timeout: Duration,
    /// Tools offered to the model, when tool use is permitted.
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ChatRequest {
    /// Create a request with defaults for the optional fields.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens: None,
            timeout: Duration::from_secs(60),
            tools: None,
        }
    }

    /// Set the output token cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Offer tools to the model.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Generated text.
    pub content: String,
    /// Model that actually served the request, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The generation API collaborator.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one chat completion.
    ///
    /// # Errors
    /// Returns a generation error; a hard failure on the synthesis call is
    /// the only error the pipeline surfaces to the user.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, OrchestratorError>;
}
