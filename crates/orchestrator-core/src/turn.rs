//! The normalized inbound turn.
//!
//! This module defines the turn format handed over by the ingestion
//! collaborator, abstracting away the chat platform's message shape.

use crate::error::OrchestratorError;
use crate::generation::ChatMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized conversational turn, as delivered by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Correlates every record emitted while handling this turn.
    pub trace_id: String,

    /// Author of the turn.
    pub user_id: String,

    /// Channel the turn arrived in.
    pub channel_id: String,

    /// Guild/server id, absent for direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// The user's message text.
    pub user_text: String,

    /// Image attachments, as fetchable URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,

    /// Whether the turn carries an audio clip.
    #[serde(default)]
    pub has_audio: bool,

    /// Recent conversation history, oldest first.
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Text of the message this turn replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_context: Option<String>,

    /// Whether the turn carried any non-image attachment.
    #[serde(default)]
    pub has_attachments: bool,
}

impl TurnRequest {
    /// Create a new builder for [`TurnRequest`].
    #[must_use]
    pub fn builder() -> TurnRequestBuilder {
        TurnRequestBuilder::default()
    }

    /// Validate the turn.
    ///
    /// # Errors
    /// Returns an error when a required field is empty.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.trace_id.trim().is_empty() {
            return Err(OrchestratorError::internal("turn trace_id cannot be empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(OrchestratorError::internal("turn user_id cannot be empty"));
        }
        if self.user_text.trim().is_empty() && self.image_urls.is_empty() && !self.has_audio {
            return Err(OrchestratorError::internal(
                "turn must carry text, images, or audio",
            ));
        }
        Ok(())
    }
}

/// Builder for [`TurnRequest`].
#[derive(Debug, Default)]
pub struct TurnRequestBuilder {
    trace_id: Option<String>,
    user_id: Option<String>,
    channel_id: Option<String>,
    guild_id: Option<String>,
    user_text: Option<String>,
    image_urls: Vec<String>,
    has_audio: bool,
    history: Vec<ChatMessage>,
    reply_context: Option<String>,
    has_attachments: bool,
}

impl TurnRequestBuilder {
    /// Set the trace id. Generated when not provided.
    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the author id.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the channel id.
    #[must_use]
    pub fn channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Set the guild id.
    #[must_use]
    pub fn guild_id(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    /// Set the message text.
    #[must_use]
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.user_text = Some(text.into());
        self
    }

    /// Add an image attachment URL.
    #[must_use]
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_urls.push(url.into());
        self
    }

    /// Mark the turn as carrying audio.
    #[must_use]
    pub fn with_audio(mut self) -> Self {
        self.has_audio = true;
        self
    }

    /// Set the conversation history.
    #[must_use]
    pub fn history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Set the replied-to message text.
    #[must_use]
    pub fn reply_context(mut self, context: impl Into<String>) -> Self {
        self.reply_context = Some(context.into());
        self
    }

    /// Mark the turn as carrying a non-image attachment.
    #[must_use]
    pub fn with_attachments(mut self) -> Self {
        self.has_attachments = true;
        self
    }

    /// Build and validate the turn.
    ///
    /// # Errors
    /// Returns an error when a required field is empty.
    pub fn build(self) -> Result<TurnRequest, OrchestratorError> {
        let turn = TurnRequest {
            trace_id: self
                .trace_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: self.user_id.unwrap_or_default(),
            channel_id: self.channel_id.unwrap_or_default(),
            guild_id: self.guild_id,
            user_text: self.user_text.unwrap_or_default(),
            image_urls: self.image_urls,
            has_audio: self.has_audio,
            history: self.history,
            reply_context: self.reply_context,
            has_attachments: self.has_attachments,
        };
        turn.validate()?;
        Ok(turn)
    }
}
