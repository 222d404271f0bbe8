//! Chat completion request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, Result};

// =============================================================================
// Chat Completion
// =============================================================================

/// Chat completion request.
///
/// Hosted providers ignore the sampling fields they don't know, but the
/// optional ones are left out of the body entirely when unset.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use (e.g., "gpt-4o-mini", "deepseek-chat")
    pub model: String,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Repetition penalty (self-hosted servers such as vLLM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Maximum tokens in completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Streaming flag; always sent as `false` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// Create a new chat request with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            top_p: None,
            repetition_penalty: None,
            max_tokens: None,
            stream: None,
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set nucleus sampling.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set repetition penalty.
    pub fn repetition_penalty(mut self, penalty: f32) -> Self {
        self.repetition_penalty = Some(penalty);
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Explicitly disable streaming.
    pub fn no_stream(mut self) -> Self {
        self.stream = Some(false);
        self
    }
}

/// Chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role; the classifier only sends "user"
    pub role: String,

    /// Message content
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Response content
    pub content: String,

    /// Token usage statistics, when the server reports them
    pub usage: Option<Usage>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

// =============================================================================
// Envelope validation
// =============================================================================

/// Validate a raw chat completion body and pull out `choices[0].message.content`.
///
/// Self-hosted servers are not always strict about the shape, so every step
/// is checked and reported by name instead of deserializing into a fixed struct.
pub fn parse_envelope(body: &Value) -> Result<ChatResponse> {
    let object = body
        .as_object()
        .ok_or_else(|| LlmError::Envelope("not a JSON object".into()))?;

    let choices = object
        .get("choices")
        .ok_or_else(|| LlmError::Envelope("'choices' key missing".into()))?
        .as_array()
        .ok_or_else(|| LlmError::Envelope("'choices' is not an array".into()))?;

    let first = choices
        .first()
        .ok_or_else(|| LlmError::Envelope("'choices' is empty".into()))?;

    let message = first
        .get("message")
        .ok_or_else(|| LlmError::Envelope("'message' key missing".into()))?;

    let content = message
        .get("content")
        .ok_or_else(|| LlmError::Envelope("'content' key missing".into()))?
        .as_str()
        .ok_or_else(|| LlmError::Envelope("'content' is not a string".into()))?;

    let usage = object
        .get("usage")
        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

    Ok(ChatResponse {
        content: content.to_string(),
        usage,
    })
}

// =============================================================================
// Utilities
// =============================================================================

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}
