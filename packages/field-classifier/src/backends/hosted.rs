//! Hosted chat-completion providers (OpenAI, DeepSeek).
//!
//! Both speak the same wire format; they differ only in base URL, key and
//! default model, all of which come from `ProviderConfig`.

use async_trait::async_trait;
use llm_client::{ChatClient, ChatRequest, Message};
use tracing::debug;

use super::ProviderConfig;
use crate::error::{ClassifyError, Result};
use crate::traits::backend::{BackendKind, CompletionOptions, LlmBackend};

/// A hosted OpenAI-compatible provider behind bearer auth.
#[derive(Clone)]
pub struct HostedBackend {
    kind: BackendKind,
    client: ChatClient,
    model: String,
    max_tokens: Option<u32>,
    max_concurrency: usize,
}

impl HostedBackend {
    /// Build a hosted backend. A missing or empty API key is a configuration error.
    pub fn new(kind: BackendKind, config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|k| !k.is_blank())
            .ok_or_else(|| ClassifyError::Config(format!("{} API key is not set", kind)))?;

        let client = ChatClient::hosted(&config.url, api_key.expose())
            .map_err(|e| ClassifyError::Config(format!("{}: {}", kind, e)))?;

        Ok(Self {
            kind,
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_concurrency: config.max_concurrency,
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body for one prompt.
    pub fn request(&self, prompt: &str, options: &CompletionOptions) -> ChatRequest {
        ChatRequest::new(&self.model)
            .message(Message::user(prompt))
            .temperature(options.temperature)
            .max_tokens(self.max_tokens)
            .no_stream()
    }
}

#[async_trait]
impl LlmBackend for HostedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        debug!(backend = %self.kind, model = %self.model, prompt_len = prompt.len(), "Sending prompt");
        let response = self
            .client
            .chat_completion(&self.request(prompt, options), options.timeout)
            .await?;
        Ok(response.content)
    }
}
