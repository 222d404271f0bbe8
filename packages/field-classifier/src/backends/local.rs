//! Self-hosted OpenAI-compatible endpoint (vLLM and friends).

use async_trait::async_trait;
use llm_client::{ChatClient, ChatRequest, Message};
use tracing::debug;

use super::ProviderConfig;
use crate::error::{ClassifyError, Result};
use crate::traits::backend::{BackendKind, CompletionOptions, LlmBackend};

/// Nucleus sampling sent to self-hosted servers.
pub const LOCAL_TOP_P: f32 = 0.8;

/// Repetition penalty sent to self-hosted servers.
pub const LOCAL_REPETITION_PENALTY: f32 = 1.05;

/// A self-hosted chat endpoint. No auth; extra sampling fields.
#[derive(Clone)]
pub struct LocalBackend {
    client: ChatClient,
    model: String,
    max_tokens: Option<u32>,
    max_concurrency: usize,
}

impl LocalBackend {
    /// `config.url` is the full chat completions URL.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = ChatClient::self_hosted(&config.url)
            .map_err(|e| ClassifyError::Config(format!("local: {}", e)))?;
        Ok(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_concurrency: config.max_concurrency,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    /// Build the request body for one prompt.
    pub fn request(&self, prompt: &str, options: &CompletionOptions) -> ChatRequest {
        ChatRequest::new(&self.model)
            .message(Message::user(prompt))
            .temperature(options.temperature)
            .top_p(LOCAL_TOP_P)
            .repetition_penalty(LOCAL_REPETITION_PENALTY)
            .max_tokens(self.max_tokens)
    }
}

#[async_trait]
impl LlmBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        debug!(endpoint = %self.endpoint(), model = %self.model, "Sending prompt");
        let response = self
            .client
            .chat_completion(&self.request(prompt, options), options.timeout)
            .await?;
        Ok(response.content)
    }
}
