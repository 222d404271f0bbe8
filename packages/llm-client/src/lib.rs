//! OpenAI-compatible chat completion client
//!
//! A minimal client for the chat completions endpoint with no classification
//! logic. The same client talks to hosted providers (OpenAI, DeepSeek) and to
//! self-hosted servers exposing the OpenAI wire format (vLLM, llama.cpp).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{ChatClient, ChatRequest, Message};
//! use std::time::Duration;
//!
//! let client = ChatClient::hosted("https://api.deepseek.com", api_key)?;
//!
//! let response = client.chat_completion(
//!     &ChatRequest::new("deepseek-chat")
//!         .message(Message::user("Hello!"))
//!         .temperature(0.1),
//!     Duration::from_secs(60),
//! ).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{LlmError, Result};
pub use types::*;

use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest error body kept in a `Status` error.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Chat completion client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct ChatClient {
    http_client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl ChatClient {
    /// Client for a hosted provider.
    ///
    /// Requests go to `{base_url}/chat/completions` with bearer auth.
    pub fn hosted(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is empty".into()));
        }
        let base_url = base_url.into();
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self {
            http_client: Client::new(),
            api_key: Some(api_key),
            endpoint,
        })
    }

    /// Client for a self-hosted server.
    ///
    /// `endpoint` is the full chat completions URL; no auth header is sent.
    pub fn self_hosted(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(LlmError::Config("endpoint URL is empty".into()));
        }
        Ok(Self {
            http_client: Client::new(),
            api_key: None,
            endpoint,
        })
    }

    /// Get the endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Chat completion.
    ///
    /// The whole exchange (connect, send, read body) is bounded by `timeout`.
    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<ChatResponse> {
        let start = Instant::now();

        let response = tokio::time::timeout(timeout, self.post(request))
            .await
            .map_err(|_| {
                warn!(endpoint = %self.endpoint, timeout_ms = timeout.as_millis(), "LLM request timed out");
                LlmError::Timeout(timeout)
            })??;

        match &response.usage {
            Some(usage) => debug!(
                model = %request.model,
                duration_ms = start.elapsed().as_millis(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion"
            ),
            None => debug!(
                model = %request.model,
                duration_ms = start.elapsed().as_millis(),
                "Chat completion"
            ),
        }

        Ok(response)
    }

    async fn post(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut builder = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %self.endpoint, "LLM request failed");
            LlmError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "LLM API error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate_to_char_boundary(&error_text, MAX_ERROR_BODY_BYTES).to_string(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Envelope(format!("body is not JSON: {}", e)))?;

        parse_envelope(&body).map_err(|e| {
            warn!(error = %e, "Response validation error");
            e
        })
    }
}
