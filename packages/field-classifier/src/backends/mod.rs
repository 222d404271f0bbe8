//! LLM gateway: backend variants and their construction.
//!
//! Available backends:
//! - `HostedBackend` - OpenAI and DeepSeek hosted APIs (bearer auth)
//! - `LocalBackend` - Self-hosted OpenAI-compatible endpoint (no auth)
//! - `ConcurrencyLimited` - Wrapper enforcing a provider's in-flight limit
//!
//! The variant is picked once, from configuration, by [`build_backend`].

pub mod hosted;
pub mod limited;
pub mod local;

pub use hosted::HostedBackend;
pub use limited::ConcurrencyLimited;
pub use local::LocalBackend;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::credentials::ApiKey;
use crate::error::{ClassifyError, Result};
use crate::traits::backend::{BackendKind, LlmBackend};

/// Connection settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for hosted providers, full chat completions URL for local
    pub url: String,

    /// Required for hosted providers, ignored for local. Never serialized.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,

    pub model: String,

    /// Completion token cap. None = provider default.
    pub max_tokens: Option<u32>,

    /// Maximum requests in flight (>= 1)
    pub max_concurrency: usize,
}

impl ProviderConfig {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            model: model.into(),
            max_tokens: None,
            max_concurrency: 8,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(api_key));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }
}

/// Which backend to use, plus settings for every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub backend: BackendKind,
    pub openai: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub local: ProviderConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::DeepSeek,
            openai: ProviderConfig::new("https://api.openai.com/v1", "gpt-4o-mini"),
            deepseek: ProviderConfig::new("https://api.deepseek.com", "deepseek-chat"),
            local: ProviderConfig::new(
                "http://localhost:8000/v1/chat/completions",
                "Qwen2.5-72B-Instruct",
            )
            .with_max_tokens(Some(800))
            .with_max_concurrency(2),
        }
    }
}

impl GatewayConfig {
    /// Select a backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Settings of the selected provider.
    pub fn selected(&self) -> &ProviderConfig {
        match self.backend {
            BackendKind::OpenAi => &self.openai,
            BackendKind::DeepSeek => &self.deepseek,
            BackendKind::Local => &self.local,
        }
    }
}

/// Construct the configured backend, wrapped in its concurrency limit.
///
/// Fails with `ClassifyError::Config` before any network call when the
/// selected provider is misconfigured.
pub fn build_backend(config: &GatewayConfig) -> Result<Arc<dyn LlmBackend>> {
    let provider = config.selected();
    if provider.max_concurrency == 0 {
        return Err(ClassifyError::Config(format!(
            "{} max concurrency must be at least 1",
            config.backend
        )));
    }

    info!(
        backend = %config.backend,
        model = %provider.model,
        max_concurrency = provider.max_concurrency,
        "Using LLM backend"
    );

    let backend: Arc<dyn LlmBackend> = match config.backend {
        BackendKind::OpenAi | BackendKind::DeepSeek => Arc::new(ConcurrencyLimited::new(
            HostedBackend::new(config.backend, provider)?,
        )?),
        BackendKind::Local => Arc::new(ConcurrencyLimited::new(LocalBackend::new(provider)?)?),
    };
    Ok(backend)
}
